use std::collections::HashMap;
use std::fmt;
use std::mem;

use crate::error::Error;

/// The number of slots in a transition table.
///
/// Slot `0` is the skip slot. Every other slot is indexed by the byte it
/// consumes, which means the NUL byte can never be consumed.
pub(crate) const SLOTS: usize = 256;

/// The slot holding the transition taken without consuming input.
pub(crate) const SKIP: u8 = 0;

/// The identifier of a state in an automaton.
///
/// Two identifiers are reserved: [`StateId::MATCHING`] is the sentinel
/// meaning "pattern satisfied" and never names a real state, and
/// `StateId::PENDING` marks a slot that is waiting in a patch list for its
/// successor to become known. No pending slot survives compilation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    /// The matching sentinel.
    pub const MATCHING: StateId = StateId(u32::MAX);

    pub(crate) const PENDING: StateId = StateId(u32::MAX - 1);

    /// The largest number of real states an automaton can hold.
    const LIMIT: usize = (u32::MAX - 1) as usize;

    fn new(index: usize) -> StateId {
        debug_assert!(index < StateId::LIMIT);
        StateId(index as u32)
    }

    /// Returns this identifier as an index into the state arena.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Returns true if this is the matching sentinel.
    pub fn is_matching(self) -> bool {
        self == StateId::MATCHING
    }

    fn is_real(self) -> bool {
        self != StateId::MATCHING && self != StateId::PENDING
    }
}

impl fmt::Debug for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateId::MATCHING => write!(f, "MATCH"),
            StateId::PENDING => write!(f, "PENDING"),
            StateId(id) => write!(f, "{}", id),
        }
    }
}

/// A node of the automaton: one transition per byte plus the skip slot.
///
/// An unset slot means "no transition".
#[derive(Clone)]
pub(crate) struct State {
    next: [Option<StateId>; SLOTS],
}

impl State {
    fn new() -> State {
        State { next: [None; SLOTS] }
    }

    /// The transition taken when `byte` is consumed. NUL is never consumed.
    pub(crate) fn step(&self, byte: u8) -> Option<StateId> {
        if byte == SKIP {
            None
        } else {
            self.next[usize::from(byte)]
        }
    }

    pub(crate) fn skip(&self) -> Option<StateId> {
        self.next[usize::from(SKIP)]
    }
}

/// What happened when an in-flight match tried to consume a byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// The byte was consumed and the match continues from this state, which
    /// may be the matching sentinel.
    Consume(StateId),
    /// The byte could not be consumed, but the skip route reaches the
    /// matching sentinel: the pattern is satisfied just before the byte.
    Satisfied,
    /// Nothing consumes the byte and no skip route reaches a match.
    Dead,
}

/// A compiled automaton. Immutable once built.
#[derive(Clone)]
pub(crate) struct Automaton {
    states: Box<[State]>,
    initial: StateId,
}

impl Automaton {
    pub(crate) fn initial(&self) -> StateId {
        self.initial
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[id.as_usize()]
    }

    /// Moves from `from` over `byte`.
    ///
    /// A direct transition is always preferred. Otherwise the skip chain is
    /// followed and each state on it gets its chance to consume the byte.
    /// Skip chains are acyclic, so this terminates.
    pub(crate) fn advance(&self, from: StateId, byte: u8) -> Step {
        let mut id = from;
        loop {
            if id.is_matching() {
                return Step::Satisfied;
            }
            let state = self.state(id);
            if let Some(next) = state.step(byte) {
                return Step::Consume(next);
            }
            match state.skip() {
                Some(next) => id = next,
                None => return Step::Dead,
            }
        }
    }

    /// Returns true if following only skip transitions from `from` reaches
    /// the matching sentinel.
    pub(crate) fn skips_to_match(&self, from: StateId) -> bool {
        let mut id = from;
        loop {
            if id.is_matching() {
                return true;
            }
            match self.state(id).skip() {
                Some(next) => id = next,
                None => return false,
            }
        }
    }

    /// Returns every state reachable from the initial state, in breadth
    /// first order.
    fn reachable(&self) -> Vec<StateId> {
        let mut seen = vec![false; self.states.len()];
        let mut order = vec![self.initial];
        seen[self.initial.as_usize()] = true;
        let mut i = 0;
        while i < order.len() {
            let state = self.state(order[i]);
            for next in state.next.iter().flatten() {
                if next.is_real() && !seen[next.as_usize()] {
                    seen[next.as_usize()] = true;
                    order.push(*next);
                }
            }
            i += 1;
        }
        order
    }
}

impl fmt::Debug for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "initial: {:?}", self.initial)?;
        for id in self.reachable() {
            let state = self.state(id);
            write!(f, "{:?}:", id)?;
            if let Some(skip) = state.skip() {
                write!(f, " skip => {:?}", skip)?;
            }
            // Runs of consecutive bytes sharing a target are printed as a
            // single range.
            let mut byte = 1;
            while byte < SLOTS {
                let Some(target) = state.next[byte] else {
                    byte += 1;
                    continue;
                };
                let mut end = byte;
                while end + 1 < SLOTS && state.next[end + 1] == Some(target) {
                    end += 1;
                }
                if end == byte {
                    write!(f, " {} => {:?}", escape(byte as u8), target)?;
                } else {
                    write!(
                        f,
                        " {}-{} => {:?}",
                        escape(byte as u8),
                        escape(end as u8),
                        target
                    )?;
                }
                byte = end + 1;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn escape(byte: u8) -> String {
    let escaped: Vec<u8> = std::ascii::escape_default(byte).collect();
    format!("'{}'", String::from_utf8_lossy(&escaped))
}

/// The index of a patch in the patch arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PatchId(u32);

/// A deferred write: `slot` of `state` receives the successor once known.
#[derive(Clone, Copy, Debug)]
struct Patch {
    state: StateId,
    slot: u8,
    next: Option<PatchId>,
}

/// The dangling exits of a fragment, threaded through the patch arena.
///
/// Keeping both ends makes [`Arena::concat`] O(1).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PatchList {
    head: Option<PatchId>,
    tail: Option<PatchId>,
}

impl PatchList {
    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// The state and patch arenas used while a pattern is being compiled.
///
/// States are never freed individually: fragments that become unreachable
/// stay in the arena until the whole automaton is dropped.
pub(crate) struct Arena {
    states: Vec<State>,
    patches: Vec<Patch>,
    size_limit: usize,
    /// How many more states merging may allocate below the root of a merge.
    merge_budget: usize,
}

impl Arena {
    /// Creates an arena sized up front for a pattern of `pattern_len` bytes.
    ///
    /// Patterns without alternation need at most one state per pattern
    /// byte plus one extra state per `+`. Merging may need more, in which
    /// case the arenas grow. The states merging adds below the root of each
    /// merge are capped at `pattern_len + 1` for the whole arena, so the
    /// automaton stays linear in the size of the pattern.
    pub(crate) fn new(
        pattern_len: usize,
        size_limit: usize,
    ) -> Result<Arena, Error> {
        let mut arena = Arena {
            states: Vec::new(),
            patches: Vec::new(),
            size_limit,
            merge_budget: pattern_len.saturating_add(1),
        };
        let states = pattern_len
            .saturating_add(1)
            .min(size_limit / mem::size_of::<State>());
        arena.states.try_reserve_exact(states)?;
        arena.patches.try_reserve_exact(pattern_len.saturating_mul(2))?;
        Ok(arena)
    }

    /// Allocates a state with every slot unset.
    pub(crate) fn add_state(&mut self) -> Result<StateId, Error> {
        let index = self.states.len();
        let bytes = (index + 1).saturating_mul(mem::size_of::<State>());
        if index >= StateId::LIMIT || bytes > self.size_limit {
            return Err(Error::out_of_memory());
        }
        self.states.try_reserve(1)?;
        self.states.push(State::new());
        Ok(StateId::new(index))
    }

    pub(crate) fn get(&self, state: StateId, slot: u8) -> Option<StateId> {
        self.states[state.as_usize()].next[usize::from(slot)]
    }

    pub(crate) fn set(&mut self, state: StateId, slot: u8, to: StateId) {
        self.states[state.as_usize()].next[usize::from(slot)] = Some(to);
    }

    pub(crate) fn clear(&mut self, state: StateId, slot: u8) {
        self.states[state.as_usize()].next[usize::from(slot)] = None;
    }

    /// Marks `slot` of `state` as pending and appends it to `list`.
    pub(crate) fn push_patch(
        &mut self,
        list: &mut PatchList,
        state: StateId,
        slot: u8,
    ) -> Result<(), Error> {
        self.patches.try_reserve(1)?;
        let id = PatchId(self.patches.len() as u32);
        self.patches.push(Patch { state, slot, next: None });
        self.set(state, slot, StateId::PENDING);
        match list.tail {
            None => list.head = Some(id),
            Some(tail) => self.patches[tail.0 as usize].next = Some(id),
        }
        list.tail = Some(id);
        Ok(())
    }

    /// Adds a pending exit on every non-skip slot of `state`.
    pub(crate) fn push_wild_patches(
        &mut self,
        list: &mut PatchList,
        state: StateId,
    ) -> Result<(), Error> {
        for byte in 1..=u8::MAX {
            self.push_patch(list, state, byte)?;
        }
        Ok(())
    }

    /// Writes `to` into every slot referenced by `list`.
    ///
    /// The list is consumed: its patches must not be resolved twice.
    pub(crate) fn patch(&mut self, list: PatchList, to: StateId) {
        let mut cur = list.head;
        while let Some(id) = cur {
            let Patch { state, slot, next } = self.patches[id.0 as usize];
            self.set(state, slot, to);
            cur = next;
        }
    }

    /// Splices `second` onto the end of `first`.
    pub(crate) fn concat(
        &mut self,
        first: PatchList,
        second: PatchList,
    ) -> PatchList {
        match (first.tail, second.head) {
            (None, _) => second,
            (_, None) => first,
            (Some(tail), head) => {
                self.patches[tail.0 as usize].next = head;
                PatchList { head: first.head, tail: second.tail }
            }
        }
    }

    /// Points every non-skip slot of `state` at `to`.
    pub(crate) fn join_wild(&mut self, state: StateId, to: StateId) {
        let next = &mut self.states[state.as_usize()].next;
        for slot in next.iter_mut().skip(1) {
            *slot = Some(to);
        }
    }

    /// Allocates a state whose non-skip slots are copies of those of `from`.
    ///
    /// Pending slots are copied as new pending exits appended to `list`, so
    /// the copy is patched together with the original.
    pub(crate) fn copy_steps(
        &mut self,
        from: StateId,
        list: &mut PatchList,
    ) -> Result<StateId, Error> {
        let copy = self.add_state()?;
        for byte in 1..=u8::MAX {
            match self.get(from, byte) {
                None => {}
                Some(StateId::PENDING) => self.push_patch(list, copy, byte)?,
                Some(to) => self.set(copy, byte, to),
            }
        }
        Ok(copy)
    }

    /// Returns a state accepting the union of what every state in `roots`
    /// accepts. `StateId::PENDING` may appear in `roots` and stands for the
    /// successor of the fragment being built.
    ///
    /// Existing states are never modified. Each merged state is fresh, and
    /// the skip chain of every side is flattened into it, so two sides
    /// starting with the same byte share a single transition on it. When
    /// only one side has a transition on a byte, its target is shared
    /// rather than copied. Merged states are memoised on the set of states
    /// they stand for, which bounds the work even when the sides loop.
    ///
    /// Once the arena's merge budget is spent, a byte with several targets
    /// that has no merged state yet goes to the first of them only. The
    /// result then accepts a subset of the union.
    ///
    /// Pending slots of merged states are appended to `list`.
    pub(crate) fn merge(
        &mut self,
        roots: &[StateId],
        list: &mut PatchList,
    ) -> Result<StateId, Error> {
        let mut merged: HashMap<Vec<StateId>, StateId> = HashMap::new();
        let mut work: Vec<(Vec<StateId>, StateId)> = Vec::new();

        let root = self.merged_state(
            roots.to_vec(),
            &mut merged,
            &mut work,
            list,
        )?;
        while let Some((set, into)) = work.pop() {
            self.fill_merged(&set, into, &mut merged, &mut work, list)?;
        }
        Ok(root)
    }

    /// Returns the state standing for `set`, allocating it (and queueing it
    /// to be filled) if the set is seen for the first time.
    fn merged_state(
        &mut self,
        mut set: Vec<StateId>,
        merged: &mut HashMap<Vec<StateId>, StateId>,
        work: &mut Vec<(Vec<StateId>, StateId)>,
        list: &mut PatchList,
    ) -> Result<StateId, Error> {
        set.sort_unstable();
        set.dedup();
        match set[..] {
            [only] if only.is_real() => return Ok(only),
            _ => {}
        }
        if let Some(&id) = merged.get(&set) {
            return Ok(id);
        }
        let id = self.add_state()?;
        if set[..] == [StateId::PENDING] {
            self.push_patch(list, id, SKIP)?;
            return Ok(id);
        }
        merged.insert(set.clone(), id);
        work.push((set, id));
        Ok(id)
    }

    fn fill_merged(
        &mut self,
        set: &[StateId],
        into: StateId,
        merged: &mut HashMap<Vec<StateId>, StateId>,
        work: &mut Vec<(Vec<StateId>, StateId)>,
        list: &mut PatchList,
    ) -> Result<(), Error> {
        let mut members = Vec::new();
        let mut exit = None;
        for &root in set {
            let mut cur = Some(root);
            while let Some(id) = cur {
                if !id.is_real() {
                    exit = exit.max(Some(id));
                    break;
                }
                members.push(id);
                cur = self.get(id, SKIP);
            }
        }
        match exit {
            None => {}
            Some(StateId::PENDING) => self.push_patch(list, into, SKIP)?,
            Some(to) => self.set(into, SKIP, to),
        }

        let mut targets = Vec::with_capacity(members.len());
        for byte in 1..=u8::MAX {
            targets.clear();
            targets.extend(members.iter().filter_map(|&m| self.get(m, byte)));
            targets.sort_unstable();
            targets.dedup();
            match targets[..] {
                [] => {}
                [StateId::PENDING] => self.push_patch(list, into, byte)?,
                [only] => self.set(into, byte, only),
                _ => {
                    let to = match merged.get(&targets).copied() {
                        Some(to) => to,
                        None if self.merge_budget == 0 => targets[0],
                        None => {
                            self.merge_budget -= 1;
                            self.merged_state(
                                targets.clone(),
                                merged,
                                work,
                                list,
                            )?
                        }
                    };
                    if to == StateId::PENDING {
                        self.push_patch(list, into, byte)?;
                    } else {
                        self.set(into, byte, to);
                    }
                }
            }
        }
        Ok(())
    }

    /// Consumes the arena, keeping only the states.
    pub(crate) fn into_automaton(self, initial: StateId) -> Automaton {
        debug_assert!(self
            .states
            .iter()
            .all(|s| s.next.iter().all(|&n| n != Some(StateId::PENDING))));
        Automaton { states: self.states.into_boxed_slice(), initial }
    }
}
