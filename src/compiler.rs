use std::mem;

use crate::automaton::{Arena, Automaton, PatchList, StateId, SKIP};
use crate::builder::Config;
use crate::error::{Error, ErrorKind};

/// The bytes that may follow a `\`.
const ESCAPABLE: &[u8] = b"\\*+.()?|";

/// A postfix repetition operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Quantifier {
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

/// A partially built fragment of the automaton.
#[derive(Clone, Copy, Debug)]
struct Chunk {
    /// The entry state.
    start: StateId,
    /// The dangling exits, resolved to whatever follows the fragment.
    exits: PatchList,
    /// True when no transition of the automaton targets `start`, in which
    /// case its skip slot can be rewritten without affecting other paths.
    fresh: bool,
}

/// Compiles `pattern` into an automaton.
///
/// The pattern ends at its first NUL byte, if any.
pub(crate) fn compile(
    pattern: &[u8],
    config: &Config,
) -> Result<Automaton, Error> {
    let pattern = match pattern.iter().position(|&b| b == 0) {
        Some(end) => &pattern[..end],
        None => pattern,
    };
    let mut compiler = Compiler {
        pattern,
        pos: 0,
        utf8: config.utf8,
        arena: Arena::new(pattern.len(), config.size_limit)?,
    };
    let chunk = compiler.parse()?;
    compiler.arena.patch(chunk.exits, StateId::MATCHING);
    let automaton = compiler.arena.into_automaton(chunk.start);
    debug!(
        "compiled {:?} into {} states",
        String::from_utf8_lossy(pattern),
        automaton.len(),
    );
    Ok(automaton)
}

/// A group being read, or the whole pattern at the bottom of the stack.
struct Frame {
    /// The offset of the `(` that opened the group.
    open: Option<usize>,
    /// The entries of the branches read so far.
    starts: Vec<StateId>,
    exits: PatchList,
    /// Whether the last finished branch is fresh. Only meaningful when
    /// there is a single branch.
    fresh: bool,
    /// The branch being read.
    branch: Option<Chunk>,
}

impl Frame {
    fn new(open: Option<usize>) -> Frame {
        Frame {
            open,
            starts: Vec::new(),
            exits: PatchList::default(),
            fresh: true,
            branch: None,
        }
    }
}

/// A parser that builds the automaton as it goes.
///
/// Open groups live on an explicit stack of frames, so the nesting depth of
/// a pattern is bounded by memory and not by the call stack.
struct Compiler<'p> {
    pattern: &'p [u8],
    pos: usize,
    utf8: bool,
    arena: Arena,
}

impl<'p> Compiler<'p> {
    fn peek(&self) -> Option<u8> {
        self.pattern.get(self.pos).copied()
    }

    /// alternation   := concatenation ('|' concatenation)*
    /// concatenation := (quantified | '(' alternation ')' quantifier?)+
    fn parse(&mut self) -> Result<Chunk, Error> {
        let mut parents: Vec<Frame> = Vec::new();
        let mut frame = Frame::new(None);
        while let Some(byte) = self.peek() {
            match byte {
                b'(' => {
                    parents.try_reserve(1)?;
                    let group = Frame::new(Some(self.pos));
                    parents.push(mem::replace(&mut frame, group));
                    self.pos += 1;
                }
                b'|' => {
                    self.end_branch(&mut frame)?;
                    self.pos += 1;
                }
                b')' => {
                    let Some(parent) = parents.pop() else {
                        return Err(Error::new(
                            ErrorKind::UnbalancedParentheses,
                            self.pos,
                        ));
                    };
                    let group = mem::replace(&mut frame, parent);
                    let inner = self.alternation(group)?;
                    self.pos += 1;
                    let chunk = match self.quantifier() {
                        None => inner,
                        Some(Quantifier::ZeroOrOne) => {
                            self.group_optional(inner)?
                        }
                        Some(Quantifier::ZeroOrMore) => self.group_star(inner)?,
                        Some(Quantifier::OneOrMore) => self.group_plus(inner)?,
                    };
                    self.append(&mut frame, chunk);
                }
                _ => {
                    let chunk = self.quantified()?;
                    self.append(&mut frame, chunk);
                }
            }
        }
        match frame.open {
            Some(open) if frame.branch.is_some() => {
                Err(Error::new(ErrorKind::UnbalancedParentheses, open))
            }
            _ => self.alternation(frame),
        }
    }

    /// Appends `next` to the branch being read.
    fn append(&mut self, frame: &mut Frame, next: Chunk) {
        frame.branch = Some(match frame.branch.take() {
            None => next,
            Some(prev) => self.concat(prev, next),
        });
    }

    /// Finishes the branch being read, which ends at the current offset.
    fn end_branch(&mut self, frame: &mut Frame) -> Result<(), Error> {
        let Some(branch) = frame.branch.take() else {
            return Err(Error::new(ErrorKind::EmptyExpression, self.pos));
        };
        frame.starts.try_reserve(1)?;
        frame.starts.push(branch.start);
        frame.exits = self.arena.concat(frame.exits, branch.exits);
        frame.fresh = branch.fresh;
        Ok(())
    }

    /// Finishes the last branch of `frame` and joins all of its branches.
    fn alternation(&mut self, mut frame: Frame) -> Result<Chunk, Error> {
        self.end_branch(&mut frame)?;
        if let [start] = frame.starts[..] {
            return Ok(Chunk { start, exits: frame.exits, fresh: frame.fresh });
        }
        let start = self.arena.merge(&frame.starts, &mut frame.exits)?;
        // Merging loops may route transitions back into the merged entry.
        Ok(Chunk { start, exits: frame.exits, fresh: false })
    }

    fn concat(&mut self, first: Chunk, second: Chunk) -> Chunk {
        self.arena.patch(first.exits, second.start);
        Chunk { start: first.start, exits: second.exits, fresh: first.fresh }
    }

    /// quantified := atom ('*' | '+' | '?')?
    ///
    /// Groups and the bytes `|` and `)` are handled by [`Compiler::parse`].
    fn quantified(&mut self) -> Result<Chunk, Error> {
        let at = self.pos;
        let pattern = self.pattern;
        match pattern[at] {
            b'*' | b'+' | b'?' => Err(Error::new(ErrorKind::NoOperand, at)),
            b'.' => {
                self.pos += 1;
                let quantifier = self.quantifier();
                self.wildcard(quantifier)
            }
            b'\\' => match pattern.get(at + 1) {
                Some(&byte) if ESCAPABLE.contains(&byte) => {
                    self.pos += 2;
                    let quantifier = self.quantifier();
                    self.sequence(&[], byte, quantifier)
                }
                _ => Err(Error::new(ErrorKind::InvalidEscape, at)),
            },
            lead if lead >= 0x80 && self.utf8 => {
                let width = utf8_width(lead)
                    .filter(|&w| at + w <= pattern.len())
                    .ok_or_else(|| Error::new(ErrorKind::InvalidUtf8, at))?;
                self.pos += width;
                let quantifier = self.quantifier();
                let last = at + width - 1;
                self.sequence(&pattern[at..last], pattern[last], quantifier)
            }
            byte => {
                self.pos += 1;
                let quantifier = self.quantifier();
                self.sequence(&[], byte, quantifier)
            }
        }
    }

    fn quantifier(&mut self) -> Option<Quantifier> {
        let quantifier = match self.peek()? {
            b'?' => Quantifier::ZeroOrOne,
            b'*' => Quantifier::ZeroOrMore,
            b'+' => Quantifier::OneOrMore,
            _ => return None,
        };
        self.pos += 1;
        Some(quantifier)
    }

    /// Builds a chain of states consuming `head` followed by `last`, with
    /// `quantifier` applied to the whole chain.
    fn sequence(
        &mut self,
        head: &[u8],
        last: u8,
        quantifier: Option<Quantifier>,
    ) -> Result<Chunk, Error> {
        let first = self.arena.add_state()?;
        let mut tail = first;
        let mut second = None;
        for &byte in head {
            let next = self.arena.add_state()?;
            self.arena.set(tail, byte, next);
            second.get_or_insert(next);
            tail = next;
        }

        let mut exits = PatchList::default();
        let fresh = match quantifier {
            None => {
                self.arena.push_patch(&mut exits, tail, last)?;
                true
            }
            Some(Quantifier::ZeroOrOne) => {
                self.arena.push_patch(&mut exits, tail, last)?;
                self.arena.push_patch(&mut exits, first, SKIP)?;
                true
            }
            Some(Quantifier::ZeroOrMore) => {
                self.arena.set(tail, last, first);
                self.arena.push_patch(&mut exits, first, SKIP)?;
                false
            }
            Some(Quantifier::OneOrMore) => {
                // After the first pass, every repetition restarts from a
                // state that also offers the way out.
                let again = self.arena.add_state()?;
                self.arena.set(tail, last, again);
                let lead = head.first().copied().unwrap_or(last);
                self.arena.set(again, lead, second.unwrap_or(again));
                self.arena.push_patch(&mut exits, again, SKIP)?;
                true
            }
        };
        Ok(Chunk { start: first, exits, fresh })
    }

    fn wildcard(
        &mut self,
        quantifier: Option<Quantifier>,
    ) -> Result<Chunk, Error> {
        let start = self.arena.add_state()?;
        let mut exits = PatchList::default();
        let fresh = match quantifier {
            None => {
                self.arena.push_wild_patches(&mut exits, start)?;
                true
            }
            Some(Quantifier::ZeroOrOne) => {
                self.arena.push_wild_patches(&mut exits, start)?;
                self.arena.push_patch(&mut exits, start, SKIP)?;
                true
            }
            Some(Quantifier::ZeroOrMore) => {
                self.arena.join_wild(start, start);
                self.arena.push_patch(&mut exits, start, SKIP)?;
                false
            }
            Some(Quantifier::OneOrMore) => {
                let again = self.arena.add_state()?;
                self.arena.join_wild(start, again);
                self.arena.join_wild(again, again);
                self.arena.push_patch(&mut exits, again, SKIP)?;
                true
            }
        };
        Ok(Chunk { start, exits, fresh })
    }

    /// Returns the state to rewrite when a quantifier is applied to
    /// `chunk`: its start if nothing else can reach it, or otherwise a new
    /// state with the same transitions.
    fn entry(&mut self, chunk: &mut Chunk) -> Result<StateId, Error> {
        if chunk.fresh {
            return Ok(chunk.start);
        }
        let copy = self.arena.copy_steps(chunk.start, &mut chunk.exits)?;
        if let Some(skip) = self.arena.get(chunk.start, SKIP) {
            if skip == StateId::PENDING {
                self.arena.push_patch(&mut chunk.exits, copy, SKIP)?;
            } else {
                self.arena.set(copy, SKIP, skip);
            }
        }
        Ok(copy)
    }

    /// Makes the skip slot of `state` lead both where `skip` leads and out
    /// of the fragment.
    fn skip_or_exit(
        &mut self,
        state: StateId,
        skip: Option<StateId>,
        exits: &mut PatchList,
    ) -> Result<(), Error> {
        match skip {
            None | Some(StateId::PENDING) => {
                self.arena.push_patch(exits, state, SKIP)
            }
            Some(to) => {
                let either = self.arena.merge(&[to, StateId::PENDING], exits)?;
                self.arena.set(state, SKIP, either);
                Ok(())
            }
        }
    }

    fn group_optional(&mut self, mut chunk: Chunk) -> Result<Chunk, Error> {
        let entry = self.entry(&mut chunk)?;
        let skip = self.arena.get(entry, SKIP);
        if skip != Some(StateId::PENDING) {
            self.skip_or_exit(entry, skip, &mut chunk.exits)?;
        }
        Ok(Chunk { start: entry, exits: chunk.exits, fresh: true })
    }

    fn group_star(&mut self, mut chunk: Chunk) -> Result<Chunk, Error> {
        let skip = self.arena.get(chunk.start, SKIP);
        let entry = self.entry(&mut chunk)?;
        self.arena.patch(chunk.exits, entry);
        // A pending skip on the entry was just resolved to the entry itself.
        self.arena.clear(entry, SKIP);
        let mut exits = PatchList::default();
        self.skip_or_exit(entry, skip, &mut exits)?;
        Ok(Chunk { start: entry, exits, fresh: false })
    }

    fn group_plus(&mut self, mut chunk: Chunk) -> Result<Chunk, Error> {
        let skip = self.arena.get(chunk.start, SKIP);
        let again = self.arena.copy_steps(chunk.start, &mut chunk.exits)?;
        self.arena.patch(chunk.exits, again);
        let mut exits = PatchList::default();
        self.skip_or_exit(again, skip, &mut exits)?;
        Ok(Chunk { start: chunk.start, exits, fresh: chunk.fresh })
    }
}

/// Returns the length of the UTF-8 sequence introduced by `lead`, or `None`
/// if `lead` cannot start a multi-byte sequence.
fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0b1100_0000..=0b1101_1111 => Some(2),
        0b1110_0000..=0b1110_1111 => Some(3),
        0b1111_0000..=0b1111_0111 => Some(4),
        _ => None,
    }
}
