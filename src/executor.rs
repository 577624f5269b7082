use std::ops::ControlFlow;

use crate::automaton::{Automaton, StateId, Step};
use crate::error::Error;

/// The number of accumulators and matches reserved up front. Both arenas
/// grow fallibly past this.
const INITIAL_CAPACITY: usize = 1 << 10;

/// A candidate match in flight.
#[derive(Clone, Copy, Debug)]
struct Accumulator {
    /// Where the automaton currently is for this candidate.
    state: StateId,
    /// The haystack offset at which the candidate started.
    start: usize,
    done: bool,
}

/// Runs a compiled automaton over haystacks.
///
/// All mutable state lives in a single call, so one executor may be used
/// from many threads at once.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Executor<'r> {
    automaton: &'r Automaton,
    prefilter: Option<&'r Prefilter>,
}

impl<'r> Executor<'r> {
    pub(crate) fn new(
        automaton: &'r Automaton,
        prefilter: Option<&'r Prefilter>,
    ) -> Executor<'r> {
        Executor { automaton, prefilter }
    }

    /// Returns every match in `haystack` as built by `make`, in the order
    /// they are found.
    pub(crate) fn run<T>(
        &self,
        haystack: &[u8],
        mut make: impl FnMut(usize, usize) -> T,
    ) -> Result<Vec<T>, Error> {
        let mut matches = Vec::new();
        matches.try_reserve(haystack.len().min(INITIAL_CAPACITY))?;
        let mut failed = None;
        self.scan(haystack, |start, end| {
            if let Err(err) = matches.try_reserve(1) {
                failed = Some(Error::from(err));
                return ControlFlow::Break(());
            }
            matches.push(make(start, end));
            ControlFlow::Continue(())
        })?;
        if let Some(err) = failed {
            return Err(err);
        }
        trace!(
            "found {} matches in {} bytes",
            matches.len(),
            haystack.len()
        );
        Ok(matches)
    }

    /// Returns true as soon as one match is found.
    pub(crate) fn is_match(&self, haystack: &[u8]) -> Result<bool, Error> {
        let mut found = false;
        self.scan(haystack, |_, _| {
            found = true;
            ControlFlow::Break(())
        })?;
        Ok(found)
    }

    /// Scans `haystack` once, left to right, calling `emit` with the bounds
    /// of every match. The scan stops early if `emit` breaks.
    ///
    /// At every offset, the live accumulators are advanced over the byte
    /// there, newest first, and then a new accumulator is started if the
    /// initial state consumes that byte. Matches therefore come out ordered
    /// by end offset, and among those with the same end, by descending
    /// start offset.
    fn scan(
        &self,
        haystack: &[u8],
        mut emit: impl FnMut(usize, usize) -> ControlFlow<()>,
    ) -> Result<(), Error> {
        let automaton = self.automaton;
        let initial = automaton.initial();
        let mut live: Vec<Accumulator> = Vec::new();
        live.try_reserve(haystack.len().min(INITIAL_CAPACITY))?;

        let mut at = 0;
        while at < haystack.len() {
            if live.is_empty() {
                if let Some(prefilter) = self.prefilter {
                    match prefilter.find(haystack, at) {
                        Some(next) => at = next,
                        None => break,
                    }
                }
            }
            let byte = haystack[at];
            let mut ended = false;
            for acc in live.iter_mut().rev() {
                let satisfied = if acc.state.is_matching() {
                    true
                } else {
                    match automaton.advance(acc.state, byte) {
                        Step::Consume(next) => {
                            acc.state = next;
                            continue;
                        }
                        Step::Satisfied => true,
                        Step::Dead => false,
                    }
                };
                acc.done = true;
                ended = true;
                if satisfied && emit(acc.start, at).is_break() {
                    return Ok(());
                }
            }
            if ended {
                live.retain(|acc| !acc.done);
            }

            if let Step::Consume(state) = automaton.advance(initial, byte) {
                live.try_reserve(1)?;
                live.push(Accumulator { state, start: at, done: false });
            }
            at += 1;
        }

        for acc in live.iter().rev() {
            if automaton.skips_to_match(acc.state)
                && emit(acc.start, haystack.len()).is_break()
            {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// Finds the next offset at which a match can start.
///
/// Only consulted while no accumulator is live: at such offsets the only
/// thing that can happen is a new accumulator being started, which needs
/// the initial state to consume the byte there.
#[cfg(feature = "perf-literal")]
#[derive(Clone, Debug)]
pub(crate) enum Prefilter {
    /// No byte can start a match.
    Never,
    One(u8),
    Two(u8, u8),
    Three(u8, u8, u8),
}

#[cfg(feature = "perf-literal")]
impl Prefilter {
    /// Builds a prefilter from the bytes the initial state consumes, if
    /// there are few enough of them to be worth searching for.
    pub(crate) fn new(automaton: &Automaton) -> Option<Prefilter> {
        let initial = automaton.initial();
        let mut bytes = Vec::with_capacity(3);
        for byte in 1..=u8::MAX {
            if let Step::Consume(_) = automaton.advance(initial, byte) {
                if bytes.len() == 3 {
                    return None;
                }
                bytes.push(byte);
            }
        }
        Some(match bytes[..] {
            [] => Prefilter::Never,
            [b1] => Prefilter::One(b1),
            [b1, b2] => Prefilter::Two(b1, b2),
            [b1, b2, b3] => Prefilter::Three(b1, b2, b3),
            _ => return None,
        })
    }

    fn find(&self, haystack: &[u8], at: usize) -> Option<usize> {
        let rest = &haystack[at..];
        let found = match *self {
            Prefilter::Never => None,
            Prefilter::One(b1) => memchr::memchr(b1, rest),
            Prefilter::Two(b1, b2) => memchr::memchr2(b1, b2, rest),
            Prefilter::Three(b1, b2, b3) => memchr::memchr3(b1, b2, b3, rest),
        };
        found.map(|i| at + i)
    }
}

/// Without `perf-literal` there is never a prefilter.
#[cfg(not(feature = "perf-literal"))]
#[derive(Clone, Debug)]
pub(crate) enum Prefilter {}

#[cfg(not(feature = "perf-literal"))]
impl Prefilter {
    pub(crate) fn new(_: &Automaton) -> Option<Prefilter> {
        None
    }

    fn find(&self, _: &[u8], _: usize) -> Option<usize> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Config;
    use crate::compiler::compile;

    fn automaton(pattern: &str) -> Automaton {
        compile(pattern.as_bytes(), &Config::default()).unwrap()
    }

    fn find_all(pattern: &str, haystack: &[u8]) -> Vec<(usize, usize)> {
        let automaton = automaton(pattern);
        let plain = Executor::new(&automaton, None)
            .run(haystack, |s, e| (s, e))
            .unwrap();
        let prefilter = Prefilter::new(&automaton);
        let filtered = Executor::new(&automaton, prefilter.as_ref())
            .run(haystack, |s, e| (s, e))
            .unwrap();
        assert_eq!(plain, filtered, "prefilter changed the result");
        plain
    }

    #[test]
    fn single_byte() {
        assert_eq!(find_all("a", b"banana"), vec![(1, 2), (3, 4), (5, 6)]);
    }

    #[test]
    fn literal_at_end() {
        assert_eq!(find_all("na", b"banana"), vec![(2, 4), (4, 6)]);
    }

    #[test]
    fn overlapping_starts() {
        // Every offset where a run of 'a' begins starts its own candidate.
        assert_eq!(
            find_all("a+b", b"aaab"),
            vec![(2, 4), (1, 4), (0, 4)]
        );
    }

    #[test]
    fn candidates_end_while_others_continue() {
        assert_eq!(find_all("aa", b"aaaa"), vec![(0, 2), (1, 3), (2, 4)]);
        assert_eq!(
            find_all("a+b", b"aaabaab"),
            vec![(2, 4), (1, 4), (0, 4), (5, 7), (4, 7)]
        );
    }

    #[test]
    fn satisfied_before_unconsumable_byte() {
        assert_eq!(find_all("ab*", b"abbxa"), vec![(0, 3), (4, 5)]);
    }

    #[test]
    fn trailing_match_by_skip() {
        assert_eq!(find_all("ab?", b"ab"), vec![(0, 2)]);
        assert_eq!(find_all("ab?", b"a"), vec![(0, 1)]);
    }

    #[test]
    fn empty_haystack() {
        assert_eq!(find_all("a*", b""), vec![]);
    }

    #[test]
    fn nullable_pattern_never_matches_empty() {
        assert_eq!(find_all("a*", b"bab"), vec![(1, 2)]);
    }

    #[test]
    fn nul_is_not_consumed() {
        assert_eq!(find_all(".", b"a\0b"), vec![(0, 1), (2, 3)]);
        assert_eq!(find_all("a.*", b"ab\0c"), vec![(0, 2)]);
    }

    #[test]
    fn alternation_with_shared_prefix() {
        assert_eq!(find_all("ab|ac", b"abac"), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn is_match_stops_early() {
        let automaton = automaton("b");
        let executor = Executor::new(&automaton, None);
        assert!(executor.is_match(b"abc").unwrap());
        assert!(!executor.is_match(b"acd").unwrap());
        assert!(!executor.is_match(b"").unwrap());
    }

    #[cfg(feature = "perf-literal")]
    #[test]
    fn prefilter_kinds() {
        assert!(matches!(
            Prefilter::new(&automaton("ab")),
            Some(Prefilter::One(b'a'))
        ));
        assert!(matches!(
            Prefilter::new(&automaton("x|y")),
            Some(Prefilter::Two(b'x', b'y'))
        ));
        assert!(matches!(
            Prefilter::new(&automaton("a?b?c")),
            Some(Prefilter::Three(b'a', b'b', b'c'))
        ));
        assert!(Prefilter::new(&automaton("a|b|c|d")).is_none());
        assert!(Prefilter::new(&automaton(".")).is_none());
    }

    #[cfg(feature = "perf-literal")]
    #[test]
    fn prefilter_find() {
        let prefilter = Prefilter::One(b'z');
        assert_eq!(prefilter.find(b"abzcz", 0), Some(2));
        assert_eq!(prefilter.find(b"abzcz", 3), Some(4));
        assert_eq!(prefilter.find(b"abzcz", 5), None);
        assert_eq!(Prefilter::Never.find(b"abc", 0), None);
    }
}
