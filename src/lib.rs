/*!
A small byte oriented regular expression engine that reports every match in
a single pass.

A pattern is compiled in one pass into a flat automaton: every state holds a
256 slot transition table indexed by byte, where slot `0` is a "skip"
transition taken without consuming input. Fragments are glued together with
Thompson's construction and backpatching, and alternatives that start with
the same byte are merged so that the automaton stays deterministic on the
bytes it consumes.

A run walks the haystack once, left to right. Every offset at which the
automaton can consume a byte starts a candidate match, and all candidates
advance in lockstep. A candidate that reaches the end of the pattern is
reported, so matches may overlap and several of them may share an end.

# Example

```
use tasty_regex::Regex;

let re = Regex::new("I (love|(dis)?like) (cat|dog|gopher)s")?;
let haystack = "I love cats, and I like dogs, but I dislike gophers";
let found: Vec<&[u8]> = re.run_str(haystack)?.iter().map(|m| m.as_bytes()).collect();
assert_eq!(found, vec![
    &b"I love cats"[..],
    &b"I like dogs"[..],
    &b"I dislike gophers"[..],
]);
# Ok::<(), tasty_regex::Error>(())
```

# Syntax

```text
x        a literal byte
.        any byte except NUL
\x       x, where x is one of \ * + . ( ) ? |
xy       concatenation
x|y      alternation
(x)      grouping
x?       zero or one x
x*       zero or more x
x+       one or more x
```

A multi-byte UTF-8 sequence in the pattern is a single literal, so `é+`
repeats the whole character. This can be turned off with
[`RegexBuilder::utf8`], in which case every byte is a literal of its own.

The pattern ends at its first NUL byte.

# Match semantics

* Matches are never empty.
* Matches come out ordered by their end offset. Matches sharing an end come
  out latest start first.
* Each offset starts at most one candidate, and a candidate follows a single
  path through the automaton. Whenever the next byte can be consumed it is,
  so a candidate never backtracks into a shorter alternative. Every reported
  match is accepted by the pattern, but not every accepted substring is
  reported.
* The NUL byte in a haystack is never consumed, not even by `.`.

# Crate features

* **std** (enabled by default) - Uses the standard library. Currently
  required.
* **perf-literal** (enabled by default) - Uses `memchr` to jump over parts of
  the haystack where no match can start.
* **logging** - Emits messages through the `log` crate while compiling and
  running patterns.
*/

#![deny(missing_docs)]

#[macro_use]
mod macros;

mod automaton;
mod builder;
mod compiler;
mod error;
mod executor;

use std::fmt;
use std::ops::{Deref, Range};
use std::str::FromStr;
use std::sync::Arc;

use crate::automaton::Automaton;
use crate::executor::{Executor, Prefilter};

pub use crate::builder::RegexBuilder;
pub use crate::error::{Error, ErrorKind};

/// A compiled pattern.
///
/// Compiled patterns are immutable and cheap to clone, and can be run from
/// many threads at once.
#[derive(Clone)]
pub struct Regex {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) pattern: Box<[u8]>,
    pub(crate) automaton: Automaton,
    pub(crate) prefilter: Option<Prefilter>,
}

impl Regex {
    /// Compiles `pattern` with the default configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use tasty_regex::{ErrorKind, Regex};
    ///
    /// assert!(Regex::new("(ooga|boga) +boo").is_ok());
    /// assert_eq!(Regex::new("*abc").unwrap_err().kind(), ErrorKind::NoOperand);
    /// ```
    pub fn new(pattern: &str) -> Result<Regex, Error> {
        RegexBuilder::new(pattern).build()
    }

    /// Compiles a pattern that need not be valid UTF-8 with the default
    /// configuration.
    pub fn from_bytes(pattern: &[u8]) -> Result<Regex, Error> {
        RegexBuilder::from_bytes(pattern).build()
    }

    /// Returns a builder for `pattern`, to compile it with a non-default
    /// configuration.
    pub fn builder(pattern: &str) -> RegexBuilder {
        RegexBuilder::new(pattern)
    }

    /// Returns every match in `haystack`.
    ///
    /// The only possible error is
    /// [`OutOfMemory`](ErrorKind::OutOfMemory), in which case nothing is
    /// returned.
    ///
    /// # Example
    ///
    /// ```
    /// use tasty_regex::Regex;
    ///
    /// let re = Regex::new("a+b")?;
    /// let spans: Vec<_> = re.run(b"aab")?.iter().map(|m| m.range()).collect();
    /// assert_eq!(spans, vec![1..3, 0..3]);
    /// # Ok::<(), tasty_regex::Error>(())
    /// ```
    pub fn run<'h>(&self, haystack: &'h [u8]) -> Result<Matches<'h>, Error> {
        let matches = self
            .executor()
            .run(haystack, |start, end| Match::new(haystack, start, end))?;
        Ok(Matches { matches })
    }

    /// Like [`Regex::run`], for a haystack that is a string.
    pub fn run_str<'h>(&self, haystack: &'h str) -> Result<Matches<'h>, Error> {
        self.run(haystack.as_bytes())
    }

    /// Returns true if [`Regex::run`] would report at least one match.
    ///
    /// This stops at the first match it finds.
    pub fn is_match(&self, haystack: &[u8]) -> Result<bool, Error> {
        self.executor().is_match(haystack)
    }

    /// Returns the pattern this was compiled from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.inner.pattern
    }

    /// Returns the number of states in the compiled automaton, including
    /// any that ended up unreachable.
    pub fn state_count(&self) -> usize {
        self.inner.automaton.len()
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(&self.inner.automaton, self.inner.prefilter.as_ref())
    }
}

/// Dumps the reachable states of the automaton.
impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Regex({:?})",
            String::from_utf8_lossy(&self.inner.pattern)
        )?;
        write!(f, "{:?}", self.inner.automaton)
    }
}

impl FromStr for Regex {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Regex, Error> {
        Regex::new(pattern)
    }
}

/// A single match, borrowing the haystack it was found in.
///
/// A match is never empty.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Match<'h> {
    haystack: &'h [u8],
    start: usize,
    end: usize,
}

impl<'h> Match<'h> {
    fn new(haystack: &'h [u8], start: usize, end: usize) -> Match<'h> {
        Match { haystack, start, end }
    }

    /// Returns the offset of the first byte of the match.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the offset just past the last byte of the match.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns `start..end`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Returns the length of the match, in bytes. This is never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns the matched bytes.
    pub fn as_bytes(&self) -> &'h [u8] {
        &self.haystack[self.range()]
    }
}

impl<'h> fmt::Debug for Match<'h> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("bytes", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl<'h> From<Match<'h>> for Range<usize> {
    fn from(m: Match<'h>) -> Range<usize> {
        m.range()
    }
}

/// The matches of one run, in the order they were found.
#[derive(Clone, Debug)]
pub struct Matches<'h> {
    matches: Vec<Match<'h>>,
}

impl<'h> Matches<'h> {
    /// Returns the matches as a vector.
    pub fn into_vec(self) -> Vec<Match<'h>> {
        self.matches
    }
}

impl<'h> Deref for Matches<'h> {
    type Target = [Match<'h>];

    fn deref(&self) -> &[Match<'h>] {
        &self.matches
    }
}

impl<'h> IntoIterator for Matches<'h> {
    type Item = Match<'h>;
    type IntoIter = std::vec::IntoIter<Match<'h>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.into_iter()
    }
}

impl<'a, 'h> IntoIterator for &'a Matches<'h> {
    type Item = &'a Match<'h>;
    type IntoIter = std::slice::Iter<'a, Match<'h>>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn regex_is_send_and_sync() {
        assert_send_sync::<Regex>();
    }

    #[test]
    fn match_accessors() {
        let re = Regex::new("b+").unwrap();
        let matches = re.run(b"abbc").unwrap();
        assert_eq!(matches.len(), 1);
        let m = matches[0];
        assert_eq!(m.start(), 1);
        assert_eq!(m.end(), 3);
        assert_eq!(m.range(), 1..3);
        assert_eq!(m.len(), 2);
        assert_eq!(m.as_bytes(), b"bb");
        assert_eq!(Range::from(m), 1..3);
    }

    #[test]
    fn from_str() {
        let re: Regex = "a|b".parse().unwrap();
        assert_eq!(re.as_bytes(), b"a|b");
        assert!("(".parse::<Regex>().is_err());
    }

    #[test]
    fn debug_dumps_automaton() {
        let re = Regex::new("a").unwrap();
        let dump = format!("{:?}", re);
        assert!(dump.starts_with("Regex(\"a\")\n"));
        assert!(dump.contains("'a' => MATCH"));
    }
}
