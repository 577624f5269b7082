use std::sync::Arc;

use crate::compiler;
use crate::error::Error;
use crate::executor::Prefilter;
use crate::{Inner, Regex};

/// The options that shape compilation and execution.
#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) utf8: bool,
    pub(crate) size_limit: usize,
    pub(crate) prefilter: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config { utf8: true, size_limit: 10 * (1 << 20), prefilter: true }
    }
}

/// A configurable builder for a [`Regex`].
///
/// The default configuration is the one used by [`Regex::new`].
///
/// # Example
///
/// ```
/// use tasty_regex::RegexBuilder;
///
/// let re = RegexBuilder::new("caf\u{e9}").utf8(false).build()?;
/// assert_eq!(re.run_str("un caf\u{e9}")?.len(), 1);
/// # Ok::<(), tasty_regex::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct RegexBuilder {
    pattern: Vec<u8>,
    config: Config,
}

impl RegexBuilder {
    /// Creates a builder for `pattern`.
    pub fn new(pattern: &str) -> RegexBuilder {
        RegexBuilder::from_bytes(pattern.as_bytes())
    }

    /// Creates a builder for a pattern that need not be valid UTF-8.
    pub fn from_bytes(pattern: &[u8]) -> RegexBuilder {
        RegexBuilder { pattern: pattern.to_vec(), config: Config::default() }
    }

    /// Compiles the pattern with the current options.
    ///
    /// Any syntax error, or exceeding the size limit, is returned as an
    /// [`Error`] carrying its [`ErrorKind`](crate::ErrorKind).
    pub fn build(&self) -> Result<Regex, Error> {
        let automaton = compiler::compile(&self.pattern, &self.config)?;
        let prefilter = if self.config.prefilter {
            Prefilter::new(&automaton)
        } else {
            None
        };
        let inner = Inner {
            pattern: self.pattern.clone().into_boxed_slice(),
            automaton,
            prefilter,
        };
        Ok(Regex { inner: Arc::new(inner) })
    }

    /// Whether a non-ASCII lead byte starts a multi-byte literal.
    ///
    /// When enabled (the default), a byte of the form `110xxxxx`,
    /// `1110xxxx` or `11110xxx` takes the following 1, 2 or 3 bytes with it
    /// and a quantifier after it repeats the whole sequence. Any other byte
    /// at or above `0x80` is an [`InvalidUtf8`](crate::ErrorKind::InvalidUtf8)
    /// error.
    ///
    /// When disabled, every byte is a literal of its own.
    pub fn utf8(&mut self, yes: bool) -> &mut RegexBuilder {
        self.config.utf8 = yes;
        self
    }

    /// Sets the approximate size, in bytes, that the compiled automaton may
    /// occupy. Compiling a larger one fails with
    /// [`OutOfMemory`](crate::ErrorKind::OutOfMemory).
    ///
    /// Every state costs a fixed 2 KiB. The default is 10 MiB.
    pub fn size_limit(&mut self, bytes: usize) -> &mut RegexBuilder {
        self.config.size_limit = bytes;
        self
    }

    /// Whether a run may skip ahead to the next byte that can start a match
    /// while no candidate match is in progress.
    ///
    /// This never changes the result. It has no effect unless the
    /// `perf-literal` feature is enabled.
    pub fn prefilter(&mut self, yes: bool) -> &mut RegexBuilder {
        self.config.prefilter = yes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.utf8);
        assert!(config.prefilter);
        assert_eq!(config.size_limit, 10 * 1024 * 1024);
    }

    #[test]
    fn utf8_toggle() {
        let err = RegexBuilder::from_bytes(b"\xff").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUtf8);

        let re = RegexBuilder::from_bytes(b"\xff").utf8(false).build().unwrap();
        assert_eq!(re.run(b"a\xffb").unwrap().len(), 1);
    }

    #[test]
    fn size_limit_applies() {
        let err = RegexBuilder::new("abc").size_limit(0).build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    }

    #[test]
    fn builder_is_reusable() {
        let mut builder = RegexBuilder::new("ab");
        let first = builder.build().unwrap();
        let second = builder.prefilter(false).build().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(
            first.run_str("abab").unwrap().len(),
            second.run_str("abab").unwrap().len()
        );
    }
}
