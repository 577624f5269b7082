use std::thread;

use tasty_regex::{ErrorKind, Regex, RegexBuilder};

use crate::spans;

#[test]
fn empty_haystack_has_no_matches() -> anyhow::Result<()> {
    let re = Regex::new("a*")?;
    assert!(re.run(b"")?.is_empty());
    assert!(!re.is_match(b"")?);
    Ok(())
}

#[test]
fn is_match_agrees_with_run() -> anyhow::Result<()> {
    let re = Regex::new("x(y|z)+")?;
    let haystacks: [&[u8]; 5] = [b"axyzb", b"xx", b"", b"zyx", b"xz"];
    for haystack in haystacks {
        assert_eq!(re.is_match(haystack)?, !re.run(haystack)?.is_empty());
    }
    Ok(())
}

#[test]
fn matches_iterate_in_order() -> anyhow::Result<()> {
    let re = Regex::new("ab|b")?;
    let matches = re.run(b"abab")?;
    let by_ref: Vec<_> = (&matches).into_iter().map(|m| m.range()).collect();
    let owned: Vec<_> = matches.into_iter().map(|m| m.range()).collect();
    assert_eq!(by_ref, owned);
    assert_eq!(owned, vec![1..2, 0..2, 3..4, 2..4]);
    Ok(())
}

#[test]
fn prefilter_does_not_change_results() -> anyhow::Result<()> {
    let haystack = b"zzz hello zz help hel hello";
    for pattern in ["hel(lo|p)", "h+e", "(x|y|z)+ h", "l?o"] {
        let with = RegexBuilder::new(pattern).build()?;
        let without = RegexBuilder::new(pattern).prefilter(false).build()?;
        assert_eq!(spans(&with, haystack)?, spans(&without, haystack)?);
    }
    Ok(())
}

#[test]
fn compiling_twice_is_equivalent() -> anyhow::Result<()> {
    let haystack = b"aabacabadabacaba";
    let first = Regex::new("(a|b)+c?")?;
    let second = Regex::new("(a|b)+c?")?;
    assert_eq!(first.state_count(), second.state_count());
    assert_eq!(spans(&first, haystack)?, spans(&second, haystack)?);
    Ok(())
}

#[test]
fn shared_across_threads() -> anyhow::Result<()> {
    let re = Regex::new("o+")?;
    let expected = spans(&re, b"foo boo")?;
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let re = re.clone();
            thread::spawn(move || {
                re.run(b"foo boo")
                    .map(|found| {
                        found
                            .iter()
                            .map(|m| (m.start(), m.end()))
                            .collect::<Vec<_>>()
                    })
            })
        })
        .collect();
    for handle in handles {
        let found: Vec<(usize, usize)> = handle.join().unwrap()?;
        assert_eq!(found, expected);
    }
    Ok(())
}

#[test]
fn haystack_outlives_regex() -> anyhow::Result<()> {
    let haystack = String::from("one two");
    let matches = {
        let re = Regex::new("o")?;
        re.run_str(&haystack)?
    };
    assert_eq!(matches.len(), 2);
    Ok(())
}

#[test]
fn deeply_nested_groups() -> anyhow::Result<()> {
    let depth = 10_000;
    let re = Regex::new(&format!("{}a{}", "(".repeat(depth), ")".repeat(depth)))?;
    assert_eq!(spans(&re, b"bab")?, vec![(1, 2)]);

    let err = Regex::new(&"(".repeat(depth)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyExpression);
    assert_eq!(err.offset(), Some(depth));
    Ok(())
}

#[test]
fn wildcard_loop_in_alternation_stays_linear() -> anyhow::Result<()> {
    for width in [4, 8, 11, 12, 16, 32, 64] {
        let pattern = format!("(.*a{}|b)", ".".repeat(width));
        let re = Regex::new(&pattern)?;
        assert!(
            re.state_count() <= 4 * (pattern.len() + 1),
            "{} states for {:?}",
            re.state_count(),
            pattern
        );
        assert!(re.is_match(b"b")?);
    }
    Ok(())
}
