use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{arg, command, value_parser, ArgMatches, Command};
use tasty_regex::{Regex, RegexBuilder};

#[cfg(test)]
mod tests;

const EXIT_MATCH: i32 = 0;
const EXIT_NO_MATCH: i32 = 1;
const EXIT_ERROR: i32 = 2;

fn cli() -> Command {
    command!()
        .about("Prints every match of PATTERN in each FILE")
        // Keep options sorted alphabetically by their long name.
        .arg(arg!(<PATTERN> "Pattern to search for"))
        .arg(
            arg!([FILE] ... "Files to search (standard input when none)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(-c --count "Print only the number of matches per input"))
        .arg(arg!(--dump "Print the compiled automaton and exit"))
        .arg(
            arg!(--"no-utf8")
                .help("Treat every pattern byte as a literal of its own"),
        )
}

fn main() {
    env_logger::init();

    let args = cli().get_matches();
    let code = match exec(&args) {
        Ok(true) => EXIT_MATCH,
        Ok(false) => EXIT_NO_MATCH,
        Err(err) => {
            eprintln!("error: {:#}", err);
            EXIT_ERROR
        }
    };
    process::exit(code);
}

/// Searches every input, returning true if anything matched.
fn exec(args: &ArgMatches) -> anyhow::Result<bool> {
    let pattern = args
        .get_one::<String>("PATTERN")
        .context("missing pattern")?;
    let re = RegexBuilder::new(pattern)
        .utf8(!args.get_flag("no-utf8"))
        .build()
        .with_context(|| format!("invalid pattern {:?}", pattern))?;

    let mut out = io::stdout().lock();
    if args.get_flag("dump") {
        write!(out, "{:?}", re)?;
        return Ok(true);
    }

    let count = args.get_flag("count");
    let mut found = false;
    match args.get_many::<PathBuf>("FILE") {
        None => {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("can not read standard input")?;
            found |= search(&re, None, &data, count, &mut out)?;
        }
        Some(paths) => {
            for path in paths {
                let data = fs::read(path).with_context(|| {
                    format!("can not read `{}`", path.display())
                })?;
                found |=
                    search(&re, Some(path.as_path()), &data, count, &mut out)?;
            }
        }
    }
    Ok(found)
}

/// Prints the matches of `re` in `data`, one per line, as
/// `path:start-end:bytes`. The path is left out for standard input.
fn search(
    re: &Regex,
    path: Option<&Path>,
    data: &[u8],
    count: bool,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let matches = re.run(data)?;
    if count {
        if let Some(path) = path {
            write!(out, "{}:", path.display())?;
        }
        writeln!(out, "{}", matches.len())?;
        return Ok(!matches.is_empty());
    }
    for m in &matches {
        if let Some(path) = path {
            write!(out, "{}:", path.display())?;
        }
        write!(out, "{}-{}:", m.start(), m.end())?;
        out.write_all(m.as_bytes())?;
        out.write_all(b"\n")?;
    }
    Ok(!matches.is_empty())
}
