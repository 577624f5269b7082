use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn cli_prints_every_match() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("I (love|(dis)?like) (cat|dog|gopher)s")
        .arg("src/tests/testdata/pets.txt")
        .assert()
        .success()
        .stdout(
            "src/tests/testdata/pets.txt:0-11:I love cats\n\
             src/tests/testdata/pets.txt:17-28:I like dogs\n\
             src/tests/testdata/pets.txt:34-51:I dislike gophers\n",
        );
}

#[test]
fn cli_reads_stdin() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("(ooga|boga) +boo")
        .write_stdin("boogity oogaoogaooga boo boga boo ooga")
        .assert()
        .success()
        .stdout("16-24:ooga boo\n25-33:boga boo\n");
}

#[test]
fn cli_count() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("--count")
        .arg("oo")
        .arg("src/tests/testdata/ooga.txt")
        .arg("src/tests/testdata/pets.txt")
        .assert()
        .success()
        .stdout(predicate::str::contains("src/tests/testdata/pets.txt:0\n"));
}

#[test]
fn cli_no_match() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("zebra")
        .arg("src/tests/testdata/pets.txt")
        .assert()
        .code(1)
        .stdout("");
}

#[test]
fn cli_invalid_pattern() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("(abc")
        .write_stdin("abc")
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "unbalanced parentheses at offset 0",
        ));
}

#[test]
fn cli_missing_file() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("a")
        .arg("src/tests/testdata/missing.txt")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("can not read"));
}

#[test]
fn cli_dump() {
    Command::cargo_bin("tasty-grep")
        .unwrap()
        .arg("--dump")
        .arg("ab")
        .assert()
        .success()
        .stdout(predicate::str::contains("'b' => MATCH"));
}

#[test]
fn cli_definition() {
    super::cli().debug_assert();
}
