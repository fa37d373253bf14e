use assert_cmd::Command;
use predicates::prelude::*;
use quire_test_support::BookFixture;

fn quire(fixture: &BookFixture) -> Command {
    let mut cmd = Command::cargo_bin("quire").expect("binary");
    cmd.current_dir(fixture.root()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn renders_book_and_reports_summary() {
    let fixture = BookFixture::new();
    fixture
        .manifest("- {title: Intro, path: intro.md}\n- {title: Usage, path: usage.md}\n")
        .write("intro.md", "# Hello\n")
        .write("usage.md", "# Usage\n");

    quire(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 2 page(s)"));

    assert_eq!(
        BookFixture::files_under(&fixture.output()),
        vec!["intro.html".to_string(), "usage.html".to_string()]
    );
    assert!(fixture
        .read_output("intro.html")
        .contains("<h1 id=\"hello\">Hello</h1>"));
}

#[test]
fn missing_source_exits_with_code_four() {
    let fixture = BookFixture::new();
    fixture.manifest("- {title: Gone, path: missing.md}\n");

    let output = quire(&fixture)
        .assert()
        .code(4)
        .stdout(predicate::str::is_empty())
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(output).expect("stderr utf8");
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(lines.len(), 1, "{stderr}");
    assert!(lines[0].starts_with("quire error: "));
    assert!(lines[0].contains("missing.md"));
    assert!(!fixture.output().exists());
}

#[test]
fn conversion_failure_prints_a_single_plain_diagnostic() {
    let fixture = BookFixture::new();
    fixture
        .manifest("- {title: A, path: a.md}\n")
        .write("a.md", "---\ntitle: never closed\n# A\n");

    let output = quire(&fixture)
        .assert()
        .code(5)
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(output).expect("stderr utf8");
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(lines.len(), 1, "{stderr}");
    assert!(!stderr.contains('\u{1b}'), "{stderr:?}");
    assert!(lines[0].starts_with("quire error: failed to convert "));
    assert!(lines[0].contains("unterminated front matter"));
    assert!(!lines[0].contains("/./"), "{stderr}");
}

#[test]
fn unknown_flag_is_a_usage_failure() {
    let fixture = BookFixture::new();
    quire(&fixture)
        .arg("--bogus")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
}

#[test]
fn help_exits_successfully() {
    let fixture = BookFixture::new();
    quire(&fixture)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--manifest"));
}

#[test]
fn missing_manifest_exits_with_code_two() {
    let fixture = BookFixture::new();
    quire(&fixture)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("structure.yml"));
}

#[test]
fn malformed_manifest_exits_with_code_three() {
    let fixture = BookFixture::new();
    fixture.manifest("- {title: A, path: a.md, colour: red}\n");
    quire(&fixture)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("quire error: malformed manifest"));
}

#[test]
fn invalid_configuration_exits_with_code_one() {
    let fixture = BookFixture::new();
    fixture
        .write(".quire.toml", "[render]\nextension = \"\"\n")
        .manifest("[]\n");
    quire(&fixture)
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("quire error: "));
}

#[test]
fn json_report_goes_to_stdout() {
    let fixture = BookFixture::new();
    fixture
        .manifest("- {title: Intro, path: intro.md}\n")
        .write("intro.md", "```rust\nfn main() {\n```\n");

    let output = quire(&fixture)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    let pages = report["pages"].as_array().expect("pages array");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0]["title"], "Intro");
    assert_eq!(pages[0]["output"], "intro.html");
    assert_eq!(pages[0]["sample_issues"][0]["line"], 2);
    assert!(report["contents"].is_null());
}

#[test]
fn flags_override_configured_paths() {
    let fixture = BookFixture::new();
    fixture
        .write("book/toc.yml", "- {title: Intro, path: intro.md}\n")
        .write("book/src/intro.md", "# Intro\n");

    quire(&fixture)
        .args([
            "--root",
            "book/src",
            "--manifest",
            "book/toc.yml",
            "--out",
            "site",
            "-q",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(
        BookFixture::files_under(&fixture.root().join("site")),
        vec!["intro.html".to_string()]
    );
}

#[test]
fn empty_manifest_succeeds_without_output_files() {
    let fixture = BookFixture::new();
    fixture.manifest("# nothing yet\n");

    quire(&fixture)
        .assert()
        .success()
        .stdout(predicate::str::contains("Rendered 0 page(s)"));
    assert!(BookFixture::files_under(&fixture.output()).is_empty());
}
