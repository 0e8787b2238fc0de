use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;

const NO_WINDOW: &str = "PDF_EDITOR_NO_WINDOW";

fn plan_for(args: &[&std::ffi::OsStr]) -> Value {
    let output = cargo_bin_cmd!("pdf-editor")
        .args(args)
        .env(NO_WINDOW, "1")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn help_names_the_file_argument() {
    cargo_bin_cmd!("pdf-editor")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[FILE]"));
}

#[test]
fn version_prints_the_package_version() {
    cargo_bin_cmd!("pdf-editor")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn startup_plan_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = temp.path().join("doc.pdf");
    std::fs::write(&file, b"%PDF-1.7\n").expect("write should succeed");

    let mut value = plan_for(&[file.as_os_str()]);
    assert_eq!(value["open"], Value::String(file.display().to_string()));
    value["open"] = Value::String("<FILE>".to_owned());
    value["version"] = Value::String("<VERSION>".to_owned());

    insta::assert_json_snapshot!("startup_plan_with_file", value);
}

#[test]
fn no_file_means_an_empty_window() {
    let value = plan_for(&[]);
    assert_eq!(value["open"], Value::Null);
    assert_eq!(value["warning"], Value::Null);
}

#[test]
fn missing_file_is_a_warning_not_a_failure() {
    let value = plan_for(&[std::ffi::OsStr::new("/definitely/not/here.pdf")]);
    assert_eq!(value["open"], Value::Null);
    let warning = value["warning"].as_str().expect("warning should be a string");
    assert!(warning.starts_with("file does not exist"));
}

#[test]
fn two_files_are_rejected() {
    cargo_bin_cmd!("pdf-editor")
        .args(["a.pdf", "b.pdf"])
        .env(NO_WINDOW, "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
