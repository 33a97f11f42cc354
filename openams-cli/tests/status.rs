use predicates::prelude::*;
use rstest::rstest;

mod common;

#[rstest]
#[case::missing(None, "N/A")]
#[case::empty(Some(""), "N/A")]
#[case::corrupt(Some("{ not json"), "N/A")]
#[case::fps_only(Some(r#"{"fps_uuid":"1A2B3C"}"#), "1a2b3c")]
fn test_status_tolerates_any_record(#[case] state: Option<&str>, #[case] expected: &str) {
    let mut ctx = common::openams();
    if let Some(state) = state {
        ctx.write_state(state);
    }

    ctx.cmd
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("FPS"))
        .stdout(predicate::str::contains("Mainboard"))
        .stdout(predicate::str::contains(expected));
}

#[test]
fn test_status_json() {
    let mut ctx = common::openams();
    ctx.write_state(r#"{"fps_uuid":"1a2b3c","mainboard_uuid":"4d5e6f"}"#);

    ctx.cmd
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""fps_uuid": "1a2b3c""#))
        .stdout(predicate::str::contains(r#""mainboard_uuid": "4d5e6f""#));
}

#[test]
fn test_status_reports_log_path() {
    let mut ctx = common::openams();
    let log = ctx.path("logs/openams.log");

    ctx.cmd
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(log.display().to_string()));
}
