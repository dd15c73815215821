use std::process::Command;

fn run(fixture: &str) -> (String, String, bool) {
    run_with_log(fixture, "warn")
}

fn run_with_log(fixture: &str, level: &str) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let output = Command::new(env!("CARGO_BIN_EXE_points-ledger"))
        .arg(&path)
        .env("RUST_LOG", level)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success) = run("valid.csv");

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "payer,points",
            "DANNON,1000",
            "MILLER COORS,5300",
            "UNILEVER,0",
        ]
    );
}

#[test]
fn spend_debits_logged_at_info() {
    let (_, stderr, success) = run_with_log("valid.csv", "info");

    assert!(success);
    let spend = stderr
        .lines()
        .find(|line| line.contains("spend applied"))
        .expect("no spend event");
    assert!(spend.contains("INFO"));
    assert!(spend.contains("debits"));
    assert!(spend.contains("DANNON -100, UNILEVER -200, MILLER COORS -4700"));
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv");

    assert!(success);
    assert!(stderr.contains("unrecognized command type 'bogus'"));
    assert!(stderr.contains("payer name is required"));
    assert!(stderr.contains("timestamp cannot be in the future"));
    assert!(stderr.contains("points must be a positive value"));

    // the 1000 point spend is rejected by the ledger, the correction is applied
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec!["payer,points", "DANNON,250"]);
}

#[test]
fn missing_file_fails() {
    let (stdout, stderr, success) = run("missing.csv");

    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("failed to open"));
}
