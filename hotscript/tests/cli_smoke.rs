use std::path::Path;
use std::process::Command;

fn write_program(dir: &Path, json: &str) -> String {
    let path = dir.join("prog.json");
    std::fs::write(&path, json).expect("write program");
    path.to_str().expect("temp path must be UTF-8").to_string()
}

#[test]
fn run_prints_echo_output_and_json_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let prog = write_program(
        dir.path(),
        r#"{
            "name": "smoke.hks",
            "items": [
                { "cmd": ":=", "args": ["x", "1"] },
                { "cmd": "Loop", "args": ["3"] },
                { "cmd": ":=", "args": ["x", "x + 1"] },
                { "cmd": "Echo", "args": ["x is %x%"] },
                { "cmd": "return" },
                { "label": "poke" },
                { "cmd": "Echo", "args": ["poked"] },
                { "cmd": "return" }
            ]
        }"#,
    );

    let out = Command::new(env!("CARGO_BIN_EXE_hotscript"))
        .args(["run", &prog, "--trigger", "poke", "--json"])
        .env("HOTSCRIPT_LOG", "off")
        .output()
        .expect("run hotscript");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("x is 4"));
    assert_eq!(lines.next(), Some("poked"));
    let report: serde_json::Value =
        serde_json::from_str(&lines.collect::<Vec<_>>().join("\n")).expect("json report");
    assert_eq!(report["program"], "smoke.hks");
    assert_eq!(report["vars"]["x"], "4");
    assert_eq!(report["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn runtime_errors_fail_the_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let prog = write_program(
        dir.path(),
        r#"{ "items": [ { "cmd": ":=", "args": ["y", "1 / 0"], "line": 3 } ] }"#,
    );
    let out = Command::new(env!("CARGO_BIN_EXE_hotscript"))
        .args(["run", &prog])
        .env("HOTSCRIPT_LOG", "off")
        .output()
        .expect("run hotscript");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("divide by zero"), "stderr: {stderr}");
    assert!(stderr.contains("prog.json:3"), "stderr: {stderr}");
}

#[test]
fn check_rejects_a_jump_into_a_loop() {
    let dir = tempfile::tempdir().expect("temp dir");
    let prog = write_program(
        dir.path(),
        r#"{ "items": [
            { "cmd": "Goto", "args": ["inside"] },
            { "cmd": "Loop", "args": ["2"] },
            { "cmd": "{" },
            { "label": "inside" },
            { "cmd": "Echo" },
            { "cmd": "}" }
        ] }"#,
    );
    let out = Command::new(env!("CARGO_BIN_EXE_hotscript"))
        .args(["check", &prog])
        .env("HOTSCRIPT_LOG", "off")
        .output()
        .expect("run hotscript");
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("cannot jump into"), "stderr: {stderr}");
}

#[test]
fn check_lists_lines() {
    let dir = tempfile::tempdir().expect("temp dir");
    let prog = write_program(
        dir.path(),
        r#"{ "items": [
            { "cmd": "if", "args": ["x", "=", "1"] },
            { "cmd": "Echo", "args": ["one"] },
            { "cmd": "else" },
            { "cmd": "Echo", "args": ["other"] }
        ] }"#,
    );
    let out = Command::new(env!("CARGO_BIN_EXE_hotscript"))
        .args(["check", &prog, "--list"])
        .env("HOTSCRIPT_LOG", "off")
        .output()
        .expect("run hotscript");
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("prog.json: ok (5 lines, 0 labels)"), "{stdout}");
    assert!(stdout.lines().next().is_some_and(|l| l.contains("If")), "{stdout}");
}
