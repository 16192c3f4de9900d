use assert_cmd::Command as AssertCommand;
use predicates::prelude::PredicateBooleanExt;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use taskprobe_test_utils::harness::TestContext;

fn taskprobe(ctx: &TestContext) -> AssertCommand {
    let mut cmd = AssertCommand::new(env!("CARGO_BIN_EXE_taskprobe"));
    cmd.env("XDG_CONFIG_HOME", &ctx.config_dir);
    cmd.env("XDG_CACHE_HOME", ctx.test_root.join("cache"));
    cmd.env("RUST_BACKTRACE", "1");
    cmd.env_remove("TASKPROBE_LOG_LEVEL");
    cmd
}

/// Answers `requests` HTTP requests with `200 {}` and returns the address.
fn health_stub(requests: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming().take(requests) {
            let mut stream = stream.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
            );
        }
    });
    format!("http://{}", addr)
}

#[test]
fn test_list_shows_every_scenario() {
    let ctx = TestContext::new();
    taskprobe(&ctx)
        .arg("list")
        .assert()
        .success()
        .stdout(predicates::str::contains("Available scenarios:"))
        .stdout(predicates::str::contains("kill-transparency"))
        .stdout(predicates::str::contains("cleanup-after-kill"))
        .stdout(predicates::str::contains("cleanup-after-failure"))
        .stdout(predicates::str::contains("exhaustive-kill"));
}

#[test]
fn test_run_rejects_unknown_scenario_before_connecting() {
    let ctx = TestContext::new();
    taskprobe(&ctx)
        .args(["run", "kill-transparency", "no-such-scenario"])
        .assert()
        .failure()
        .stderr(predicates::str::contains(
            "Unknown scenario 'no-such-scenario'",
        ))
        .stderr(predicates::str::contains("job tracker").not());
}

#[test]
fn test_run_requires_a_scenario_or_all() {
    let ctx = TestContext::new();
    taskprobe(&ctx).arg("run").assert().failure();
    taskprobe(&ctx)
        .args(["run", "--all", "exhaustive-kill"])
        .assert()
        .failure();
}

#[test]
fn test_missing_explicit_config_is_an_error() {
    let ctx = TestContext::new();
    let missing = ctx.test_root.join("nope.toml");
    taskprobe(&ctx)
        .arg("--config")
        .arg(&missing)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicates::str::contains("[ERROR]"))
        .stderr(predicates::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_config_is_reported() {
    let ctx = TestContext::new();
    let path = ctx.test_root.join("bad.toml");
    std::fs::write(&path, "[budgets.cleanup]\nmax_attempts = 0\ninterval_ms = 10\n").unwrap();
    taskprobe(&ctx)
        .arg("--config")
        .arg(&path)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicates::str::contains("budget 'cleanup'"));
}

#[test]
fn test_ping_unreachable_tracker_fails() {
    let ctx = TestContext::new();
    taskprobe(&ctx)
        .arg("ping")
        .assert()
        .failure()
        .stderr(predicates::str::contains("[ERROR]"));
}

#[test]
fn test_ping_reachable_tracker() {
    let url = health_stub(1);
    let ctx = TestContext::with_tracker_url(&url);
    taskprobe(&ctx)
        .arg("ping")
        .assert()
        .success()
        .stdout(predicates::str::contains("is reachable"));
}

#[test]
fn test_run_against_unreachable_tracker_fails() {
    let ctx = TestContext::new();
    taskprobe(&ctx)
        .args(["run", "--all"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("[ERROR]"));
}
