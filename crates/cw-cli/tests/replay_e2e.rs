//! End-to-end tests for `cw replay`.
//!
//! Each test writes a scenario, runs the binary against it and inspects the
//! JSON transcript.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn cw_binary() -> String {
    env!("CARGO_BIN_EXE_cw").to_string()
}

fn cw(home: &Path) -> Command {
    let mut command = Command::new(cw_binary());
    command
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("RUST_LOG");
    command
}

/// Replays a scenario with `--json` and returns every transcript line.
fn replay(temp: &TempDir, scenario: &str) -> Vec<Value> {
    let path = temp.path().join("scenario.jsonl");
    std::fs::write(&path, scenario).unwrap();

    let output = cw(temp.path())
        .arg("replay")
        .arg(&path)
        .arg("--json")
        .output()
        .expect("failed to run cw replay");
    assert!(
        output.status.success(),
        "cw replay should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn deliveries(transcript: &[Value]) -> Vec<&Value> {
    transcript
        .iter()
        .filter(|entry| entry["event"] == "delivered")
        .map(|entry| &entry["message"])
        .collect()
}

fn status(transcript: &[Value]) -> &Value {
    &transcript.last().unwrap()["status"]
}

#[test]
fn test_missed_call_clears_dialer_notification() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"post","notification":{"key":"mc","package":"com.android.dialer","category":"missed_call"}}
{"step":"command","command":{"type":"register_consumer","identity":"summary"}}
{"step":"call","state":1,"number":"555-1234"}
{"step":"call","state":0,"number":""}
"#,
    );

    let calls: Vec<_> = transcript
        .iter()
        .filter(|entry| entry["event"] == "call")
        .map(|entry| (entry["call"]["kind"].as_str().unwrap(), entry["step"].as_u64().unwrap()))
        .collect();
    assert_eq!(calls, [("incoming_call", 4), ("missed_call", 5)]);

    let missed = transcript
        .iter()
        .find(|entry| entry["call"]["kind"] == "missed_call")
        .unwrap();
    assert_eq!(missed["call"]["number"], "555-1234");

    // Registration saw the dialer notification, the cleanup removed it.
    let counts: Vec<_> = deliveries(&transcript)
        .iter()
        .map(|m| m["count"].as_u64().unwrap())
        .collect();
    assert_eq!(counts, [1, 0]);
    assert_eq!(status(&transcript)["call_state"], "idle");
}

#[test]
fn test_answered_call_keeps_notifications() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"post","notification":{"key":"mc","package":"com.android.dialer","category":"missed_call"}}
{"step":"call","state":1,"number":"1"}
{"step":"call","state":2,"number":"1"}
{"step":"call","state":0,"number":"1"}
{"step":"command","command":{"type":"register_consumer","identity":"summary"}}
"#,
    );

    let kinds: Vec<_> = transcript
        .iter()
        .filter(|entry| entry["event"] == "call")
        .map(|entry| entry["call"]["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["incoming_call", "call_ongoing"]);
    assert_eq!(deliveries(&transcript)[0]["count"], 1);
}

#[test]
fn test_clear_missed_calls_spares_unclearable() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"command","command":{"type":"register_consumer","identity":"detailed"}}
{"step":"post","notification":{"key":"a","package":"com.android.dialer","category":"missed_call"}}
{"step":"post","notification":{"key":"b","package":"com.android.dialer","category":"missed_call","flags":32}}
{"step":"command","command":{"type":"clear_missed_calls"}}
"#,
    );

    let last = deliveries(&transcript).pop().unwrap().clone();
    let keys: Vec<_> = last["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, ["b"]);
    assert_eq!(last["notifications"][0]["clearable"], false);
}

#[test]
fn test_consumer_switch_changes_projection() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"post","notification":{"key":"w1","package":"com.whatsapp","title":"Hi"}}
{"step":"command","command":{"type":"register_consumer","identity":"detailed"}}
{"step":"command","command":{"type":"register_consumer","identity":"summary"}}
{"step":"post","notification":{"key":"w2","package":"com.whatsapp"}}
"#,
    );

    let consumers: Vec<_> = deliveries(&transcript)
        .iter()
        .map(|m| m["consumer"].as_str().unwrap())
        .collect();
    assert_eq!(consumers, ["detailed", "summary", "summary"]);
    assert_eq!(status(&transcript)["consumer"], "summary");
}

#[test]
fn test_reconnect_catches_up() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"command","command":{"type":"register_consumer","identity":"summary"}}
{"step":"disconnect"}
{"step":"post","notification":{"key":"w1","package":"com.whatsapp"}}
{"step":"post","notification":{"key":"w2","package":"com.whatsapp"}}
{"step":"connect"}
"#,
    );

    let steps: Vec<_> = transcript
        .iter()
        .filter(|entry| entry["event"] == "delivered")
        .map(|entry| (entry["step"].as_u64().unwrap(), entry["message"]["count"].as_u64().unwrap()))
        .collect();
    assert_eq!(steps, [(2, 0), (6, 2)]);
    assert_eq!(status(&transcript)["listening"], true);
}

#[test]
fn test_unknown_command_is_ignored() {
    let temp = TempDir::new().unwrap();
    let transcript = replay(
        &temp,
        r#"
{"step":"connect"}
{"step":"command","command":{"type":"reboot"}}
{"step":"command","command":{"type":"register_consumer","identity":"nobody"}}
"#,
    );

    assert!(deliveries(&transcript).is_empty());
    assert_eq!(status(&transcript)["consumer"], "none");
}

#[test]
fn test_config_file_labels_reach_detailed_consumer() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("cw.toml");
    std::fs::write(
        &config_path,
        r#"
[relay]
unknown_app_label = "?"

[labels]
"com.whatsapp" = "WhatsApp"
"#,
    )
    .unwrap();
    let scenario = temp.path().join("scenario.jsonl");
    std::fs::write(
        &scenario,
        r#"{"step":"connect"}
{"step":"post","notification":{"key":"w1","package":"com.whatsapp","title":"Hi"}}
{"step":"post","notification":{"key":"x1","package":"org.gone"}}
{"step":"command","command":{"type":"register_consumer","identity":"detailed"}}
"#,
    )
    .unwrap();

    let output = cw(temp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("replay")
        .arg(&scenario)
        .output()
        .expect("failed to run cw replay");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("w1 com.whatsapp (WhatsApp): Hi"), "{stdout}");
    assert!(stdout.contains("x1 org.gone (?): -"), "{stdout}");
}

#[test]
fn test_invalid_scenario_fails_with_line_number() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.jsonl");
    std::fs::write(&path, "{\"step\":\"connect\"}\nnot json\n").unwrap();

    let output = cw(temp.path())
        .arg("replay")
        .arg(&path)
        .output()
        .expect("failed to run cw replay");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "{stderr}");
}

#[test]
fn test_config_command_prints_defaults() {
    let temp = TempDir::new().unwrap();
    let output = cw(temp.path())
        .arg("config")
        .output()
        .expect("failed to run cw config");
    assert!(output.status.success());

    let config: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["relay"]["missed_call_category"], "missed_call");
    assert_eq!(config["relay"]["queue_capacity"], 64);
}
