mod common;
use common::Sandbox;
use predicates::prelude::*;
use std::fs;

#[test]
fn test_keys_set_list_remove() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["keys", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Google AI"))
        .stdout(predicate::str::contains("(not set)"));

    sandbox
        .cmd()
        .args(["keys", "set", "OpenAI", "sk-abcdefghijklmnop"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sk-a…mnop"));

    let key_file = sandbox.root().join("secrets/api_keys.json");
    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&key_file).unwrap()).unwrap();
    assert_eq!(stored["OpenAI"], "sk-abcdefghijklmnop");
    assert_eq!(stored["DeepInfra"], "");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&key_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    sandbox
        .cmd()
        .args(["keys", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sk-a…mnop"))
        .stdout(predicate::str::contains("sk-abcdefghijklmnop").not());

    sandbox
        .cmd()
        .args(["keys", "remove", "OpenAI"])
        .assert()
        .success()
        .stdout("Removed key for OpenAI.\n");
    sandbox
        .cmd()
        .args(["keys", "remove", "OpenAI"])
        .assert()
        .success()
        .stdout("No key stored for OpenAI.\n");
}

#[test]
fn test_keys_set_reads_stdin_and_keeps_unknown_providers() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.root().join("secrets")).unwrap();
    fs::write(
        sandbox.root().join("secrets/api_keys.json"),
        r#"{"Replicate": "r8_token_value"}"#,
    )
    .unwrap();

    sandbox
        .cmd()
        .args(["keys", "set", "DeepInfra"])
        .write_stdin("di-secret-key-123\n")
        .assert()
        .success();

    let stored: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(sandbox.root().join("secrets/api_keys.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(stored["DeepInfra"], "di-secret-key-123");
    assert_eq!(stored["Replicate"], "r8_token_value");

    sandbox
        .cmd()
        .args(["keys", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Replicate"));
}

#[test]
fn test_keys_set_without_key_fails_when_stdin_empty() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["keys", "set", "OpenAI"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key is required"));
}
