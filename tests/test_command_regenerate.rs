mod common;
use common::{Sandbox, one_exchange, openai_sse};
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;

#[test]
fn test_regenerate_assistant_reply_in_place() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", one_exchange("mock"));

    sandbox
        .cmd()
        .args(["regenerate", "c", "-1"])
        .assert()
        .success()
        .stdout("mock reply: What is Rust?\n");

    let messages = sandbox.messages("c");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].1, "mock reply: What is Rust?");
}

#[test]
fn test_regenerate_from_user_message_replaces_next_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat(
        "c",
        json!([
            {"role": "user", "content": "first"},
            {"role": "assistant", "content": "old one", "model": "mock"},
            {"role": "user", "content": "second"},
            {"role": "assistant", "content": "old two", "model": "mock"}
        ]),
    );

    sandbox.cmd().args(["regenerate", "c", "0"]).assert().success();

    let messages = sandbox.messages("c");
    assert_eq!(messages[1].1, "mock reply: first");
    assert_eq!(messages[3].1, "old two");
}

#[test]
fn test_regenerate_without_reply_fails() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([{"role": "user", "content": "unanswered"}]));

    sandbox
        .cmd()
        .args(["regenerate", "c", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no assistant reply follows"));
}

#[tokio::test]
async fn test_regenerate_uses_recorded_model_over_flag() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", one_exchange("gpt-4o"));

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "gpt-4o"})))
        .with_status(200)
        .with_body(openai_sse(&["A systems language."]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["regenerate", "c", "1", "-m", "mock"])
        .assert()
        .success();

    mock.assert_async().await;
    assert_eq!(sandbox.messages("c")[2].1, "A systems language.");
}

#[tokio::test]
async fn test_failed_regenerate_keeps_existing_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", one_exchange("gpt-4o"));

    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["regenerate", "c", "-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[Empty Body]"));

    assert_eq!(sandbox.messages("c")[2].1, "A language.");
}

#[tokio::test]
async fn test_refine_sends_comment_after_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", one_exchange("gpt-4o"));

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "What is Rust?"},
                {"role": "assistant", "content": "A language."},
                {"role": "user", "content": "Please revise your previous answer taking the following comments into account:\n\nMention memory safety."}
            ]
        })))
        .with_status(200)
        .with_body(openai_sse(&["A memory-safe language."]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["refine", "c", "1", "Mention memory safety."])
        .assert()
        .success();

    mock.assert_async().await;

    let messages = sandbox.messages("c");
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2].1, "A memory-safe language.");
}

#[test]
fn test_refine_with_custom_prompt_and_mock() {
    let config = common::BASE_CONFIG.replace(
        "log_level = error",
        "log_level = error\nrefine_prompt = Try again:",
    );
    let sandbox = Sandbox::with_config(&config);
    sandbox.write_chat("c", one_exchange("mock"));

    sandbox
        .cmd()
        .args(["refine", "c", "-1", "shorter"])
        .assert()
        .success()
        .stdout("mock reply: Try again:\n\nshorter\n");
}

#[test]
fn test_refine_rejects_user_message() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", one_exchange("mock"));

    sandbox
        .cmd()
        .args(["refine", "c", "0", "more"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Only assistant replies can be refined"));
}
