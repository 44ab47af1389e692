mod common;
use common::{Sandbox, openai_sse};
use mockito::{Matcher, Server};
use parley::fs::ChatLock;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::io::Write;

#[test]
fn test_send_with_mock_provider_appends_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    sandbox
        .cmd()
        .args(["send", "c", "hello there"])
        .assert()
        .success()
        .stdout("mock reply: hello there\n");

    let doc = sandbox.read_chat("c");
    let messages = doc["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["content"], "mock reply: hello there");
    assert_eq!(messages[1]["model"], "mock");
    assert!(!sandbox.history().join("c.json.lock").exists());
}

#[test]
fn test_send_appends_piped_stdin_to_prompt() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    sandbox
        .cmd()
        .args(["send", "c", "Summarize:"])
        .write_stdin("line one\nline two\n")
        .assert()
        .success();

    assert_eq!(
        sandbox.messages("c")[0].1,
        "Summarize:\n\nline one\nline two"
    );
}

#[test]
fn test_send_without_prompt_answers_draft() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([{"role": "user", "content": "drafted question"}]));

    sandbox
        .cmd()
        .args(["send", "c", "-m", "echo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mock reply: drafted question"));
    assert_eq!(sandbox.messages("c").len(), 2);
}

#[test]
fn test_send_without_prompt_or_draft_fails() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    sandbox
        .cmd()
        .args(["send", "c"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to send"));
}

#[test]
fn test_send_to_missing_chat_fails() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["send", "nope", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found: Chat 'nope'"));
}

#[test]
fn test_second_request_on_locked_chat_is_busy() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));
    let held = ChatLock::acquire(&sandbox.history().join("c.json")).unwrap();

    sandbox
        .cmd()
        .args(["send", "c", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Busy"));

    assert!(sandbox.messages("c").is_empty());
    assert!(sandbox.history().join("c.json.lock").exists());
    drop(held);
}

#[test]
fn test_lock_file_left_by_dead_process_is_reclaimed() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));
    fs::write(sandbox.history().join("c.json.lock"), "999999\n").unwrap();

    sandbox
        .cmd()
        .args(["send", "c", "still there?"])
        .assert()
        .success()
        .stdout("mock reply: still there?\n");

    assert_eq!(sandbox.messages("c").len(), 2);
    assert!(!sandbox.history().join("c.json.lock").exists());
}

#[tokio::test]
async fn test_send_streams_from_openai_compatible_endpoint() {
    let sandbox = Sandbox::new();
    sandbox.write_chat(
        "c",
        json!([{"role": "system", "content": "Be brief."}]),
    );

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Name a crab."}
            ],
            "stream": true,
            "stream_options": {"include_usage": true},
            "temperature": 0.2
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(openai_sse(&["Fer", "ris"]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["send", "c", "Name a crab.", "-m", "gpt-4o"])
        .assert()
        .success()
        .stdout("Ferris\n")
        .stderr(predicate::str::contains("Tokens: 12 sent, 3 received."));

    mock.assert_async().await;

    let doc = sandbox.read_chat("c");
    let reply = &doc["messages"][2];
    assert_eq!(reply["content"], "Ferris");
    assert_eq!(reply["model"], "gpt-4o");
    assert_eq!(reply["token_usage"]["total_tokens"], 15);
}

#[tokio::test]
async fn test_key_file_entry_is_used_for_provider() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));
    fs::create_dir_all(sandbox.root().join("secrets")).unwrap();
    fs::write(
        sandbox.root().join("secrets/api_keys.json"),
        r#"{"OpenAI": "sk-from-file"}"#,
    )
    .unwrap();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-from-file")
        .with_status(200)
        .with_body(openai_sse(&["ok"]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "gpt-4o"])
        .assert()
        .success();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_send_streams_from_gemini() {
    let sandbox = Sandbox::new();
    sandbox.write_chat(
        "c",
        json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": "Hello!", "model": "gemini-flash"}
        ]),
    );

    let chunk1 = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Two "}]}}]});
    let chunk2 = json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": "words"}]}}],
        "usageMetadata": {"promptTokenCount": 9, "candidatesTokenCount": 2, "totalTokenCount": 11}
    });

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash:streamGenerateContent")
        .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
        .match_header("x-goog-api-key", "g-test")
        .match_body(Matcher::PartialJson(json!({
            "systemInstruction": {"parts": [{"text": "Be brief."}]},
            "contents": [
                {"role": "user", "parts": [{"text": "Hi"}]},
                {"role": "model", "parts": [{"text": "Hello!"}]},
                {"role": "user", "parts": [{"text": "Say two words"}]}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(format!("data: {}\n\ndata: {}\n\n", chunk1, chunk2))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("GEMINI_API_KEY", "g-test")
        .env("PARLEY_GEMINI_BASE_URL", server.url())
        .args(["send", "c", "Say two words"])
        .assert()
        .success()
        .stdout("Two words\n");

    mock.assert_async().await;
    assert_eq!(sandbox.messages("c")[4].1, "Two words");
}

#[tokio::test]
async fn test_provider_error_is_saved_as_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error": "bad key"}"#)
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-wrong")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "gpt-4o"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("API Error (Status: 401"));

    mock.assert_async().await;

    let messages = sandbox.messages("c");
    assert_eq!(messages.len(), 2);
    assert!(messages[1].1.starts_with("Error: "));
    assert!(messages[1].1.contains("bad key"));
    assert!(!sandbox.history().join("c.json.lock").exists());
}

#[test]
fn test_unknown_model_is_recorded_as_error_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    sandbox
        .cmd()
        .args(["send", "c", "hi", "-m", "llama-local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Model 'llama-local' is not configured"));

    let messages = sandbox.messages("c");
    assert_eq!(messages[0].1, "hi");
    assert!(messages[1].1.starts_with("Error: Configuration error"));
}

#[tokio::test]
async fn test_interrupted_stream_keeps_partial_reply() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_chunked_body(|w| {
            let chunk = json!({"choices": [{"delta": {"content": "Half an answer"}, "index": 0}]});
            w.write_all(format!("data: {}\n\n", chunk).as_bytes())?;
            w.flush()?;
            Err(std::io::Error::other("connection dropped"))
        })
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["send", "c", "Tell me everything", "-m", "gpt-4o"])
        .assert()
        .success()
        .stdout("Half an answer\n");

    let messages = sandbox.messages("c");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].1, "Half an answer");
}

#[tokio::test]
async fn test_stream_failing_before_content_is_error() {
    let sandbox = Sandbox::new();
    sandbox.write_chat("c", json!([]));

    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_chunked_body(|w| {
            w.write_all(b": keep-alive\n\n")?;
            w.flush()?;
            Err(std::io::Error::other("connection dropped"))
        })
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("OPENAI_API_KEY", "sk-test")
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "gpt-4o"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("LLM Provider error"));

    let messages = sandbox.messages("c");
    assert_eq!(messages.len(), 2);
    assert!(messages[1].1.starts_with("Error: LLM Provider error"));
}

const ROUTED_CONFIG: &str = "\
[General]
keys_file = secrets/api_keys.json
chat_history_root = chats
providers = OpenAI, Google AI, DeepInfra, HuggingFace
models = llama, zephyr, flash
log_level = error

[Invocation]
stop = END

[llama]
provider = DeepInfra
model = meta-llama/Meta-Llama-3-70B-Instruct

[zephyr]
provider = HF
model = HuggingFaceH4/zephyr-7b-beta

[flash]
provider = Gemini
model = gemini-2.0-flash
";

#[tokio::test]
async fn test_deepinfra_base_url_override() {
    let sandbox = Sandbox::with_config(ROUTED_CONFIG);
    sandbox.write_chat("c", json!([]));

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer di-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "meta-llama/Meta-Llama-3-70B-Instruct",
            "stop": "END"
        })))
        .with_status(200)
        .with_body(openai_sse(&["llama says hi"]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("DEEPINFRA_API_KEY", "di-test")
        .env("PARLEY_DEEPINFRA_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "llama"])
        .assert()
        .success()
        .stdout("llama says hi\n");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_huggingface_key_found_under_configured_provider_name() {
    let sandbox = Sandbox::with_config(ROUTED_CONFIG);
    sandbox.write_chat("c", json!([]));
    fs::create_dir_all(sandbox.root().join("secrets")).unwrap();
    fs::write(
        sandbox.root().join("secrets/api_keys.json"),
        r#"{"HuggingFace": "hf_stored"}"#,
    )
    .unwrap();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer hf_stored")
        .match_body(Matcher::PartialJson(json!({
            "model": "HuggingFaceH4/zephyr-7b-beta"
        })))
        .with_status(200)
        .with_body(openai_sse(&["zephyr here"]))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env_remove("HF_TOKEN")
        .env_remove("HUGGINGFACE_API_KEY")
        .env("PARLEY_HUGGINGFACE_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "zephyr"])
        .assert()
        .success()
        .stdout("zephyr here\n");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_alias_uses_google_ai_key_and_stop_sequences() {
    let sandbox = Sandbox::with_config(ROUTED_CONFIG);
    sandbox.write_chat("c", json!([]));
    fs::create_dir_all(sandbox.root().join("secrets")).unwrap();
    fs::write(
        sandbox.root().join("secrets/api_keys.json"),
        r#"{"Google AI": "g-stored"}"#,
    )
    .unwrap();

    let chunk = json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "Done"}]}}]});
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/models/gemini-2.0-flash:streamGenerateContent")
        .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
        .match_header("x-goog-api-key", "g-stored")
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": {"stopSequences": ["END"]}
        })))
        .with_status(200)
        .with_body(format!("data: {}\n\n", chunk))
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("PARLEY_GEMINI_BASE_URL", server.url())
        .args(["send", "c", "hi", "-m", "flash"])
        .assert()
        .success()
        .stdout("Done\n");

    mock.assert_async().await;
}
