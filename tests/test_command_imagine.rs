mod common;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use common::Sandbox;
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;
use std::fs;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

#[test]
fn test_mock_model_prints_placeholder_url() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["imagine", "a red crab", "-m", "placeholder", "--url-only"])
        .assert()
        .success()
        .stdout(format!("{}\n", parley::consts::MOCK_IMAGE_URL))
        .stderr(predicate::str::contains("Revised prompt: [Mock] a red crab"));
}

#[test]
fn test_unknown_image_model_is_rejected() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["imagine", "a crab", "-m", "midjourney"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Model midjourney not supported."));
}

#[test]
fn test_missing_image_key_is_configuration_error() {
    let sandbox = Sandbox::new();

    sandbox
        .cmd()
        .args(["imagine", "a crab", "-m", "flux-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DeepInfra API key not provided"));
}

#[tokio::test]
async fn test_deepinfra_b64_image_is_saved_with_detected_extension() {
    let sandbox = Sandbox::new();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/images/generations")
        .match_header("authorization", "Bearer di-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "black-forest-labs/FLUX-2-pro",
            "prompt": "a blue crab",
            "response_format": "b64_json"
        })))
        .with_status(200)
        .with_body(json!({"data": [{"b64_json": BASE64.encode(PNG)}]}).to_string())
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("DEEPINFRA_API_KEY", "di-test")
        .env("PARLEY_DEEPINFRA_BASE_URL", server.url())
        .args(["imagine", "a blue crab", "-m", "flux-2", "-o", "out/crab"])
        .assert()
        .success()
        .stdout("out/crab.png\n");

    mock.assert_async().await;
    assert_eq!(fs::read(sandbox.root().join("out/crab.png")).unwrap(), PNG);
}

#[tokio::test]
async fn test_dalle_url_is_downloaded() {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.root().join("secrets")).unwrap();
    fs::write(
        sandbox.root().join("secrets/api_keys.json"),
        r#"{"OpenAI": "sk-image"}"#,
    )
    .unwrap();

    let mut server = Server::new_async().await;
    let image_url = format!("{}/files/crab", server.url());
    let generate = server
        .mock("POST", "/images/generations")
        .match_header("authorization", "Bearer sk-image")
        .match_body(Matcher::PartialJson(json!({
            "model": "dall-e-3",
            "quality": "standard",
            "style": "vivid",
            "size": "1024x1024"
        })))
        .with_status(200)
        .with_body(
            json!({"data": [{"url": image_url, "revised_prompt": "A crab, vividly"}]}).to_string(),
        )
        .create_async()
        .await;
    let download = server
        .mock("GET", "/files/crab")
        .with_status(200)
        .with_body(PNG)
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("PARLEY_OPENAI_BASE_URL", server.url())
        .args(["imagine", "a crab"])
        .assert()
        .success()
        .stdout("generated_image.png\n")
        .stderr(predicate::str::contains("Revised prompt: A crab, vividly"));

    generate.assert_async().await;
    download.assert_async().await;
    assert!(sandbox.root().join("generated_image.png").is_file());
}

#[tokio::test]
async fn test_provider_error_is_reported() {
    let sandbox = Sandbox::new();

    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/images/generations")
        .with_status(400)
        .with_body("content policy")
        .create_async()
        .await;

    sandbox
        .cmd()
        .env("DEEPINFRA_API_KEY", "di-test")
        .env("PARLEY_DEEPINFRA_BASE_URL", server.url())
        .args(["imagine", "a crab", "-m", "sd-3.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DeepInfra API Error (Status: 400"))
        .stderr(predicate::str::contains("content policy"));
}
