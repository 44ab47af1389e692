use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BASE_CONFIG: &str = "\
[General]
keys_file = secrets/api_keys.json
chat_history_root = chats
providers = OpenAI, Google AI, DeepInfra, HuggingFace
models = mock, gpt-4o, gemini-flash
log_level = error

[mock]
provider = Mock
alias = echo

[gpt-4o]
provider = OpenAI
temperature = 0.2

[gemini-flash]
provider = Google AI
model = gemini-2.0-flash
";

/// A working directory holding `config.ini`, a chat-history root and a key
/// file, all relative to the directory.
pub struct Sandbox {
    pub temp: TempDir,
}

#[allow(dead_code)]
impl Sandbox {
    pub fn new() -> Self {
        Self::with_config(BASE_CONFIG)
    }

    pub fn with_config(config: &str) -> Self {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("config.ini"), config).unwrap();
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn history(&self) -> PathBuf {
        self.root().join("chats")
    }

    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("parley");
        cmd.current_dir(self.root())
            .env("PARLEY_PROPERTIES", self.root().join("config.ini"))
            .env_remove("RUST_LOG")
            .env_remove("OPENAI_API_KEY")
            .env_remove("GEMINI_API_KEY")
            .env_remove("GOOGLE_API_KEY")
            .env_remove("DEEPINFRA_API_KEY")
            .env_remove("PARLEY_FORCE_TTY")
            .env_remove("PARLEY_FORCE_EDITOR");
        cmd
    }

    /// Writes `chats/<rel>.json` holding `messages`.
    pub fn write_chat(&self, rel: &str, messages: Value) {
        let path = self.history().join(format!("{}.json", rel));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let doc = serde_json::json!({ "messages": messages });
        fs::write(path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    }

    pub fn read_chat(&self, rel: &str) -> Value {
        let path = self.history().join(format!("{}.json", rel));
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    /// `(role, content)` for every message in a chat file.
    pub fn messages(&self, rel: &str) -> Vec<(String, String)> {
        self.read_chat(rel)["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["role"].as_str().unwrap().to_string(),
                    m["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }
}

/// A chat with one answered exchange from `model`.
#[allow(dead_code)]
pub fn one_exchange(model: &str) -> Value {
    serde_json::json!([
        {"role": "system", "content": "Be brief."},
        {"role": "user", "content": "What is Rust?"},
        {"role": "assistant", "content": "A language.", "model": model}
    ])
}

/// SSE body in the OpenAI chat-completions stream format.
#[allow(dead_code)]
pub fn openai_sse(parts: &[&str]) -> String {
    let mut body = String::new();
    for part in parts {
        let chunk = serde_json::json!({
            "choices": [{"delta": {"content": part}, "index": 0}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    let usage = serde_json::json!({
        "choices": [],
        "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
    });
    body.push_str(&format!("data: {}\n\ndata: [DONE]\n\n", usage));
    body
}
