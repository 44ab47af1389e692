// --- Properties file ---

pub const DEFAULT_PROPERTIES_PATH: &str = "deployment/dev/config.ini";
pub const PROPERTIES_ENV: &str = "PARLEY_PROPERTIES";

pub const GENERAL_SECTION: &str = "General";
pub const INVOCATION_SECTION: &str = "Invocation";

pub const DEFAULT_KEYS_FILE: &str = "deployment/dev/api_keys.json";
pub const DEFAULT_CHAT_HISTORY_ROOT: &str = "deployment/dev/chats";
pub const DEFAULT_PROVIDERS: &[&str] = &["OpenAI", "Google AI", "DeepInfra", "HuggingFace"];
pub const DEFAULT_MODELS: &[&str] = &["gpt-4o"];
pub const DEFAULT_LOG_LEVEL: &str = "warning";

pub const DEFAULT_REFINE_PROMPT: &str =
    "Please revise your previous answer taking the following comments into account:";

// --- Chat history layout ---

pub const CHAT_EXTENSION: &str = "json";
pub const LOCK_SUFFIX: &str = ".lock";
pub const TEMP_CHAT_PREFIX: &str = "Chat ";
pub const MAX_TEMP_CHATS: usize = 1000;

pub const TEMPLATE_EXTENSIONS: &[&str] = &["txt", "md"];

// --- Providers ---

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEEPINFRA_BASE_URL: &str = "https://api.deepinfra.com/v1/openai";
pub const HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co/v1";
pub const REPLICATE_BASE_URL: &str = "https://api.replicate.com/v1";

pub const MOCK_REPLY_PREFIX: &str = "mock reply: ";
pub const MOCK_IMAGE_URL: &str = "https://cursor.sh/favicon.ico";

pub const ERROR_REPLY_PREFIX: &str = "Error: ";
