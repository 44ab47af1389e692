use crate::consts::*;
use crate::exceptions::ParleyError;
use crate::llm::client::{ModelArguments, Provider};
use ini::Ini;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub keys_file: PathBuf,
    pub chat_history_root: PathBuf,
    pub providers: Vec<String>,
    pub models: Vec<String>,
    pub log_level: String,
    pub refine_prompt: String,
    pub system_message_templates: Option<PathBuf>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            keys_file: PathBuf::from(DEFAULT_KEYS_FILE),
            chat_history_root: PathBuf::from(DEFAULT_CHAT_HISTORY_ROOT),
            providers: DEFAULT_PROVIDERS.iter().map(|s| s.to_string()).collect(),
            models: DEFAULT_MODELS.iter().map(|s| s.to_string()).collect(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            refine_prompt: DEFAULT_REFINE_PROMPT.to_string(),
            system_message_templates: None,
        }
    }
}

/// One model section of the properties file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    pub provider: Option<String>,
    pub model_id: Option<String>,
    pub alias: Vec<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub context_window: Option<u32>,
    pub base_url: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub path: PathBuf,
    pub general: GeneralSettings,
    pub models: BTreeMap<String, ModelConfig>,
    pub invocation: Map<String, Value>,
}

impl Config {
    /// In-memory defaults, used when the properties file is unreadable.
    pub fn defaults(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            general: GeneralSettings::default(),
            models: BTreeMap::new(),
            invocation: Map::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ParleyError> {
        if !path.exists() {
            tracing::warn!(
                "Config file not found at {}. Creating default.",
                path.display()
            );
            if let Err(e) = write_default(path) {
                tracing::error!("Unable to create default config file: {}", e);
                return Ok(Self::defaults(path));
            }
        }

        match Ini::load_from_file(path) {
            Ok(ini) => Self::from_ini(path, &ini),
            Err(e) => {
                tracing::error!("Error reading config file: {}. Using defaults.", e);
                Ok(Self::defaults(path))
            }
        }
    }

    pub fn from_ini(path: &Path, ini: &Ini) -> Result<Self, ParleyError> {
        let mut general = GeneralSettings::default();

        if let Some(section) = ini.section(Some(GENERAL_SECTION)) {
            if let Some(v) = non_empty(section.get("keys_file")) {
                general.keys_file = PathBuf::from(v);
            }
            if let Some(v) = non_empty(section.get("chat_history_root")) {
                general.chat_history_root = PathBuf::from(v);
            }
            if let Some(v) = non_empty(section.get("log_level")) {
                general.log_level = v.to_string();
            }
            if let Some(v) = non_empty(section.get("refine_prompt")) {
                general.refine_prompt = v.to_string();
            }
            general.system_message_templates =
                non_empty(section.get("system_message_templates")).map(PathBuf::from);

            general.providers = list_or_default(section.get("providers"), "providers", DEFAULT_PROVIDERS);
            general.models = list_or_default(section.get("models"), "models", DEFAULT_MODELS);
        } else {
            tracing::warn!("No [{}] section in {}, using defaults.", GENERAL_SECTION, path.display());
        }

        let mut invocation = Map::new();
        if let Some(section) = ini.section(Some(INVOCATION_SECTION)) {
            for (key, value) in section.iter() {
                invocation.insert(key.to_string(), ini_value(value));
            }
        }

        let mut models = BTreeMap::new();
        for (name, props) in ini.iter() {
            let Some(name) = name else { continue };
            if name == GENERAL_SECTION || name == INVOCATION_SECTION {
                continue;
            }

            let mut model = ModelConfig {
                name: name.to_string(),
                ..Default::default()
            };
            for (key, value) in props.iter() {
                match key {
                    "provider" => model.provider = non_empty(Some(value)).map(String::from),
                    "model" => model.model_id = non_empty(Some(value)).map(String::from),
                    "alias" => model.alias = split_list(value),
                    "temperature" => model.temperature = Some(parse_number(name, key, value)?),
                    "top_p" => model.top_p = Some(parse_number(name, key, value)?),
                    "max_tokens" => model.max_tokens = Some(parse_number(name, key, value)?),
                    "context_window" => {
                        model.context_window = Some(parse_number(name, key, value)?)
                    }
                    "base_url" => model.base_url = non_empty(Some(value)).map(String::from),
                    _ => {
                        model.extra.insert(key.to_string(), ini_value(value));
                    }
                }
            }
            models.insert(name.to_string(), model);
        }

        Ok(Self {
            path: path.to_path_buf(),
            general,
            models,
            invocation,
        })
    }

    pub fn providers(&self) -> &[String] {
        &self.general.providers
    }

    pub fn models(&self) -> &[String] {
        &self.general.models
    }

    pub fn keys_file(&self) -> &Path {
        &self.general.keys_file
    }

    pub fn chat_history_root(&self) -> &Path {
        &self.general.chat_history_root
    }

    pub fn is_curated(&self, name: &str) -> bool {
        self.general.models.iter().any(|m| m == name)
    }

    /// Maps a section name, alias or curated entry to its canonical model name.
    pub fn resolve_model(&self, name_or_alias: &str) -> Result<String, ParleyError> {
        let wanted = name_or_alias.trim();
        if wanted.is_empty() {
            return Err(ParleyError::InvalidInput("Model name cannot be empty.".into()));
        }

        if self.models.contains_key(wanted) {
            return Ok(wanted.to_string());
        }

        if let Some(model) = self.models.values().find(|m| {
            m.alias.iter().any(|a| a.eq_ignore_ascii_case(wanted))
        }) {
            return Ok(model.name.clone());
        }

        if self.is_curated(wanted) {
            return Ok(wanted.to_string());
        }

        if Provider::infer(wanted).is_some() {
            tracing::info!("Model '{}' is not configured; using it as given.", wanted);
            return Ok(wanted.to_string());
        }

        Err(ParleyError::Configuration(format!(
            "Model '{}' is not configured. Add a [{}] section or use one of: {}",
            wanted,
            wanted,
            self.general.models.join(", ")
        )))
    }

    /// Provider, identifier and request parameters for a model. Invocation
    /// arguments are merged underneath the model's own keys.
    pub fn model_arguments(&self, name_or_alias: &str) -> Result<ModelArguments, ParleyError> {
        let name = self.resolve_model(name_or_alias)?;
        let section = self.models.get(&name);

        let model_id = section
            .and_then(|m| m.model_id.clone())
            .unwrap_or_else(|| name.clone());

        let (provider, provider_name) = match section.and_then(|m| m.provider.as_deref()) {
            Some(p) => (p.parse::<Provider>()?, p.to_string()),
            None => {
                let provider = Provider::infer(&model_id)
                    .or_else(|| Provider::infer(&name))
                    .ok_or_else(|| {
                        ParleyError::Configuration(format!(
                            "No provider configured for model '{}' and none could be inferred.",
                            name
                        ))
                    })?;
                (provider, provider.key_name().to_string())
            }
        };

        let mut params = self.invocation_arguments();
        if let Some(m) = section {
            if let Some(t) = m.temperature {
                params.insert("temperature".into(), Value::from(t));
            }
            if let Some(p) = m.top_p {
                params.insert("top_p".into(), Value::from(p));
            }
            if let Some(mt) = m.max_tokens {
                params.insert("max_tokens".into(), Value::from(mt));
            }
            for (k, v) in &m.extra {
                params.insert(k.clone(), v.clone());
            }
        }

        Ok(ModelArguments {
            name,
            provider,
            provider_name,
            model_id,
            base_url: section.and_then(|m| m.base_url.clone()),
            params,
        })
    }

    pub fn invocation_arguments(&self) -> Map<String, Value> {
        self.invocation.clone()
    }

    /// Names (file stems) of the system-message templates, sorted.
    pub fn list_templates(&self) -> Result<Vec<String>, ParleyError> {
        let Some(dir) = &self.general.system_message_templates else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            tracing::warn!("Template directory {} does not exist.", dir.display());
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_template = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e));
            if is_template && let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn load_template(&self, name: &str) -> Result<String, ParleyError> {
        let dir = self.general.system_message_templates.as_ref().ok_or_else(|| {
            ParleyError::Configuration(
                "No system_message_templates directory configured in [General].".into(),
            )
        })?;

        for ext in TEMPLATE_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                return Ok(fs::read_to_string(candidate)?);
            }
        }
        Err(ParleyError::NotFound(format!("System message template '{}'", name)))
    }
}

/// Writes a properties file holding the default `[General]` section.
pub fn write_default(path: &Path) -> Result<(), ParleyError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let defaults = GeneralSettings::default();
    let mut ini = Ini::new();
    ini.with_section(Some(GENERAL_SECTION))
        .set("keys_file", defaults.keys_file.to_string_lossy())
        .set("chat_history_root", defaults.chat_history_root.to_string_lossy())
        .set("providers", defaults.providers.join(", "))
        .set("models", defaults.models.join(", "))
        .set("log_level", defaults.log_level)
        .set("refine_prompt", defaults.refine_prompt);
    ini.with_section(Some("gpt-4o")).set("provider", "OpenAI");

    ini.write_to_file(path)?;
    tracing::info!("Default config file created at {}", path.display());
    Ok(())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn list_or_default(value: Option<&str>, what: &str, defaults: &[&str]) -> Vec<String> {
    let items = value.map(split_list).unwrap_or_default();
    if items.is_empty() {
        tracing::warn!("No {} found in config, using defaults.", what);
        return defaults.iter().map(|s| s.to_string()).collect();
    }
    items
}

fn parse_number<T: std::str::FromStr>(section: &str, key: &str, value: &str) -> Result<T, ParleyError> {
    value.trim().parse::<T>().map_err(|_| {
        ParleyError::Configuration(format!(
            "[{}] {} = '{}' is not a valid number.",
            section, key, value
        ))
    })
}

/// Numbers, booleans and JSON literals keep their type; anything else is a string.
pub fn ini_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>()
        && f.is_finite()
    {
        return Value::from(f);
    }
    match trimmed {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        _ => {}
    }
    if (trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed == "null")
        && let Ok(v) = serde_json::from_str(trimmed)
    {
        return v;
    }
    Value::String(trimmed.to_string())
}
