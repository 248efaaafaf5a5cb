use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// The single chat allowed to interact with the assistant.
    #[serde(default)]
    pub allowed_chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub models: ModelRoutes,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            models: ModelRoutes::default(),
        }
    }
}

/// Model identifiers per task. Intent detection and filename generation are
/// cheap and frequent; code generation gets the heavyweight model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRoutes {
    pub intent: String,
    pub converter: String,
    pub coder: String,
    pub advisor: String,
    pub chat: String,
}

impl Default for ModelRoutes {
    fn default() -> Self {
        Self {
            intent: "mistralai/mistral-small-3.2-24b-instruct".to_string(),
            converter: "nvidia/llama-3.3-nemotron-super-49b-v1:free".to_string(),
            coder: "moonshotai/kimi-dev-72b:free".to_string(),
            advisor: "nvidia/llama-3.3-nemotron-super-49b-v1:free".to_string(),
            chat: "mistralai/mistral-small-3.2-24b-instruct".to_string(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("./data/generated")
}

impl Config {
    /// Reads the config file if present, otherwise starts from defaults,
    /// then applies environment overrides. Validation is separate so the
    /// caller can print a useful message.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.allowed_chat_id = chat_id;
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Ok(api_key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        let routes = &mut self.llm.models;
        for (var, slot) in [
            ("INTENT_DETECTION_MODEL", &mut routes.intent),
            ("COMMAND_CONVERSION_MODEL", &mut routes.converter),
            ("CODE_GEN_MODEL", &mut routes.coder),
            ("ERROR_FIX_MODEL", &mut routes.advisor),
            ("CONVERSATION_MODEL", &mut routes.chat),
        ] {
            if let Ok(model) = std::env::var(var) {
                *slot = model;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            bail!("telegram.bot_token is not set (config.toml or TELEGRAM_BOT_TOKEN)");
        }
        if self.telegram.allowed_chat_id.trim().is_empty() {
            bail!("telegram.allowed_chat_id is not set (config.toml or TELEGRAM_CHAT_ID)");
        }
        if self.llm.base_url.trim().is_empty() {
            bail!("llm.base_url is not set (config.toml or LLM_BASE_URL)");
        }
        Ok(())
    }
}
