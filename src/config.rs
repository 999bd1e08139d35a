//! Run configuration, read from a TOML file and overridable from the command line.
use crate::{convocatoria, CrawlerError, ExtractionJob};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "convocatorias.toml";
pub const DEFAULT_INSTRUCTION: &str = include_str!("../instruction.txt");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_instruction")]
    pub instruction: String,
    /// Pages with fewer visible words than this are not sent to the model.
    #[serde(default = "default_word_count_threshold")]
    pub word_count_threshold: usize,
    /// Skip records already stored with the same link, name and open date.
    #[serde(default)]
    pub dedup: bool,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_database() -> PathBuf {
    PathBuf::from("convocatorias.db")
}
fn default_instruction() -> String {
    DEFAULT_INSTRUCTION.trim().to_string()
}
fn default_word_count_threshold() -> usize {
    100
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            targets: vec![],
            database: default_database(),
            instruction: default_instruction(),
            word_count_threshold: default_word_count_threshold(),
            dedup: false,
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, CrawlerError> {
        let s = std::fs::read_to_string(path)?;
        Config::from_toml_str(&s)
    }

    pub fn from_toml_str(s: &str) -> Result<Config, CrawlerError> {
        Ok(toml::from_str(s)?)
    }

    pub fn validate(&self) -> Result<(), CrawlerError> {
        if self.targets.is_empty() {
            return Err(CrawlerError::InvalidConfig(
                "no target URLs configured".to_string(),
            ));
        }
        if let Some(i) = self.targets.iter().position(|t| t.trim().is_empty()) {
            return Err(CrawlerError::InvalidConfig(format!(
                "target #{} is empty",
                i + 1
            )));
        }
        if self.instruction.trim().is_empty() {
            return Err(CrawlerError::InvalidConfig(
                "instruction is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads the API token from the environment variable named in `llm.api_key_env`.
    pub fn resolve_credential(&self) -> Result<String, CrawlerError> {
        self.resolve_credential_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_credential_with<F>(&self, lookup: F) -> Result<String, CrawlerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.llm.api_key_env) {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(CrawlerError::MissingCredential(
                self.llm.api_key_env.clone(),
            )),
        }
    }

    pub fn job(&self) -> ExtractionJob {
        ExtractionJob {
            targets: self.targets.iter().map(|t| t.trim().to_string()).collect(),
            instruction: self.instruction.trim().to_string(),
            schema: convocatoria::schema(),
        }
    }
}
