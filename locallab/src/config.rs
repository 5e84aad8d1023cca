use anyhow::Result;
use config::{builder::DefaultState, Config as ConfigLoader, ConfigBuilder, Environment, File};
use locallab_api::observability::{LogConfig, LogFormat};
use locallab_ollama::OllamaConfig;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    /// In-memory repositories are used when unset.
    pub database_url: Option<String>,
    pub ollama_base_url: String,
    pub ollama_timeout_seconds: u64,
    pub ollama_max_retries: u32,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer: usize,
}

impl Config {
    /// `config/default` → `config/local` → `LOCALLAB_*` environment.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            ConfigLoader::builder()
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config/local").required(false))
                .add_source(Environment::with_prefix("LOCALLAB").try_parsing(true)),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut config: Self = builder.build()?.try_deserialize()?;
        if config
            .database_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            config.database_url = None;
        }
        Ok(config)
    }

    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig::new(self.ollama_base_url.clone())
            .with_timeout(Duration::from_secs(self.ollama_timeout_seconds))
            .with_max_retries(self.ollama_max_retries)
    }

    pub fn logging(&self) -> LogConfig {
        let level = &self.log_level;
        LogConfig {
            format: self.log_format,
            filter: Some(format!(
                "locallab={level},locallab_workflow={level},locallab_ollama={level},tower_http=debug"
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_timeout_seconds: 300,
            ollama_max_retries: 1,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            event_buffer: 256,
        }
    }
}
