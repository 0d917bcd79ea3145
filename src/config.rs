//! Environment configuration.

use std::env;
use std::time::Duration;

use chat_api::url::DEFAULT_BASE_URL;
use chat_api::ChatApiConfig;

use crate::error::ConfigError;
use crate::render::{MarkdownHtml, MarkdownOptions, RenderPipeline, DEFAULT_CURSOR};

pub const BASE_URL_ENV: &str = "RAGCHAT_BASE_URL";
pub const TIMEOUT_ENV: &str = "RAGCHAT_TIMEOUT_SECS";
pub const LOG_ENV: &str = "RAGCHAT_LOG";
pub const CURSOR_ENV: &str = "RAGCHAT_CURSOR";
pub const PLAIN_CODE_ENV: &str = "RAGCHAT_PLAIN_CODE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub base_url: String,
    /// Connect timeout; the streamed body is never timed out.
    pub connect_timeout: Option<Duration>,
    /// `tracing` filter directive, e.g. `debug` or `chat_api=trace`.
    pub log_filter: Option<String>,
    pub cursor: String,
    /// Skip syntax highlighting of fenced code blocks.
    pub plain_code: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: None,
            log_filter: None,
            cursor: DEFAULT_CURSOR.to_string(),
            plain_code: false,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            base_url: env_string_opt(BASE_URL_ENV).unwrap_or(defaults.base_url),
            connect_timeout: env_secs_opt(TIMEOUT_ENV)?,
            log_filter: env_string_opt(LOG_ENV),
            cursor: env_string_opt(CURSOR_ENV).unwrap_or(defaults.cursor),
            plain_code: env_flag(PLAIN_CODE_ENV),
        })
    }

    pub fn api_config(&self) -> ChatApiConfig {
        let config = ChatApiConfig::new(self.base_url.clone());
        match self.connect_timeout {
            Some(timeout) => config.with_connect_timeout(timeout),
            None => config,
        }
    }

    pub fn pipeline(&self) -> RenderPipeline {
        let options = MarkdownOptions {
            highlight_code: !self.plain_code,
            ..MarkdownOptions::default()
        };
        RenderPipeline::new()
            .with_cursor(self.cursor.clone())
            .with_markdown(MarkdownHtml::new(options))
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_secs_opt(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = env_string_opt(key) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "must be greater than zero",
        }),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected whole seconds",
        }),
    }
}
