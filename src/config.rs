use std::path::PathBuf;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::data::Weekday;
use crate::validator::ValidationOptions;

/// Command line arguments of the gateway.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Optional JSON config file; `TIMETABLE_*` environment variables override it.
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config_json_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    /// Answers every generation request with an empty list, without network access.
    Disabled,
}

/// Runtime configuration.
/// Defaults, then the JSON file, then `TIMETABLE_`-prefixed environment variables.
#[derive(Clone, Deserialize, Serialize)]
pub struct Config {
    pub bind_address: String,
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    /// Days a generated timetable must contain to be accepted.
    pub validation_days: Vec<Weekday>,
    /// Days scanned for double-bookings.
    pub detection_days: Vec<Weekday>,
    pub strict_validation: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            provider: ProviderKind::OpenAi,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            request_timeout_secs: 120,
            validation_days: Weekday::ALL.to_vec(),
            detection_days: Weekday::WORKWEEK.to_vec(),
            strict_validation: false,
        }
    }
}

impl Config {
    pub fn figment(args: &Args) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Json::file(&args.config_json_path))
            .merge(Env::prefixed("TIMETABLE_"))
    }

    pub fn load(args: &Args) -> Result<Config, figment::Error> {
        Self::figment(args).extract()
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            days: self.validation_days.clone(),
            strict: self.strict_validation,
        }
    }
}

// Keeps the API key out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("provider", &self.provider)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("validation_days", &self.validation_days)
            .field("detection_days", &self.detection_days)
            .field("strict_validation", &self.strict_validation)
            .finish()
    }
}
