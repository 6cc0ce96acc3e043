use anyhow::Context;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

/// Which risk scorer the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    Random,
    Rules,
    Remote,
}

impl FromStr for ScorerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(ScorerKind::Random),
            "rules" => Ok(ScorerKind::Rules),
            "remote" => Ok(ScorerKind::Remote),
            other => anyhow::bail!("SCORER must be one of random, rules, remote (got '{}')", other),
        }
    }
}

/// Where behavioural features come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSource {
    Random,
    History,
}

impl FromStr for FeatureSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "random" => Ok(FeatureSource::Random),
            "history" => Ok(FeatureSource::History),
            other => anyhow::bail!("FEATURES must be random or history (got '{}')", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub auth_secret: String,
    pub scorer: ScorerKind,
    pub features: FeatureSource,
    pub model_url: Option<String>,
    pub model_type: String,
    pub model_version: String,
    pub request_timeout_secs: u64,
    pub reviewer_ids: Vec<String>,
    pub log_format: LogFormat,
    pub log_request_body: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let scorer: ScorerKind = env::var("SCORER")
            .unwrap_or_else(|_| "rules".to_string())
            .parse()?;
        let model_url = non_empty(env::var("MODEL_URL").ok());
        if scorer == ScorerKind::Remote && model_url.is_none() {
            anyhow::bail!("MODEL_URL is required when SCORER=remote");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            database_url: non_empty(env::var("DATABASE_URL").ok()),
            auth_secret: env::var("AUTH_SECRET").context("AUTH_SECRET must be set")?,
            scorer,
            features: env::var("FEATURES")
                .unwrap_or_else(|_| "history".to_string())
                .parse()?,
            model_url,
            model_type: env::var("MODEL_TYPE").unwrap_or_else(|_| "xgboost".to_string()),
            model_version: env::var("MODEL_VERSION").unwrap_or_else(|_| "v1".to_string()),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            reviewer_ids: parse_reviewer_ids(&env::var("REVIEWER_IDS").unwrap_or_default()),
            log_format: LogFormat::from_env(),
            log_request_body: env::var("LOG_REQUEST_BODY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_reviewer_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
