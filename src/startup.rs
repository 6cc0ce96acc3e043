use crate::config::{Config, ScorerKind};
use crate::ports::TransactionStore;
use anyhow::{Context, Result};
use std::time::Duration;

pub struct ValidationReport {
    pub environment: bool,
    pub store: bool,
    pub model: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.store && self.model
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Store Connectivity:    {}", status(self.store));
        println!("Model Connectivity:    {}", status(self.model));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, store: &dyn TransactionStore) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        store: true,
        model: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {:#}", e));
    }

    if let Err(e) = store.ping().await {
        report.store = false;
        report.errors.push(format!("Store: {}", e));
    }

    if config.scorer == ScorerKind::Remote {
        if let Some(url) = config.model_url.as_deref() {
            if let Err(e) = validate_model(url).await {
                report.model = false;
                report.errors.push(format!("Model: {:#}", e));
            }
        }
    }

    report
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.auth_secret.trim().is_empty() {
        anyhow::bail!("AUTH_SECRET is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.request_timeout_secs == 0 {
        anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
    }

    if let Some(database_url) = &config.database_url {
        url::Url::parse(database_url).context("DATABASE_URL is not a valid URL")?;
    }
    match (&config.scorer, &config.model_url) {
        (ScorerKind::Remote, None) => anyhow::bail!("MODEL_URL is required when SCORER=remote"),
        (_, Some(model_url)) => {
            url::Url::parse(model_url).context("MODEL_URL is not a valid URL")?;
        }
        _ => {}
    }

    Ok(())
}

/// Any HTTP answer counts as reachable; the model root need not serve anything.
async fn validate_model(model_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    client
        .get(model_url)
        .send()
        .await
        .context("Failed to connect to model service")?;

    Ok(())
}
