use clap::{Args, Parser, Subcommand};
use std::env;
use std::time::Duration;
use tokio::sync::watch;

use crate::client::{notice_for, PaymentForm, Session, SubmissionClient};
use crate::config::Config;
use crate::middleware::auth::HmacTokenAuthenticator;
use crate::presenter::{RefreshMode, TransactionListView};

#[derive(Parser)]
#[command(name = "fraudpay-core")]
#[command(about = "FraudPay Core - payment fraud scoring service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,

    /// Mint a bearer token for a user id from AUTH_SECRET
    Token {
        #[arg(value_name = "USER_ID")]
        user_id: String,
    },

    /// Submit a payment through a running service
    Submit {
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Approve a flagged transaction
    Approve {
        #[arg(value_name = "TX_ID")]
        id: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List transactions, newest first
    List {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Follow the transactions table and reprint it on every change
    Watch {
        /// Re-read the whole table on every change instead of patching the list
        #[arg(long)]
        full_refresh: bool,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[derive(Args)]
pub struct RemoteArgs {
    /// Base URL of the running service
    #[arg(long, env = "SERVICE_URL", default_value = "http://localhost:3000")]
    pub url: String,

    /// Acting user id; a token is minted from AUTH_SECRET when --token is absent
    #[arg(long)]
    pub user: Option<String>,

    #[arg(long)]
    pub token: Option<String>,
}

impl RemoteArgs {
    fn session(&self) -> anyhow::Result<Session> {
        match (&self.user, &self.token) {
            (user, Some(token)) => {
                let user_id = match user {
                    Some(user) => user.clone(),
                    None => token
                        .split_once('.')
                        .map(|(user, _)| user.to_string())
                        .ok_or_else(|| anyhow::anyhow!("token is malformed"))?,
                };
                Ok(Session {
                    user_id,
                    token: token.clone(),
                })
            }
            (Some(user), None) => {
                let secret = env::var("AUTH_SECRET")
                    .map_err(|_| anyhow::anyhow!("--token or AUTH_SECRET is required"))?;
                let token = HmacTokenAuthenticator::new(secret).issue(user)?;
                Ok(Session {
                    user_id: user.clone(),
                    token,
                })
            }
            (None, None) => anyhow::bail!("--user or --token is required"),
        }
    }

    fn client(&self) -> anyhow::Result<SubmissionClient> {
        Ok(SubmissionClient::new(&self.url, Duration::from_secs(30))?.with_session(self.session()?))
    }
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set to run migrations"))?;

    let pool = crate::db::create_pool(url, Duration::from_secs(config.request_timeout_secs)).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    match &config.database_url {
        Some(url) => println!("  Database URL: {}", mask_password(url)),
        None => println!("  Database URL: <unset, in-memory store>"),
    }
    println!("  Scorer: {:?}", config.scorer);
    println!("  Features: {:?}", config.features);
    if let Some(model_url) = &config.model_url {
        println!(
            "  Model: {} ({} {})",
            model_url, config.model_type, config.model_version
        );
    }
    println!("  Request Timeout: {}s", config.request_timeout_secs);
    if config.reviewer_ids.is_empty() {
        println!("  Reviewers: any authenticated user");
    } else {
        println!("  Reviewers: {}", config.reviewer_ids.join(", "));
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

pub fn handle_token(config: &Config, user_id: &str) -> anyhow::Result<()> {
    let token = HmacTokenAuthenticator::new(config.auth_secret.clone()).issue(user_id)?;
    println!("{}", token);
    Ok(())
}

pub async fn handle_submit(remote: &RemoteArgs, recipient: &str, amount: &str) -> anyhow::Result<()> {
    let client = remote.client()?;
    let result = client
        .submit(&PaymentForm {
            recipient_id: recipient.to_string(),
            amount: amount.to_string(),
        })
        .await;

    let notice = notice_for(&result);
    println!("{}: {}", notice.title, notice.description);

    let submission = result?;
    println!(
        "  {} {} -> {} score={} status={}",
        submission.transaction.id,
        submission.transaction.amount,
        submission.transaction.recipient_id,
        submission.transaction.fraud_score.value(),
        submission.transaction.status
    );
    Ok(())
}

pub async fn handle_approve(remote: &RemoteArgs, id: &str) -> anyhow::Result<()> {
    let transaction = remote.client()?.approve(id).await?;
    println!("✓ Transaction {} is now {}", transaction.id, transaction.status);
    Ok(())
}

pub async fn handle_list(remote: &RemoteArgs) -> anyhow::Result<()> {
    let transactions = remote.client()?.list().await?;
    print_table(&transactions);
    Ok(())
}

pub async fn handle_watch(config: &Config, full_refresh: bool) -> anyhow::Result<()> {
    let store = crate::connect_store(config).await?;
    let mode = if full_refresh {
        RefreshMode::FullRefresh
    } else {
        RefreshMode::Incremental
    };
    let view = TransactionListView::open(store, mode).await?;

    let (tx, mut rx) = watch::channel(Vec::new());
    let driver = tokio::spawn(view.run_until_closed(tx));

    while rx.changed().await.is_ok() {
        let rows = rx.borrow().clone();
        print_table(&rows);
    }

    driver.await??;
    Ok(())
}

fn print_table(transactions: &[crate::domain::Transaction]) {
    println!(
        "{:<24} {:<20} {:>12} {:>5} {:<10} {}",
        "ID", "RECIPIENT", "AMOUNT", "SCORE", "STATUS", "DATE"
    );
    for tx in transactions {
        println!(
            "{:<24} {:<20} {:>12} {:>5} {:<10} {}",
            tx.id,
            tx.recipient_id,
            tx.amount.to_string(),
            tx.fraud_score.value(),
            tx.status.as_str(),
            tx.date.to_rfc3339()
        );
    }
    println!("({} transactions)\n", transactions.len());
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
