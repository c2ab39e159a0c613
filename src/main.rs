use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

use oss_meter_client::constants::token::MAX_VALIDITY_DAYS;
use oss_meter_client::models::{Measurement, Phase, PowerUnit, Statistic, TelemetryReading};
use oss_meter_client::startup::init_tracing;
use oss_meter_client::{
    ApiToken, AuthChallenge, Config, CredentialStore, FileCredentialStore, MeterDirectoryClient,
    MeterIdentifier, OssError, ProvisioningFlow, SecretPrompt, TelemetryClient, TelemetryWatcher,
    VendorClient,
};

#[derive(Parser)]
#[command(name = "oss-provision", version, about = "Provision API credentials for the OSS HAN meter API")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Credentials file (overrides OSS_CREDENTIALS_PATH)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the email challenge, create an API token and store it with a meter
    Provision {
        /// Account email (defaults to OSS_ACCOUNT_EMAIL)
        #[arg(long)]
        email: Option<String>,
        /// Token label
        #[arg(long)]
        label: Option<String>,
        /// Token validity in days (1 to 3650)
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..=MAX_VALIDITY_DAYS))]
        valid_days: Option<i64>,
        /// Meter to store when the account has several
        #[arg(long)]
        meter: Option<String>,
    },
    /// List meters using the stored token
    Meters,
    /// Print the latest telemetry reading
    Read {
        #[arg(long)]
        meter: Option<String>,
    },
    /// Poll telemetry until interrupted
    Watch {
        #[arg(long)]
        meter: Option<String>,
    },
    /// Show the stored configuration with the token redacted
    Show,
}

/// Reads the emailed secret from standard input, one line per attempt
struct StdinPrompt {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinPrompt {
    fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }
}

#[async_trait]
impl SecretPrompt for StdinPrompt {
    async fn emailed_secret(&self, challenge: &AuthChallenge, attempt: u32) -> Result<SecretString, OssError> {
        let message = if attempt == 1 {
            format!("Enter the secret emailed to {}: ", challenge.email())
        } else {
            format!("Secret rejected. Enter the secret emailed to {} again: ", challenge.email())
        };

        let mut stderr = tokio::io::stderr();
        let written = match stderr.write_all(message.as_bytes()).await {
            Ok(()) => stderr.flush().await,
            Err(e) => Err(e),
        };
        written.map_err(|e| OssError::Configuration(format!("Failed to write prompt: {}", e)))?;

        let line = self
            .lines
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| OssError::Configuration(format!("Failed to read secret: {}", e)))?
            .ok_or_else(|| OssError::Configuration("Standard input closed before a secret was entered".to_string()))?;

        Ok(SecretString::from(line.trim().to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    init_tracing(&config.log_level, cli.json_logs);

    if let Some(path) = cli.credentials {
        config.credentials_path = path;
    }
    let store = FileCredentialStore::new(config.credentials_path.clone());

    match cli.command {
        Command::Provision {
            email,
            label,
            valid_days,
            meter,
        } => {
            if let Some(label) = label {
                config.token_label = label;
            }
            if let Some(days) = valid_days {
                config.token_validity_days = days;
            }
            if meter.is_some() {
                config.preferred_meter = meter;
            }
            let email = email
                .or_else(|| config.account_email.clone())
                .ok_or_else(|| anyhow!("No account email: pass --email or set OSS_ACCOUNT_EMAIL"))?;
            provision(&config, store, &email).await
        }
        Command::Meters => {
            let (token, _) = load_credentials(&store).await?;
            let vendor = VendorClient::from_config(&config)?;
            let meters = MeterDirectoryClient::new(vendor, config.retry.clone())
                .list_meters(&token)
                .await?;
            if meters.is_empty() {
                println!("No meters registered on this account");
            }
            for meter in meters {
                println!("{}", meter);
            }
            Ok(())
        }
        Command::Read { meter } => {
            let (token, stored_meter) = load_credentials(&store).await?;
            let meter = pick_meter(meter, stored_meter)?;
            let client = TelemetryClient::new(VendorClient::from_config(&config)?);
            let reading = client.latest(&token, &meter).await?;
            print_reading(&meter, &reading);
            Ok(())
        }
        Command::Watch { meter } => {
            let (token, stored_meter) = load_credentials(&store).await?;
            let meter = pick_meter(meter, stored_meter)?;
            let client = TelemetryClient::new(VendorClient::from_config(&config)?);
            let watcher = TelemetryWatcher::new(client, token, meter, config.poll_interval());
            watcher.run(print_reading).await?;
            Ok(())
        }
        Command::Show => {
            let Some(stored) = store.load_configuration().await? else {
                println!("No credentials stored at {}", store.path().display());
                return Ok(());
            };
            println!("path:        {}", store.path().display());
            println!("meterNumber: {}", stored.meter_number);
            println!("token:       {}", redact(&stored.token));
            if let Some((token, _)) = store.load().await? {
                if !token.label().is_empty() {
                    println!("label:       {}", token.label());
                }
                if token.is_expired() {
                    println!("expires:     {} (EXPIRED)", token.expires_at().to_rfc3339());
                } else if token.expires_at() != chrono::DateTime::<chrono::Utc>::MAX_UTC {
                    println!("expires:     {}", token.expires_at().to_rfc3339());
                }
            }
            Ok(())
        }
    }
}

async fn provision(config: &Config, store: FileCredentialStore, email: &str) -> Result<()> {
    let path = store.path().to_path_buf();
    let flow = ProvisioningFlow::from_config(config, Arc::new(store))?;

    let outcome = match flow.run(email, &StdinPrompt::new()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(token) = &e.unsaved_token {
                print_unsaved_token(token);
            }
            return Err(e.into());
        }
    };

    match &outcome.selected {
        Some(meter) => {
            info!(path = %path.display(), "Credentials stored");
            println!("Stored token '{}' for meter {} in {}", outcome.token.label(), meter, path.display());
            if outcome.meters.len() > 1 {
                println!(
                    "Other meters on this account: {}",
                    outcome
                        .meters
                        .iter()
                        .filter(|m| *m != meter)
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
        None => {
            warn!("No meters found on the account");
            println!("No meters are registered on this account, nothing was stored.");
            print_unsaved_token(&outcome.token);
        }
    }
    Ok(())
}

/// The vendor shows a token once; print it so the operator can keep it
fn print_unsaved_token(token: &ApiToken) {
    eprintln!("The API token below was created but not stored. Copy it now, it cannot be retrieved again.");
    println!("{}", token.expose_secret());
}

async fn load_credentials(store: &FileCredentialStore) -> Result<(ApiToken, MeterIdentifier)> {
    let (token, meter) = store
        .load()
        .await?
        .with_context(|| format!("No credentials stored at {}, run `oss-provision provision` first", store.path().display()))?;
    if token.is_expired() {
        warn!(expires_at = %token.expires_at().to_rfc3339(), "Stored token has expired");
    }
    Ok((token, meter))
}

fn pick_meter(requested: Option<String>, stored: MeterIdentifier) -> Result<MeterIdentifier> {
    match requested {
        Some(raw) => raw.parse().map_err(|e: String| anyhow!(e)),
        None => Ok(stored),
    }
}

fn redact(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}… ({} characters)", visible, token.chars().count())
}

fn print_reading(meter: &MeterIdentifier, reading: &TelemetryReading) {
    println!("Meter {}", meter);
    if let Some(kwh) = reading.total_energy_kwh() {
        println!("  Total energy: {} kWh", kwh);
    }
    for statistic in Statistic::ALL {
        if let Some(value) = reading.active_power(statistic, PowerUnit::Kilowatt) {
            println!("  Active power {}: {} {}", statistic.as_str(), value, PowerUnit::Kilowatt.symbol());
        }
    }
    for phase in Phase::ALL {
        for measurement in Measurement::ALL {
            if let Some(value) = reading.phase_value(phase, measurement, Statistic::Avg) {
                println!("  {} {:?} avg: {} {}", phase.label(), measurement, value, measurement.unit());
            }
        }
    }
}
