//! Permit-to-work periodic trigger runner.
//!
//! Calls the API's internal job endpoints on fixed intervals using the shared
//! trigger secret. All job logic stays in the API process.

#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use ptw_core::{AppError, AppResult};
use reqwest::header;
use serde_json::Value;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ACTIVATE_PATH: &str = "/api/internal/jobs/permits/activate";
const EXPIRE_PATH: &str = "/api/internal/jobs/permits/expire";
const DIGEST_PATH: &str = "/api/internal/jobs/reminders/digest";
const MIN_TRIGGER_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone)]
struct WorkerConfig {
    api_base_url: String,
    trigger_shared_secret: String,
    activation_interval_secs: u64,
    digest_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    info!(
        api_base_url = %config.api_base_url,
        activation_interval_secs = config.activation_interval_secs,
        digest_interval_secs = config.digest_interval_secs,
        "ptw-worker started"
    );

    let mut lifecycle_ticker = interval(Duration::from_secs(config.activation_interval_secs));
    lifecycle_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut digest_ticker = interval(Duration::from_secs(config.digest_interval_secs));
    digest_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = lifecycle_ticker.tick() => {
                run_job(&http_client, &config, ACTIVATE_PATH).await;
                run_job(&http_client, &config, EXPIRE_PATH).await;
            }
            _ = digest_ticker.tick() => {
                run_job(&http_client, &config, DIGEST_PATH).await;
            }
        }
    }
}

async fn run_job(http_client: &reqwest::Client, config: &WorkerConfig, path: &str) {
    match trigger_job(http_client, config, path).await {
        Ok(summary) => info!(path, summary = %summary, "job trigger completed"),
        Err(error) => warn!(path, error = %error, "job trigger failed"),
    }
}

async fn trigger_job(
    http_client: &reqwest::Client,
    config: &WorkerConfig,
    path: &str,
) -> AppResult<Value> {
    let endpoint = job_endpoint(config.api_base_url.as_str(), path);
    let response = http_client
        .post(endpoint)
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", config.trigger_shared_secret),
        )
        .send()
        .await
        .map_err(|error| AppError::Internal(format!("failed to call {path}: {error}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        return Err(AppError::Internal(format!(
            "{path} returned status {}: {body}",
            status.as_u16()
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|error| AppError::Internal(format!("failed to parse {path} response: {error}")))
}

fn job_endpoint(api_base_url: &str, path: &str) -> String {
    format!("{}{path}", api_base_url.trim_end_matches('/'))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let api_base_url = env::var("WORKER_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let trigger_shared_secret = validate_trigger_secret(
            env::var("TRIGGER_SHARED_SECRET")
                .map_err(|_| AppError::Validation("TRIGGER_SHARED_SECRET is required".to_owned()))?,
        )?;
        let activation_interval_secs = parse_positive_secs(
            "WORKER_ACTIVATION_INTERVAL_SECS",
            env_value("WORKER_ACTIVATION_INTERVAL_SECS"),
            60,
        )?;
        let digest_interval_secs = parse_positive_secs(
            "WORKER_DIGEST_INTERVAL_SECS",
            env_value("WORKER_DIGEST_INTERVAL_SECS"),
            3600,
        )?;

        Ok(Self {
            api_base_url,
            trigger_shared_secret,
            activation_interval_secs,
            digest_interval_secs,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn env_value(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn validate_trigger_secret(value: String) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.len() < MIN_TRIGGER_SECRET_LENGTH {
        return Err(AppError::Validation(format!(
            "TRIGGER_SHARED_SECRET must be at least {MIN_TRIGGER_SECRET_LENGTH} characters"
        )));
    }

    Ok(trimmed.to_owned())
}

fn parse_positive_secs(name: &str, value: Option<String>, default: u64) -> AppResult<u64> {
    let seconds = match value {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if seconds == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(seconds)
}
