use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use ptw_application::{DispatchMode, RetryPolicy};
use ptw_core::AppError;
use tracing_subscriber::EnvFilter;

const MIN_TRIGGER_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct SmtpRuntimeConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub enum EmailProviderConfig {
    Console,
    Smtp(SmtpRuntimeConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitStoreConfig {
    Postgres,
    Redis { redis_url: String },
}

/// How permit notifications leave the API.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub email_provider: EmailProviderConfig,
    pub dispatch_mode: DispatchMode,
    /// Base for permit links in message bodies.
    pub app_base_url: String,
    pub retry_policy: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_secure: bool,
    pub idle_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub session: SessionConfig,
    pub trigger_shared_secret: String,
    pub rate_limit_store: RateLimitStoreConfig,
    pub notifications: NotificationConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_non_empty_env("DATABASE_URL")?;
        let database_max_connections = parse_positive(
            "DATABASE_MAX_CONNECTIONS",
            env::var("DATABASE_MAX_CONNECTIONS").ok(),
            10_u32,
        )?;
        // Browsers send Origin without a trailing slash.
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let app_base_url = env::var("APP_BASE_URL").unwrap_or_else(|_| frontend_url.clone());

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);
        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");
        let session = SessionConfig {
            cookie_secure,
            idle_minutes: parse_positive(
                "SESSION_IDLE_MINUTES",
                env::var("SESSION_IDLE_MINUTES").ok(),
                30_i64,
            )?,
        };

        // Migrations never serve trigger traffic, so the secret is optional there.
        let trigger_shared_secret = if migrate_only {
            env::var("TRIGGER_SHARED_SECRET").unwrap_or_default()
        } else {
            validate_trigger_secret(required_env("TRIGGER_SHARED_SECRET")?)?
        };

        let email_provider = match env::var("EMAIL_PROVIDER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => EmailProviderConfig::Console,
            "smtp" => {
                let port = required_non_empty_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
                EmailProviderConfig::Smtp(SmtpRuntimeConfig {
                    host: required_non_empty_env("SMTP_HOST")?,
                    port,
                    username: required_non_empty_env("SMTP_USERNAME")?,
                    password: required_non_empty_env("SMTP_PASSWORD")?,
                    from_address: required_non_empty_env("SMTP_FROM_ADDRESS")?,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "EMAIL_PROVIDER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        let rate_limit_store = match env::var("RATE_LIMIT_STORE")
            .unwrap_or_else(|_| "postgres".to_owned())
            .as_str()
        {
            "postgres" => RateLimitStoreConfig::Postgres,
            "redis" => RateLimitStoreConfig::Redis {
                redis_url: required_non_empty_env("REDIS_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "RATE_LIMIT_STORE must be either 'postgres' or 'redis', got '{other}'"
                )));
            }
        };

        let notification_dispatch_mode = DispatchMode::parse(
            env::var("NOTIFICATION_DISPATCH_MODE")
                .unwrap_or_else(|_| "detached".to_owned())
                .as_str(),
        )?;
        let retry_policy = retry_policy(
            env::var("NOTIFICATION_MAX_ATTEMPTS").ok(),
            env::var("NOTIFICATION_RETRY_DELAY_MS").ok(),
        )?;

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            frontend_url,
            api_host,
            api_port,
            session,
            trigger_shared_secret,
            rate_limit_store,
            notifications: NotificationConfig {
                email_provider,
                dispatch_mode: notification_dispatch_mode,
                app_base_url,
                retry_policy,
            },
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn validate_trigger_secret(secret: String) -> Result<String, AppError> {
    if secret.trim().len() < MIN_TRIGGER_SECRET_LENGTH {
        return Err(AppError::Validation(format!(
            "TRIGGER_SHARED_SECRET must be at least {MIN_TRIGGER_SECRET_LENGTH} characters"
        )));
    }

    Ok(secret)
}

fn retry_policy(
    max_attempts: Option<String>,
    delay_ms: Option<String>,
) -> Result<RetryPolicy, AppError> {
    let defaults = RetryPolicy::default();
    let default_delay_ms = u64::try_from(defaults.base_delay.as_millis()).unwrap_or(250);

    Ok(RetryPolicy {
        max_attempts: parse_positive(
            "NOTIFICATION_MAX_ATTEMPTS",
            max_attempts,
            defaults.max_attempts,
        )?,
        base_delay: Duration::from_millis(parse_positive(
            "NOTIFICATION_RETRY_DELAY_MS",
            delay_ms,
            default_delay_ms,
        )?),
    })
}

fn parse_positive<T>(name: &str, value: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed = match value {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        None => default,
    };

    if parsed <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(parsed)
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ptw_core::AppError;

    use super::{parse_positive, retry_policy, validate_trigger_secret};

    #[test]
    fn notification_retry_policy_reads_overrides() {
        let defaults = retry_policy(None, None).unwrap_or_else(|_| unreachable!());
        assert_eq!(defaults.max_attempts, 3);
        assert_eq!(defaults.base_delay, Duration::from_millis(250));

        let tuned = retry_policy(Some("5".to_owned()), Some(" 1000 ".to_owned()))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(tuned.max_attempts, 5);
        assert_eq!(tuned.base_delay, Duration::from_secs(1));

        assert!(matches!(
            retry_policy(Some("0".to_owned()), None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn positive_settings_reject_zero_and_garbage() {
        assert_eq!(parse_positive("X", None, 10_u32).ok(), Some(10));
        assert_eq!(parse_positive("X", Some("25".to_owned()), 10_u32).ok(), Some(25));
        assert!(parse_positive("X", Some("0".to_owned()), 10_u32).is_err());
        assert!(parse_positive("X", Some("-5".to_owned()), 30_i64).is_err());
        assert!(parse_positive("X", Some("many".to_owned()), 10_u32).is_err());
    }

    #[test]
    fn short_trigger_secret_is_rejected() {
        assert!(validate_trigger_secret("too-short".to_owned()).is_err());
        assert!(validate_trigger_secret(" ".repeat(40)).is_err());
    }

    #[test]
    fn long_trigger_secret_is_accepted() {
        let secret = "a".repeat(32);
        assert_eq!(
            validate_trigger_secret(secret.clone()).unwrap_or_default(),
            secret
        );
    }
}
