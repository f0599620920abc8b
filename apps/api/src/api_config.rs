use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tidewire_core::{AppError, TenantId};
use tidewire_domain::RetryPolicy;
use tidewire_infrastructure::EventBrokerConfig;
use tracing_subscriber::EnvFilter;

/// Command selected by the first process argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCommand {
    /// Serve HTTP traffic.
    Serve,
    /// Apply migrations and exit.
    Migrate,
    /// Issue one viewer token, print it and exit.
    IssueViewerToken(ViewerTokenRequest),
}

/// Arguments of `issue-viewer-token <tenant_id> <subject> [acting_tenant_id]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerTokenRequest {
    pub tenant_id: TenantId,
    pub subject: String,
    pub acting_tenant_id: Option<TenantId>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub command: ApiCommand,
    pub database_url: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub event_broker: EventBrokerConfig,
    pub stream_keepalive: Duration,
    pub history_max_page_size: usize,
    pub retry_policy: RetryPolicy,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let arguments: Vec<String> = env::args().skip(1).collect();
        Self::from_lookup(&arguments, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        arguments: &[String],
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let command = parse_command(arguments, &lookup)?;
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let frontend_url =
            lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".to_owned());
        let api_host = lookup("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_value(&lookup, "API_PORT", 3001_u16)?;

        let event_broker = EventBrokerConfig {
            queue_capacity: parse_positive(&lookup, "EVENT_BROKER_QUEUE_CAPACITY", 200)?,
            replay_capacity: parse_value(&lookup, "EVENT_BROKER_REPLAY_CAPACITY", 500)?,
        };
        let stream_keepalive_seconds = parse_positive(&lookup, "STREAM_KEEPALIVE_SECONDS", 15)?;
        let history_max_page_size = parse_positive(&lookup, "HISTORY_MAX_PAGE_SIZE", 200)?;
        let retry_policy = RetryPolicy::new(
            parse_value(&lookup, "OUTBOUND_MAX_ATTEMPTS", 8)?,
            parse_value(&lookup, "OUTBOUND_BACKOFF_BASE_SECONDS", 30)?,
            parse_value(&lookup, "OUTBOUND_BACKOFF_MAX_SECONDS", 3_600)?,
        )?;

        Ok(Self {
            command,
            database_url,
            frontend_url,
            api_host,
            api_port,
            event_broker,
            stream_keepalive: Duration::from_secs(stream_keepalive_seconds),
            history_max_page_size,
            retry_policy,
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

fn parse_command(
    arguments: &[String],
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ApiCommand, AppError> {
    match arguments.first().map(String::as_str) {
        None | Some("serve") => Ok(ApiCommand::Serve),
        Some("migrate") => Ok(ApiCommand::Migrate),
        Some("issue-viewer-token") => {
            let (Some(tenant_id), Some(subject)) = (arguments.get(1), arguments.get(2)) else {
                return Err(AppError::Validation(
                    "usage: issue-viewer-token <tenant_id> <subject> [acting_tenant_id]"
                        .to_owned(),
                ));
            };

            let ttl_hours: i64 = parse_value(lookup, "VIEWER_TOKEN_TTL_HOURS", 0)?;
            let expires_at =
                (ttl_hours > 0).then(|| Utc::now() + chrono::TimeDelta::hours(ttl_hours));

            Ok(ApiCommand::IssueViewerToken(ViewerTokenRequest {
                tenant_id: TenantId::from_str(tenant_id)?,
                subject: subject.clone(),
                acting_tenant_id: arguments
                    .get(3)
                    .map(|value| TenantId::from_str(value))
                    .transpose()?,
                expires_at,
            }))
        }
        Some(other) => Err(AppError::Validation(format!(
            "unknown command '{other}', expected serve, migrate or issue-viewer-token"
        ))),
    }
}

fn parse_value<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        _ => Ok(default),
    }
}

fn parse_positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = parse_value(lookup, name, default)?;
    if value <= T::default() {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tidewire_core::AppError;
    use tidewire_domain::RetryPolicy;

    use super::{ApiCommand, ApiConfig};

    fn config_from(arguments: &[&str], variables: &[(&str, &str)]) -> Result<ApiConfig, AppError> {
        let variables: HashMap<String, String> = variables
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        let arguments: Vec<String> = arguments.iter().map(|value| (*value).to_owned()).collect();

        ApiConfig::from_lookup(&arguments, |name| variables.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = config_from(&[], &[("DATABASE_URL", "postgres://localhost/tidewire")]);

        assert!(config.is_ok_and(|config| {
            config.command == ApiCommand::Serve
                && config.api_port == 3001
                && config.event_broker.queue_capacity == 200
                && config.event_broker.replay_capacity == 500
                && config.stream_keepalive == Duration::from_secs(15)
                && config.history_max_page_size == 200
                && config.retry_policy == RetryPolicy::default()
        }));
    }

    #[test]
    fn missing_database_url_is_rejected() {
        assert!(matches!(
            config_from(&[], &[]),
            Err(AppError::Validation(message)) if message.contains("DATABASE_URL")
        ));
    }

    #[test]
    fn zero_keepalive_and_unparsable_values_are_rejected() {
        let database = ("DATABASE_URL", "postgres://localhost/tidewire");

        assert!(config_from(&[], &[database, ("STREAM_KEEPALIVE_SECONDS", "0")]).is_err());
        assert!(config_from(&[], &[database, ("API_PORT", "not-a-port")]).is_err());
        assert!(config_from(&[], &[database, ("OUTBOUND_MAX_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn issue_viewer_token_command_parses_tenants() {
        let tenant = "018f2b5e-0000-7000-8000-000000000001";
        let acting = "018f2b5e-0000-7000-8000-000000000002";
        let config = config_from(
            &["issue-viewer-token", tenant, "support", acting],
            &[("DATABASE_URL", "postgres://localhost/tidewire")],
        );

        let Ok(config) = config else {
            panic!("config should load");
        };
        let ApiCommand::IssueViewerToken(request) = config.command else {
            panic!("expected issue-viewer-token command");
        };
        assert_eq!(request.tenant_id.to_string(), tenant);
        assert_eq!(request.subject, "support");
        assert_eq!(
            request.acting_tenant_id.map(|tenant_id| tenant_id.to_string()),
            Some(acting.to_owned())
        );
        assert_eq!(request.expires_at, None);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let config = config_from(&["reindex"], &[("DATABASE_URL", "postgres://db")]);
        assert!(config.is_err());
    }
}
