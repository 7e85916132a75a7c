//! Configuration types for edition-courier

use crate::error::{Error, Result};
use crate::tracking::EditionKeyScheme;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Main configuration for [`EditionCourier`](crate::EditionCourier)
///
/// Fields are organized into logical sub-configs:
/// - [`persistence`](PersistenceConfig): where the durable store lives
/// - [`tracking`](TrackingConfig): edition key scheme and store time budget
/// - [`delivery`](DeliveryConfig): fan-out concurrency, dry run, ledger
/// - [`timeouts`](TimeoutConfig): per-collaborator time budgets
/// - [`retry`](RetryConfig): backoff for transient collaborator failures
/// - [`notifications`](NotificationConfig): run report webhooks
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Edition tracking settings
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Delivery behavior settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Time budgets for external calls
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Retry configuration for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Run report notification settings
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    ///
    /// Missing sections fall back to their defaults. The loaded configuration
    /// is validated before it is returned.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.persistence.database_path.as_os_str().is_empty() {
            return Err(Error::config(
                "database path must not be empty",
                "persistence.database_path",
            ));
        }
        if self.delivery.max_concurrent_publications == 0 {
            return Err(Error::config(
                "must be at least 1",
                "delivery.max_concurrent_publications",
            ));
        }
        if self.delivery.max_concurrent_recipients == 0 {
            return Err(Error::config(
                "must be at least 1",
                "delivery.max_concurrent_recipients",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "backoff multiplier must be >= 1.0",
                "retry.backoff_multiplier",
            ));
        }

        let budgets = [
            ("timeouts.discovery", self.timeouts.discovery),
            ("timeouts.download", self.timeouts.download),
            ("timeouts.notify", self.timeouts.notify),
            ("timeouts.dropoff", self.timeouts.dropoff),
            ("timeouts.archive", self.timeouts.archive),
            ("tracking.store_timeout", self.tracking.store_timeout),
        ];
        for (key, budget) in budgets {
            if budget.is_zero() {
                return Err(Error::config("timeout must be greater than zero", key));
            }
        }

        for (i, webhook) in self.notifications.report_webhooks.iter().enumerate() {
            if url::Url::parse(&webhook.url).is_err() {
                return Err(Error::config(
                    format!("invalid webhook URL '{}'", webhook.url),
                    format!("notifications.report_webhooks[{}].url", i),
                ));
            }
        }

        Ok(())
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./edition-courier.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Edition tracking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// How edition keys are derived (default: issue number, `v2`)
    ///
    /// Changing this for an existing store requires running the one-time
    /// rekey migration first.
    #[serde(default)]
    pub key_scheme: EditionKeyScheme,

    /// Time budget for each tracking-store call (default: 10 seconds)
    #[serde(default = "default_store_timeout", with = "duration_serde")]
    pub store_timeout: Duration,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            key_scheme: EditionKeyScheme::default(),
            store_timeout: default_store_timeout(),
        }
    }
}

/// Delivery behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Publications processed in parallel within one run (default: 1)
    #[serde(default = "default_max_concurrent_publications")]
    pub max_concurrent_publications: usize,

    /// Recipients delivered to in parallel within one publication (default: 4)
    ///
    /// Keep this low enough to respect notification-server throughput and
    /// drop-off API throttling.
    #[serde(default = "default_max_concurrent_recipients")]
    pub max_concurrent_recipients: usize,

    /// Report what would be delivered without any side effects (default: false)
    #[serde(default)]
    pub dry_run: bool,

    /// Record every successful (edition, recipient, channel) delivery so a
    /// resumed run does not deliver twice (default: true)
    #[serde(default = "default_true")]
    pub ledger_enabled: bool,

    /// Organize drop-offs into year folders when neither recipient nor
    /// publication say otherwise (default: true)
    #[serde(default = "default_true")]
    pub organize_by_year: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_publications: default_max_concurrent_publications(),
            max_concurrent_recipients: default_max_concurrent_recipients(),
            dry_run: false,
            ledger_enabled: true,
            organize_by_year: true,
        }
    }
}

/// Time budgets for each external collaborator call
///
/// Every attempt is bounded separately; retries get a fresh budget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Edition discovery (default: 60 seconds)
    #[serde(default = "default_discovery_timeout", with = "duration_serde")]
    pub discovery: Duration,

    /// Artifact download (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download: Duration,

    /// Single notification send (default: 60 seconds)
    #[serde(default = "default_notify_timeout", with = "duration_serde")]
    pub notify: Duration,

    /// Single drop-off upload (default: 120 seconds)
    #[serde(default = "default_dropoff_timeout", with = "duration_serde")]
    pub dropoff: Duration,

    /// Archival write (default: 120 seconds)
    #[serde(default = "default_archive_timeout", with = "duration_serde")]
    pub archive: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            discovery: default_discovery_timeout(),
            download: default_download_timeout(),
            notify: default_notify_timeout(),
            dropoff: default_dropoff_timeout(),
            archive: default_archive_timeout(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Run report notification configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhooks that receive the consolidated report after every run
    #[serde(default)]
    pub report_webhooks: Vec<WebhookConfig>,
}

/// Webhook configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// URL to POST to
    pub url: String,

    /// Optional authentication header value
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Timeout for webhook requests (default: 30 seconds)
    #[serde(default = "default_webhook_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./edition-courier.db")
}

fn default_true() -> bool {
    true
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent_publications() -> usize {
    1
}

fn default_max_concurrent_recipients() -> usize {
    4
}

fn default_discovery_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_notify_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_dropoff_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_archive_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_webhook_timeout() -> Duration {
    Duration::from_secs(30)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.tracking.key_scheme, EditionKeyScheme::IssueNumber);
        assert!(config.delivery.ledger_enabled);
        assert!(config.delivery.organize_by_year);
        assert!(!config.delivery.dry_run);
    }

    #[test]
    fn empty_json_object_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.delivery.max_concurrent_recipients, 4);
        assert_eq!(config.timeouts.download, Duration::from_secs(300));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn durations_are_read_as_seconds() {
        let config: Config = serde_json::from_str(
            r#"{
                "timeouts": { "notify": 5 },
                "tracking": { "key_scheme": "publication_date", "store_timeout": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.timeouts.notify, Duration::from_secs(5));
        assert_eq!(config.timeouts.archive, Duration::from_secs(120));
        assert_eq!(config.tracking.store_timeout, Duration::from_secs(2));
        assert_eq!(
            config.tracking.key_scheme,
            EditionKeyScheme::PublicationDate
        );
    }

    #[test]
    fn zero_recipient_concurrency_is_rejected() {
        let mut config = Config::default();
        config.delivery.max_concurrent_recipients = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(
                key.as_deref(),
                Some("delivery.max_concurrent_recipients")
            ),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.timeouts.dropoff = Duration::ZERO;
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("timeouts.dropoff")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_report_webhook_url_is_rejected() {
        let mut config = Config::default();
        config.notifications.report_webhooks.push(WebhookConfig {
            url: "not a url".into(),
            auth_header: None,
            timeout: Duration::from_secs(1),
        });
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("invalid webhook URL"));
    }

    #[test]
    fn from_json_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courier.json");
        std::fs::write(
            &path,
            r#"{ "delivery": { "max_concurrent_publications": 2, "dry_run": true } }"#,
        )
        .unwrap();

        let config = Config::from_json_file(&path).unwrap();
        assert_eq!(config.delivery.max_concurrent_publications, 2);
        assert!(config.delivery.dry_run);

        std::fs::write(&path, r#"{ "delivery": { "max_concurrent_publications": 0 } }"#).unwrap();
        assert!(Config::from_json_file(&path).is_err());
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let err = Config::from_json_file(Path::new("/nonexistent/courier.json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
