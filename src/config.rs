//! Configuration for hearing-sync
//!
//! CLI arguments and environment variable handling using clap.

use chrono_tz::Tz;
use clap::Parser;
use uuid::Uuid;

/// Hearing lifecycle synchronization engine
#[derive(Parser, Debug, Clone)]
#[command(name = "hearing-sync")]
#[command(about = "Reconciles hearing state between the scheduling service and the case record store")]
pub struct Args {
    /// Unique node identifier for this engine instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Base URL of the case record store (start/submit update API)
    #[arg(long, env = "RECORD_STORE_URL", default_value = "http://localhost:4452")]
    pub record_store_url: String,

    /// Base URL of the hearing scheduling service
    #[arg(long, env = "SCHEDULING_URL", default_value = "http://localhost:4561")]
    pub scheduling_url: String,

    /// Base URL of the venue directory
    #[arg(long, env = "VENUE_API_URL", default_value = "http://localhost:4571")]
    pub venue_api_url: String,

    /// Base URL of the judicial reference service
    #[arg(long, env = "JUDICIAL_API_URL", default_value = "http://localhost:4581")]
    pub judicial_api_url: String,

    /// Static bearer token attached to collaborator calls.
    /// Token acquisition/rotation belongs to the identity provider; this
    /// engine only carries the credential.
    #[arg(long, env = "SERVICE_TOKEN")]
    pub service_token: Option<String>,

    /// Service code this engine owns; inbound notifications for other
    /// services are skipped
    #[arg(long, env = "SERVICE_CODE", default_value = "BBA3")]
    pub service_code: String,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Per-call timeout for collaborator requests in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Number of dispatch worker tasks
    #[arg(long, env = "WORKER_COUNT", default_value = "4")]
    pub worker_count: usize,

    /// Maximum queued inbound notifications
    #[arg(long, env = "MAX_QUEUE_SIZE", default_value = "1000")]
    pub max_queue_size: usize,

    /// Maximum attempts for an orchestrator case commit
    #[arg(long, env = "COMMIT_MAX_ATTEMPTS", default_value = "3")]
    pub commit_max_attempts: u32,

    /// Backoff between commit attempts in milliseconds
    #[arg(long, env = "COMMIT_BACKOFF_MS", default_value = "500")]
    pub commit_backoff_ms: u64,

    /// Enable panel assignment merge (judicial reference lookups)
    #[arg(long, env = "PANEL_COMPOSITION_ENABLED", default_value = "false")]
    pub panel_composition_enabled: bool,

    /// Local timezone hearings are recorded in. The scheduling service
    /// reports timestamps in UTC.
    #[arg(long, env = "LOCAL_TIMEZONE", default_value = "Europe/London")]
    pub local_timezone: String,

    /// Run with in-memory collaborators instead of HTTP clients
    #[arg(
        long,
        env = "DEV_MODE",
        default_value = "false",
        num_args = 0..=1,
        default_missing_value = "true",
        action = clap::ArgAction::Set
    )]
    pub dev_mode: bool,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Subject carrying inbound hearing status notifications
    #[arg(long, env = "NATS_SUBJECT", default_value = "hearings.status")]
    pub nats_subject: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

impl Args {
    /// Parse the configured local timezone, falling back to Europe/London
    /// on an unknown name.
    pub fn local_tz(&self) -> Tz {
        self.local_timezone
            .parse()
            .unwrap_or(chrono_tz::Europe::London)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.service_token.is_none() {
            return Err("SERVICE_TOKEN is required outside dev mode".to_string());
        }

        if self.local_timezone.parse::<Tz>().is_err() {
            return Err(format!("Unknown LOCAL_TIMEZONE '{}'", self.local_timezone));
        }

        if self.commit_max_attempts == 0 {
            return Err("COMMIT_MAX_ATTEMPTS must be at least 1".to_string());
        }

        if self.worker_count == 0 {
            return Err("WORKER_COUNT must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate_in_dev_mode() {
        let args = Args::parse_from(["hearing-sync", "--dev-mode", "true"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.local_tz(), chrono_tz::Europe::London);
        assert_eq!(args.service_code, "BBA3");
    }

    #[test]
    fn test_token_required_outside_dev_mode() {
        let args = Args::parse_from(["hearing-sync"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut args = Args::parse_from(["hearing-sync", "--dev-mode", "true"]);
        args.local_timezone = "Mars/Olympus".to_string();
        assert!(args.validate().is_err());
    }
}
