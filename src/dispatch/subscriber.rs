//! NATS subscription feeding the dispatch pool
//!
//! One subscriber per engine instance. Messages are JSON-encoded status
//! notifications; malformed payloads and notifications owned by other
//! services are logged and skipped, never nacked.

use std::time::Duration;

use async_nats::ConnectOptions;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::DispatchPool;
use crate::config::NatsArgs;
use crate::model::InboundStatusNotification;
use crate::types::{Result, SyncError};

const PING_INTERVAL: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to NATS with the configured credentials.
///
/// Fails fast if the server is unreachable; reconnection is handled by the
/// client after the initial successful connection.
pub async fn connect(args: &NatsArgs, name: &str) -> Result<async_nats::Client> {
    info!("Connecting to NATS at {}", args.nats_url);

    let mut options = ConnectOptions::new()
        .name(name)
        .ping_interval(PING_INTERVAL)
        .connection_timeout(CONNECT_TIMEOUT);

    if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
        options = options.user_and_password(user.clone(), pass.clone());
    }

    let client = options
        .connect(&args.nats_url)
        .await
        .map_err(|e| SyncError::Queue(format!("Failed to connect: {}", e)))?;

    info!("Connected to NATS at {}", args.nats_url);
    Ok(client)
}

/// Subscribe to the notification subject and feed the pool until the
/// subscription ends. Intended to run as a spawned task.
pub async fn run(
    client: async_nats::Client,
    subject: String,
    service_code: String,
    pool: DispatchPool,
) -> Result<()> {
    let mut subscription = client
        .subscribe(subject.clone())
        .await
        .map_err(|e| SyncError::Queue(format!("Subscribe failed: {}", e)))?;

    info!(subject = %subject, service_code = %service_code, "Listening for status notifications");

    while let Some(message) = subscription.next().await {
        let notification: InboundStatusNotification =
            match serde_json::from_slice(&message.payload) {
                Ok(n) => n,
                Err(e) => {
                    warn!(
                        subject = %subject,
                        error = %e,
                        "Skipping malformed notification payload"
                    );
                    continue;
                }
            };

        if !owned_by(&notification, &service_code) {
            debug!(
                case_id = notification.case_id,
                service_code = %notification.service_code,
                "Skipping notification for another service"
            );
            continue;
        }

        if let Err(e) = pool.handle(notification).await {
            error!(error = %e, "Failed to queue notification");
        }
    }

    warn!(subject = %subject, "Notification subscription ended");
    Ok(())
}

/// Notifications carry the owning service code; only our own are processed.
fn owned_by(notification: &InboundStatusNotification, service_code: &str) -> bool {
    notification.service_code == service_code
}

#[cfg(test)]
mod tests {
    use super::owned_by;
    use crate::model::{InboundStatusNotification, SchedulingStatus};

    #[test]
    fn test_notification_payload_shape() {
        let payload = br#"{
            "caseId": 42,
            "hearingId": "H1",
            "status": "CANCELLED",
            "cancellationReasonCodes": ["withdrawn"],
            "version": 3,
            "serviceCode": "BBA3"
        }"#;
        let n: InboundStatusNotification = serde_json::from_slice(payload).unwrap();
        assert_eq!(n.status, SchedulingStatus::Cancelled);
        assert_eq!(n.cancellation_reason_codes.len(), 1);
    }

    #[test]
    fn test_foreign_service_code_is_skipped() {
        let n = InboundStatusNotification {
            case_id: 42,
            hearing_id: "H1".to_string(),
            status: SchedulingStatus::Listed,
            cancellation_reason_codes: Vec::new(),
            version: 1,
            service_code: "ABA5".to_string(),
        };
        assert!(!owned_by(&n, "BBA3"));
        assert!(owned_by(&n, "ABA5"));
    }
}
