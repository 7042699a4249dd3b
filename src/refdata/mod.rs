//! Reference data collaborators
//!
//! - `VenueDirectory`: resolves an active venue code to venue details
//! - `JudicialReference`: resolves judicial personal codes to identities
//!
//! Both have a small HTTP client and an in-memory directory for dev mode
//! and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::RwLock;

use crate::auth::IdentityProvider;
use crate::model::{JudicialIdentity, Venue};
use crate::types::{Result, SyncError};

/// Venue lookup by venue code. Returns `None` for unknown or inactive
/// venues; the caller decides whether that is structural.
#[async_trait]
pub trait VenueDirectory: Send + Sync {
    async fn resolve_venue(&self, venue_code: &str) -> Result<Option<Venue>>;
}

/// Judicial identity lookup by personal code.
#[async_trait]
pub trait JudicialReference: Send + Sync {
    async fn resolve_identity(&self, personal_code: &str) -> Result<JudicialIdentity>;
}

/// In-memory venue directory.
pub struct InMemoryVenueDirectory {
    venues: RwLock<HashMap<String, Venue>>,
}

impl InMemoryVenueDirectory {
    pub fn new() -> Self {
        Self {
            venues: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, venue_code: impl Into<String>, venue: Venue) {
        self.venues.write().await.insert(venue_code.into(), venue);
    }
}

impl Default for InMemoryVenueDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VenueDirectory for InMemoryVenueDirectory {
    async fn resolve_venue(&self, venue_code: &str) -> Result<Option<Venue>> {
        Ok(self.venues.read().await.get(venue_code).cloned())
    }
}

/// In-memory judicial reference that derives a display name from the
/// personal code when nothing has been scripted.
pub struct InMemoryJudicialReference {
    identities: RwLock<HashMap<String, JudicialIdentity>>,
}

impl InMemoryJudicialReference {
    pub fn new() -> Self {
        Self {
            identities: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, identity: JudicialIdentity) {
        self.identities
            .write()
            .await
            .insert(identity.personal_code.clone(), identity);
    }
}

impl Default for InMemoryJudicialReference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudicialReference for InMemoryJudicialReference {
    async fn resolve_identity(&self, personal_code: &str) -> Result<JudicialIdentity> {
        Ok(self
            .identities
            .read()
            .await
            .get(personal_code)
            .cloned()
            .unwrap_or_else(|| JudicialIdentity {
                personal_code: personal_code.to_string(),
                full_name: format!("Panel member {}", personal_code),
            }))
    }
}

/// Shared configuration for the reference data HTTP clients.
#[derive(Debug, Clone)]
pub struct RefDataClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl RefDataClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }
}

/// HTTP venue directory client.
pub struct HttpVenueDirectory {
    config: RefDataClientConfig,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpVenueDirectory {
    pub fn new(config: RefDataClientConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            identity,
        })
    }
}

#[async_trait]
impl VenueDirectory for HttpVenueDirectory {
    async fn resolve_venue(&self, venue_code: &str) -> Result<Option<Venue>> {
        let url = format!("{}/venues/{}", self.config.base_url, venue_code);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.identity.service_token().await?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SyncError::Transport(format!(
                    "venue directory returned {} for venue {}: {}",
                    status, venue_code, body
                )))
            }
        }
    }
}

/// HTTP judicial reference client.
pub struct HttpJudicialReference {
    config: RefDataClientConfig,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl HttpJudicialReference {
    pub fn new(config: RefDataClientConfig, identity: Arc<dyn IdentityProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            identity,
        })
    }
}

#[async_trait]
impl JudicialReference for HttpJudicialReference {
    async fn resolve_identity(&self, personal_code: &str) -> Result<JudicialIdentity> {
        let url = format!("{}/judicial-users/{}", self.config.base_url, personal_code);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.identity.service_token().await?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!(
                "judicial reference returned {} for code {}: {}",
                status, personal_code, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_venue_resolves_to_none() {
        let dir = InMemoryVenueDirectory::new();
        assert!(dir.resolve_venue("V999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_venue_resolves() {
        let dir = InMemoryVenueDirectory::new();
        dir.insert(
            "V100",
            Venue {
                name: "Birmingham".to_string(),
                address: "1 Victoria Square".to_string(),
                postcode: "B1 1BD".to_string(),
            },
        )
        .await;

        let venue = dir.resolve_venue("V100").await.unwrap().unwrap();
        assert_eq!(venue.name, "Birmingham");
    }

    #[tokio::test]
    async fn test_judicial_fallback_name() {
        let judicial = InMemoryJudicialReference::new();
        let identity = judicial.resolve_identity("JP01").await.unwrap();
        assert_eq!(identity.full_name, "Panel member JP01");
    }
}
