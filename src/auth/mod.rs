//! Identity / token provider boundary
//!
//! Token acquisition is owned by an external identity service. The engine
//! only needs a credential to attach to record-store and scheduling calls,
//! so the boundary is a single trait.

use async_trait::async_trait;

use crate::types::Result;

/// Supplies the bearer credential attached to every collaborator call.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn service_token(&self) -> Result<String>;
}

/// Fixed-token provider for deployments where the credential is injected
/// via configuration, and for tests.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn service_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let provider = StaticTokenProvider::new("abc123");
        assert_eq!(provider.service_token().await.unwrap(), "abc123");
    }
}
