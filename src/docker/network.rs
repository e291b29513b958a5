//! Shared bridge network management.

use crate::docker::client::DockerClient;
use crate::docker::error::Result;
use crate::docker::spec::NetworkSummary;

impl DockerClient {
    /// Create the bridge network `name` unless it exists. Returns whether it
    /// was created by this call.
    pub async fn ensure_network(&self, name: &str) -> Result<bool> {
        if self.find_network(name).await?.is_some() {
            return Ok(false);
        }

        self.engine().create_network(name).await?;

        if self.find_network(name).await?.is_none() {
            return Err(crate::docker::DockerError::Network {
                name: name.to_string(),
                reason: "network missing right after creation".to_string(),
            });
        }

        tracing::info!("Created network {}", name);
        Ok(true)
    }

    /// Remove the network `name` if it exists. Returns whether it was removed.
    pub async fn remove_network(&self, name: &str) -> Result<bool> {
        let Some(network) = self.find_network(name).await? else {
            return Ok(false);
        };

        self.engine().remove_network(&network.id).await?;
        tracing::info!("Removed network {}", name);
        Ok(true)
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkSummary>> {
        let networks = self.engine().list_networks().await?;
        Ok(networks.into_iter().find(|n| n.name == name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::docker::DockerClient;
    use crate::testing::FakeEngine;

    #[tokio::test]
    async fn test_ensure_network_is_idempotent() {
        let engine = Arc::new(FakeEngine::new());
        let docker = DockerClient::new(engine.clone());

        assert!(docker.ensure_network("kana").await.unwrap());
        assert!(!docker.ensure_network("kana").await.unwrap());
        assert_eq!(engine.network_names(), vec!["kana"]);
    }

    #[tokio::test]
    async fn test_remove_network_if_present() {
        let engine = Arc::new(FakeEngine::new());
        let docker = DockerClient::new(engine.clone());

        assert!(!docker.remove_network("kana").await.unwrap());
        docker.ensure_network("kana").await.unwrap();
        assert!(docker.remove_network("kana").await.unwrap());
        assert!(engine.network_names().is_empty());
    }
}
