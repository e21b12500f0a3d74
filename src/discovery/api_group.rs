//! API Group Discoverer
//!
//! Answers "which backend replication APIs are installed" by probing the
//! Kubernetes discovery endpoint for each backend's API group and kind.

use super::profile;
use crate::domain::ports::{
    cancellable, Backend, BackendDiscoverer, BackendStatus, DiscoveryResult,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Discovers backends through the cluster's API catalog
pub struct ApiGroupDiscoverer {
    client: Client,
}

impl ApiGroupDiscoverer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn probe(&self, backend: Backend) -> Result<DiscoveryResult> {
        let profile = profile(backend);
        debug!("Probing API group {} for {}", profile.api_group, backend);

        let result = match kube::discovery::group(&self.client, profile.api_group).await {
            Ok(group) => {
                let serves_kind = group
                    .recommended_resources()
                    .iter()
                    .any(|(resource, _)| resource.kind == profile.kind);

                if serves_kind {
                    DiscoveryResult::new(backend, BackendStatus::Ready)
                        .with_capabilities(profile.capabilities.iter().copied())
                } else {
                    DiscoveryResult::new(backend, BackendStatus::Unready).with_message(format!(
                        "API group {} does not serve {}",
                        profile.api_group, profile.kind
                    ))
                }
            }
            Err(kube::Error::Discovery(_)) => DiscoveryResult::new(backend, BackendStatus::NotFound),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                DiscoveryResult::new(backend, BackendStatus::NotFound)
            }
            Err(e) => return Err(Error::Kube(e)),
        };

        Ok(result.with_api_group(profile.api_group))
    }
}

#[async_trait]
impl BackendDiscoverer for ApiGroupDiscoverer {
    async fn discover_backends(&self, cancel: &CancellationToken) -> Result<Vec<DiscoveryResult>> {
        cancellable(cancel, async {
            let mut present = Vec::new();
            for backend in Backend::all() {
                let result = self.probe(*backend).await?;
                if result.status.is_present() {
                    present.push(result);
                }
            }
            info!(
                "Discovered {} replication backend(s): {:?}",
                present.len(),
                present.iter().map(|r| r.backend.name()).collect::<Vec<_>>()
            );
            Ok::<_, Error>(present)
        })
        .await
    }

    async fn discover_backend(
        &self,
        cancel: &CancellationToken,
        backend: Backend,
    ) -> Result<DiscoveryResult> {
        cancellable(cancel, self.probe(backend)).await
    }
}
