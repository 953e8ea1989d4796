//! Minimal JSON/REST client for the managed cluster API.

use std::time::Duration;

use tracing::debug;

use super::{ClusterConfig, Resource, ResourceClass, ResourceList};
use crate::error::ClusterError;

/// Options for constructing a [`ClusterClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("warden/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to the managed cluster API.
///
/// Cheap to construct; holds no cached cluster state, which is why the
/// cleanup phase can build a fresh one to sidestep anything the serving
/// phase cached.
pub struct ClusterClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl ClusterClient {
    #[allow(clippy::result_large_err)]
    pub fn new(config: &ClusterConfig, options: ClientOptions) -> Result<Self, ClusterError> {
        let http = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .build()
            .map_err(ClusterError::Client)?;

        Ok(Self {
            http,
            base: config.endpoint().as_str().trim_end_matches('/').to_string(),
            token: config.token().map(str::to_string),
        })
    }

    fn collection_path(&self, class: &ResourceClass) -> String {
        format!(
            "/apis/{}/{}/{}",
            class.group, class.version, class.plural
        )
    }

    /// List all resources of a class.
    pub async fn list(&self, class: &ResourceClass) -> Result<Vec<Resource>, ClusterError> {
        let path = self.collection_path(class);
        let url = format!("{}{}", self.base, path);

        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ClusterError::Request)?;
        if !response.status().is_success() {
            return Err(ClusterError::Api {
                status: response.status(),
                path,
            });
        }

        let list: ResourceList = response.json().await.map_err(ClusterError::Request)?;
        debug!(class = %class, count = list.items.len(), "Listed resources");
        Ok(list.items)
    }

    /// Replace a resource with the given state.
    pub async fn update(
        &self,
        class: &ResourceClass,
        resource: &Resource,
    ) -> Result<Resource, ClusterError> {
        let path = format!(
            "{}/{}",
            self.collection_path(class),
            resource.metadata.name
        );
        let url = format!("{}{}", self.base, path);

        let mut request = self.http.put(&url).json(resource);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ClusterError::Request)?;
        if !response.status().is_success() {
            return Err(ClusterError::Api {
                status: response.status(),
                path,
            });
        }

        response.json().await.map_err(ClusterError::Request)
    }
}
