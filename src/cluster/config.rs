//! Cluster connection discovery.

use url::Url;

use crate::error::ClusterError;

/// Environment variable naming the cluster API endpoint.
pub const ENV_API_SERVER: &str = "WARDEN_API_SERVER";
/// Environment variable carrying a bearer token verbatim.
pub const ENV_API_TOKEN: &str = "WARDEN_API_TOKEN";
/// Environment variable naming a file to read the bearer token from.
pub const ENV_API_TOKEN_FILE: &str = "WARDEN_API_TOKEN_FILE";

/// In-cluster service-account token path, used when nothing else is set.
const IN_CLUSTER_TOKEN_FILE: &str = "/var/run/secrets/warden/token";
/// In-cluster service host/port variables injected by the platform.
const ENV_SERVICE_HOST: &str = "WARDEN_SERVICE_HOST";
const ENV_SERVICE_PORT: &str = "WARDEN_SERVICE_PORT";

/// Connection configuration for the managed cluster API.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    endpoint: Url,
    token: Option<String>,
}

impl ClusterConfig {
    /// Build a configuration from an already-known endpoint.
    #[allow(clippy::result_large_err)]
    pub fn from_endpoint(endpoint: &str) -> Result<Self, ClusterError> {
        let endpoint = Url::parse(endpoint).map_err(|source| ClusterError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Self {
            endpoint,
            token: None,
        })
    }

    /// Discover connection configuration from the process environment.
    ///
    /// `override_url` (from the config file) wins over the environment;
    /// the environment wins over the in-cluster service variables.
    #[allow(clippy::result_large_err)]
    pub fn discover(override_url: Option<&str>) -> Result<Self, ClusterError> {
        Self::discover_from(&ClusterEnv::from_process(), override_url)
    }

    /// Pure discovery core, driven by an explicit environment snapshot.
    #[allow(clippy::result_large_err)]
    pub fn discover_from(
        env: &ClusterEnv,
        override_url: Option<&str>,
    ) -> Result<Self, ClusterError> {
        let endpoint = override_url
            .map(str::to_string)
            .or_else(|| env.api_server.clone())
            .or_else(|| {
                let host = env.service_host.as_deref()?;
                let port = env.service_port.as_deref()?;
                Some(format!("https://{host}:{port}"))
            })
            .ok_or(ClusterError::NoEndpoint)?;

        let endpoint = Url::parse(&endpoint).map_err(|source| ClusterError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            source,
        })?;

        let token = match (&env.token, &env.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => Some(read_token_file(path)?),
            (None, None) => {
                // Best-effort in-cluster fallback; absence is not an error.
                std::fs::read_to_string(IN_CLUSTER_TOKEN_FILE)
                    .ok()
                    .map(|t| t.trim().to_string())
            }
        };

        Ok(Self { endpoint, token })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

#[allow(clippy::result_large_err)]
fn read_token_file(path: &str) -> Result<String, ClusterError> {
    std::fs::read_to_string(path)
        .map(|t| t.trim().to_string())
        .map_err(|source| ClusterError::TokenFile {
            path: path.to_string(),
            source,
        })
}

/// Snapshot of the discovery-relevant environment.
#[derive(Debug, Clone, Default)]
pub struct ClusterEnv {
    pub api_server: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<String>,
    pub service_host: Option<String>,
    pub service_port: Option<String>,
}

impl ClusterEnv {
    #[must_use]
    pub fn from_process() -> Self {
        Self {
            api_server: std::env::var(ENV_API_SERVER).ok(),
            token: std::env::var(ENV_API_TOKEN).ok(),
            token_file: std::env::var(ENV_API_TOKEN_FILE).ok(),
            service_host: std::env::var(ENV_SERVICE_HOST).ok(),
            service_port: std::env::var(ENV_SERVICE_PORT).ok(),
        }
    }
}
