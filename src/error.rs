use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Errors talking to (or discovering) the managed cluster API.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("no cluster endpoint configured: set WARDEN_API_SERVER or [cluster] api_url")]
    NoEndpoint,

    #[error("invalid cluster endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read token file '{path}': {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build cluster client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("cluster request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("cluster API returned {status} for {path}")]
    Api {
        status: reqwest::StatusCode,
        path: String,
    },
}

/// Type registry errors.
#[derive(Error, Debug)]
pub enum SchemeError {
    #[error("type {group}/{kind} is already registered")]
    Duplicate {
        group: &'static str,
        kind: &'static str,
    },
}

/// Policy backend and client errors.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("driver misconfigured: {0}")]
    Driver(String),

    #[error("invalid validation target '{target}': {reason}")]
    Target { target: String, reason: String },

    #[error("failed to compile template '{template}': {reason}")]
    Compile { template: String, reason: String },
}

/// A fatal startup failure, tagged with the phase that produced it.
///
/// Any of these terminates the process before the run loop is entered;
/// finalizer cleanup is deliberately skipped in that case.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("unable to discover cluster connection: {0}")]
    Discovery(#[source] ClusterError),

    #[error("unable to construct runtime manager: {0}")]
    Manager(#[source] ClusterError),

    #[error("unable to register API types: {0}")]
    Scheme(#[source] SchemeError),

    #[error("unable to construct policy backend: {0}")]
    Backend(#[source] PolicyError),

    #[error("unable to register {subsystem} subsystem: {source}")]
    Registration {
        subsystem: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl SetupError {
    /// Name of the startup phase that failed, for log context.
    pub fn phase(&self) -> &'static str {
        match self {
            SetupError::Discovery(_) => "discovery",
            SetupError::Manager(_) => "manager",
            SetupError::Scheme(_) => "scheme",
            SetupError::Backend(_) => "policy-backend",
            SetupError::Registration { subsystem, .. } => subsystem,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subsystem {name} failed: {message}")]
    Subsystem { name: &'static str, message: String },

    #[error("lifecycle invariant violated: {0}")]
    Lifecycle(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_error_reports_failing_phase() {
        let err = SetupError::Scheme(SchemeError::Duplicate {
            group: "policy.warden.dev",
            kind: "PolicyTemplate",
        });
        assert_eq!(err.phase(), "scheme");

        let err = SetupError::Registration {
            subsystem: "webhook",
            source: Box::new(Error::Lifecycle("x")),
        };
        assert_eq!(err.phase(), "webhook");
    }

    #[test]
    fn cluster_error_messages_name_the_endpoint() {
        let err = ClusterError::InvalidEndpoint {
            endpoint: "not a url".into(),
            source: url::ParseError::RelativeUrlWithoutBase,
        };
        assert!(err.to_string().contains("not a url"));
    }
}
