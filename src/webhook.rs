//! Admission webhook subsystem.
//!
//! Serves admission reviews over HTTP and answers them from the policy
//! client. The server shares the manager's shutdown signal, so it drains
//! open connections when the run loop stops.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::WebhookConfig;
use crate::error::{ConfigError, Result};
use crate::manager::{Manager, Subsystem};
use crate::policy::PolicyClient;

/// Register the admission webhook into the manager.
#[allow(clippy::result_large_err)]
pub fn register_into(
    manager: &mut Manager,
    policy: PolicyClient,
    config: &WebhookConfig,
) -> Result<()> {
    let addr: SocketAddr =
        config
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "webhook.bind_address",
                reason: format!("'{}' is not a socket address", config.bind_address),
            })?;

    manager.add_subsystem(Box::new(WebhookSubsystem { addr, policy }));
    Ok(())
}

/// An admission review, as posted by the platform and answered by us.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone)]
struct WebhookState {
    policy: PolicyClient,
}

struct WebhookSubsystem {
    addr: SocketAddr,
    policy: PolicyClient,
}

#[async_trait]
impl Subsystem for WebhookSubsystem {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn run(self: Box<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let state = WebhookState {
            policy: self.policy,
        };
        let app = Router::new()
            .route("/admit", post(admit))
            .route("/healthz", get(healthz))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(address = %listener.local_addr()?, "Admission webhook listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await?;

        info!("Admission webhook stopped");
        Ok(())
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn admit(
    State(state): State<WebhookState>,
    Json(review): Json<AdmissionReview>,
) -> Json<AdmissionReview> {
    let Some(request) = review.request else {
        return Json(AdmissionReview {
            request: None,
            response: Some(AdmissionResponse {
                uid: String::new(),
                allowed: false,
                message: Some("admission review carries no request".into()),
            }),
        });
    };

    let outcome = state.policy.review(&request.kind, &request.object);
    let message = if outcome.allowed {
        debug!(kind = %request.kind, name = %request.name, "Admission allowed");
        None
    } else {
        let message = outcome
            .denials
            .iter()
            .map(|d| format!("[{}] {}", d.template, d.message))
            .collect::<Vec<_>>()
            .join("; ");
        info!(kind = %request.kind, name = %request.name, denials = outcome.denials.len(), "Admission denied");
        Some(message)
    };

    Json(AdmissionReview {
        request: None,
        response: Some(AdmissionResponse {
            uid: request.uid,
            allowed: outcome.allowed,
            message,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Backend, ClusterValidationTarget, Driver};
    use serde_json::json;

    fn state_with_template() -> WebhookState {
        let policy = Backend::new(Driver::local())
            .unwrap()
            .client(ClusterValidationTarget::default())
            .unwrap();
        policy
            .upsert_template(
                "require-owner",
                &json!({
                    "matchKinds": ["SyncSet"],
                    "rules": [{ "path": "metadata.labels.owner", "required": true }]
                }),
            )
            .unwrap();
        WebhookState { policy }
    }

    fn review_for(kind: &str, object: serde_json::Value) -> AdmissionReview {
        AdmissionReview {
            request: Some(AdmissionRequest {
                uid: "uid-1".into(),
                kind: kind.into(),
                name: "thing".into(),
                object,
            }),
            response: None,
        }
    }

    #[tokio::test]
    async fn denies_object_violating_a_template() {
        let review = review_for("SyncSet", json!({ "metadata": { "labels": {} } }));
        let Json(answer) = admit(State(state_with_template()), Json(review)).await;

        let response = answer.response.unwrap();
        assert_eq!(response.uid, "uid-1");
        assert!(!response.allowed);
        assert!(response.message.unwrap().contains("require-owner"));
    }

    #[tokio::test]
    async fn allows_conforming_object() {
        let review = review_for(
            "SyncSet",
            json!({ "metadata": { "labels": { "owner": "platform" } } }),
        );
        let Json(answer) = admit(State(state_with_template()), Json(review)).await;

        let response = answer.response.unwrap();
        assert!(response.allowed);
        assert!(response.message.is_none());
    }

    #[tokio::test]
    async fn rejects_review_without_request() {
        let review = AdmissionReview {
            request: None,
            response: None,
        };
        let Json(answer) = admit(State(state_with_template()), Json(review)).await;
        assert!(!answer.response.unwrap().allowed);
    }

    #[test]
    fn registration_rejects_malformed_bind_address() {
        let config = crate::cluster::ClusterConfig::from_endpoint("http://127.0.0.1:1").unwrap();
        let mut manager =
            Manager::new(config, crate::manager::ManagerOptions::default()).unwrap();
        let policy = PolicyClient::disconnected();

        let result = register_into(
            &mut manager,
            policy,
            &WebhookConfig {
                bind_address: "nonsense".into(),
            },
        );
        assert!(result.is_err());
    }
}
