//! Policy evaluation backend and client.
//!
//! The backend compiles policy templates into deny rules evaluated over
//! arbitrary JSON objects. The client is a cheap clonable handle bound to a
//! single validation target; the webhook reviews admission requests through
//! it and the audit subsystem replays stored resources through the same
//! rules.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::PolicyError;

/// Evaluation driver options.
#[derive(Debug, Clone)]
pub struct Driver {
    name: &'static str,
    tracing: bool,
}

impl Driver {
    /// The in-process evaluation driver.
    #[must_use]
    pub fn local() -> Self {
        Self {
            name: "local",
            tracing: false,
        }
    }

    /// Enable per-evaluation tracing (expensive; diagnostics only).
    #[must_use]
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing = enabled;
        self
    }
}

/// The policy evaluation engine.
pub struct Backend {
    driver: Driver,
}

impl Backend {
    /// Construct the engine for the given driver.
    #[allow(clippy::result_large_err)]
    pub fn new(driver: Driver) -> Result<Self, PolicyError> {
        if driver.name.is_empty() {
            return Err(PolicyError::Driver("driver name is empty".into()));
        }
        Ok(Self { driver })
    }

    /// Construct a client bound to one validation target.
    #[allow(clippy::result_large_err)]
    pub fn client(&self, target: ClusterValidationTarget) -> Result<PolicyClient, PolicyError> {
        if target.name.trim().is_empty() {
            return Err(PolicyError::Target {
                target: target.name,
                reason: "target name is empty".into(),
            });
        }
        if !target.name.contains('.') {
            return Err(PolicyError::Target {
                target: target.name,
                reason: "target name must be domain-qualified".into(),
            });
        }
        debug!(target = %target.name, driver = self.driver.name, "Policy client constructed");
        Ok(PolicyClient {
            inner: Arc::new(ClientInner {
                target: target.name,
                trace: self.driver.tracing,
                templates: RwLock::new(HashMap::new()),
                connected: true,
            }),
        })
    }
}

/// The validation target admission reviews are evaluated against.
#[derive(Debug, Clone)]
pub struct ClusterValidationTarget {
    pub name: String,
}

impl Default for ClusterValidationTarget {
    fn default() -> Self {
        Self {
            name: "admission.warden.dev".into(),
        }
    }
}

#[derive(Debug)]
struct ClientInner {
    target: String,
    trace: bool,
    templates: RwLock<HashMap<String, CompiledTemplate>>,
    connected: bool,
}

/// Handle bound to one validation target. Clones share the compiled
/// template set.
#[derive(Clone, Debug)]
pub struct PolicyClient {
    inner: Arc<ClientInner>,
}

impl PolicyClient {
    /// An inert client used when backend client construction failed but
    /// startup continues. It admits everything and accepts no templates.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            inner: Arc::new(ClientInner {
                target: String::new(),
                trace: false,
                templates: RwLock::new(HashMap::new()),
                connected: false,
            }),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// Compile a template spec and install it under `name`, replacing any
    /// previous version.
    #[allow(clippy::result_large_err)]
    pub fn upsert_template(&self, name: &str, spec: &Value) -> Result<(), PolicyError> {
        if !self.inner.connected {
            return Err(PolicyError::Driver(
                "policy client is not connected to a backend".into(),
            ));
        }
        let compiled = CompiledTemplate::compile(name, spec)?;
        self.inner
            .templates
            .write()
            .insert(name.to_string(), compiled);
        Ok(())
    }

    /// Remove a template. Returns whether it was present.
    pub fn remove_template(&self, name: &str) -> bool {
        self.inner.templates.write().remove(name).is_some()
    }

    #[must_use]
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.templates.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Kinds matched by at least one installed template.
    #[must_use]
    pub fn matched_kinds(&self) -> Vec<String> {
        let templates = self.inner.templates.read();
        let mut kinds: Vec<String> = templates
            .values()
            .flat_map(|t| t.match_kinds.iter().cloned())
            .filter(|k| k != "*")
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    /// Evaluate an object of the given kind against every matching
    /// template.
    #[must_use]
    pub fn review(&self, kind: &str, object: &Value) -> ReviewOutcome {
        let templates = self.inner.templates.read();
        let mut denials = Vec::new();

        for template in templates.values() {
            if !template.matches(kind) {
                continue;
            }
            for rule in &template.rules {
                if let Some(message) = rule.violated_by(object) {
                    if self.inner.trace {
                        debug!(template = %template.name, kind, %message, "Rule denied object");
                    }
                    denials.push(Denial {
                        template: template.name.clone(),
                        message,
                    });
                }
            }
        }

        ReviewOutcome {
            allowed: denials.is_empty(),
            denials,
        }
    }
}

/// Result of reviewing one object.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub allowed: bool,
    pub denials: Vec<Denial>,
}

/// One template's reason for denying an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub template: String,
    pub message: String,
}

/// Wire shape of a template spec.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateSpec {
    match_kinds: Vec<String>,
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleSpec {
    path: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    forbidden_value: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug)]
struct CompiledTemplate {
    name: String,
    match_kinds: Vec<String>,
    rules: Vec<Rule>,
}

impl CompiledTemplate {
    #[allow(clippy::result_large_err)]
    fn compile(name: &str, spec: &Value) -> Result<Self, PolicyError> {
        let spec: TemplateSpec =
            serde_json::from_value(spec.clone()).map_err(|e| PolicyError::Compile {
                template: name.to_string(),
                reason: e.to_string(),
            })?;

        if spec.match_kinds.is_empty() {
            return Err(PolicyError::Compile {
                template: name.to_string(),
                reason: "matchKinds is empty".into(),
            });
        }

        let mut rules = Vec::with_capacity(spec.rules.len());
        for rule in spec.rules {
            let check = match (rule.required, rule.forbidden_value) {
                (true, None) => Check::Required,
                (false, Some(value)) => Check::Forbidden(value),
                (true, Some(_)) => {
                    return Err(PolicyError::Compile {
                        template: name.to_string(),
                        reason: format!(
                            "rule for '{}' sets both required and forbiddenValue",
                            rule.path
                        ),
                    })
                }
                (false, None) => {
                    return Err(PolicyError::Compile {
                        template: name.to_string(),
                        reason: format!(
                            "rule for '{}' must set required or forbiddenValue",
                            rule.path
                        ),
                    })
                }
            };
            rules.push(Rule {
                path: rule.path,
                check,
                message: rule.message,
            });
        }

        Ok(Self {
            name: name.to_string(),
            match_kinds: spec.match_kinds,
            rules,
        })
    }

    fn matches(&self, kind: &str) -> bool {
        self.match_kinds.iter().any(|k| k == kind || k == "*")
    }
}

#[derive(Debug)]
enum Check {
    Required,
    Forbidden(Value),
}

#[derive(Debug)]
struct Rule {
    path: String,
    check: Check,
    message: Option<String>,
}

impl Rule {
    /// The denial message when the object violates this rule.
    fn violated_by(&self, object: &Value) -> Option<String> {
        let found = lookup(object, &self.path);
        match &self.check {
            Check::Required if found.is_none() => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| format!("field '{}' is required", self.path)),
            ),
            Check::Forbidden(forbidden) if found == Some(forbidden) => Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| format!("field '{}' has a forbidden value", self.path)),
            ),
            _ => None,
        }
    }
}

/// Walk a dotted path through nested JSON objects.
fn lookup<'a>(object: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = object;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}
