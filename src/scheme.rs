//! Type registry for the runtime manager.

use std::collections::HashMap;

use crate::cluster::ResourceClass;
use crate::error::SchemeError;

/// The set of resource classes the runtime manager knows how to read and
/// write. Registration happens once, during startup, before any subsystem
/// runs.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    classes: HashMap<(&'static str, &'static str), ResourceClass>,
}

impl Scheme {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource class. Registering the same group/kind twice is
    /// an error.
    #[allow(clippy::result_large_err)]
    pub fn register(&mut self, class: ResourceClass) -> Result<(), SchemeError> {
        let key = (class.group, class.kind);
        if self.classes.contains_key(&key) {
            return Err(SchemeError::Duplicate {
                group: class.group,
                kind: class.kind,
            });
        }
        self.classes.insert(key, class);
        Ok(())
    }

    /// Look up a registered class by kind name (any group).
    #[must_use]
    pub fn class_for_kind(&self, kind: &str) -> Option<&ResourceClass> {
        self.classes.values().find(|c| c.kind == kind)
    }

    #[must_use]
    pub fn recognizes(&self, class: &ResourceClass) -> bool {
        self.classes.contains_key(&(class.group, class.kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(kind: &'static str, plural: &'static str) -> ResourceClass {
        ResourceClass {
            group: "policy.warden.dev",
            version: "v1",
            kind,
            plural,
        }
    }

    #[test]
    fn registers_and_resolves_kinds() {
        let mut scheme = Scheme::new();
        scheme.register(class("PolicyTemplate", "policytemplates")).unwrap();

        assert!(scheme.recognizes(&class("PolicyTemplate", "policytemplates")));
        assert_eq!(
            scheme.class_for_kind("PolicyTemplate").map(|c| c.plural),
            Some("policytemplates")
        );
        assert!(scheme.class_for_kind("SyncSet").is_none());
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut scheme = Scheme::new();
        scheme.register(class("SyncSet", "syncsets")).unwrap();
        let err = scheme.register(class("SyncSet", "syncsets")).unwrap_err();
        assert!(matches!(err, SchemeError::Duplicate { kind: "SyncSet", .. }));
    }
}
