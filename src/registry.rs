use std::collections::HashMap;

use crate::error::{Result, WorkflowError};
use crate::target::{IntoTarget, Target};

/// Named targets that declarative flows refer to.
#[derive(Clone, Debug, Default)]
pub struct TargetRegistry {
    targets: HashMap<String, Target>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Registers `target` under `name`, replacing any previous entry.
    pub fn register<M>(&mut self, name: impl Into<String>, target: impl IntoTarget<M>) -> &mut Self {
        let name = name.into();
        let target = target.into_target().named(&name);
        self.targets.insert(name, target);
        self
    }

    pub fn get(&self, name: &str) -> Result<Target> {
        self.targets
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnsupportedTarget(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_target_keeps_name() {
        let mut registry = TargetRegistry::new();
        registry.register("double", |value: i64| value * 2);
        let target = registry.get("double").unwrap();
        assert_eq!(target.name(), "double");
        assert!(registry.contains("double"));
        assert_eq!(registry.names(), vec!["double".to_string()]);
    }

    #[test]
    fn test_missing_target_is_unsupported() {
        let registry = TargetRegistry::new();
        assert!(matches!(
            registry.get("missing"),
            Err(WorkflowError::UnsupportedTarget(name)) if name == "missing"
        ));
    }
}
