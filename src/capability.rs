//! The set of named commands made callable from guest code.

use crate::command::CommandFactory;

/// Builds a fresh factory for one capability.
pub type Constructor = fn() -> Box<dyn CommandFactory>;

/// An ordered list of command factories to load into an [`Interpreter`].
///
/// The set itself holds no state: every interpreter gets its own factory
/// instances when the set is loaded.
///
/// [`Interpreter`]: crate::Interpreter
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    constructors: Vec<Constructor>,
}

impl CapabilitySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard builtins: `echo`, `cat`, `wc`, `grep`, `head`, `tail`,
    /// `true`, `false`, `exit` and `env`.
    pub fn standard() -> Self {
        crate::builtin::standard()
    }

    /// Add a capability.
    pub fn with(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Number of capabilities in the set.
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// True if the set has no capabilities.
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Fresh factory instances, in insertion order.
    pub(crate) fn instantiate(&self) -> impl Iterator<Item = Box<dyn CommandFactory>> + '_ {
        self.constructors.iter().map(|make| make())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_names() {
        let names: Vec<String> = CapabilitySet::standard()
            .instantiate()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["echo", "cat", "wc", "grep", "head", "tail", "true", "false", "exit", "env"]
        );
    }

    #[test]
    fn test_empty_set() {
        let set = CapabilitySet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.instantiate().count(), 0);
    }
}
