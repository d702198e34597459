//! The external component-name → constructor contract.
//!
//! Generalized from `streamlib-core::registry::{DescriptorProvider,
//! ProcessorFactory, ProcessorRegistry}`: a name resolves to a factory
//! closure producing a boxed instance. Component discovery by name is
//! explicitly out of scope for this crate, so this stays a
//! trait plus one minimal in-memory implementation a host program
//! populates directly — `streamlib-core`'s `inventory`-based compile-time
//! auto-registration is not carried over, since that exists to support
//! dynamically-loaded processors, which is exactly the concern this crate
//! treats as external.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::Component;
use crate::error::ComponentResolutionError;

/// Produces a fresh boxed component for a process named `process_name`.
pub type ComponentConstructor = Arc<dyn Fn(&str) -> Box<dyn Component> + Send + Sync>;

pub trait ComponentRegistry: Send + Sync {
    fn resolve(&self, full_name: &str) -> Result<ComponentConstructor, ComponentResolutionError>;
}

/// A flat `full_name -> constructor` map. Since it performs no actual
/// module loading, it cannot distinguish "module not found" from "class
/// not found" the way a registry backed by real dynamic loading could —
/// only `MalformedName` (no `.` separator) and `ClassNotFound` (lookup
/// miss) are produced here. `ComponentResolutionError::ModuleNotFound`
/// remains part of the taxonomy for registries that do load modules.
#[derive(Default)]
pub struct StaticComponentRegistry {
    constructors: HashMap<String, ComponentConstructor>,
}

impl StaticComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, full_name: impl Into<String>, constructor: ComponentConstructor) {
        self.constructors.insert(full_name.into(), constructor);
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.constructors.contains_key(full_name)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl ComponentRegistry for StaticComponentRegistry {
    fn resolve(&self, full_name: &str) -> Result<ComponentConstructor, ComponentResolutionError> {
        if !full_name.contains('.') {
            return Err(ComponentResolutionError::MalformedName(full_name.to_string()));
        }
        self.constructors
            .get(full_name)
            .cloned()
            .ok_or_else(|| ComponentResolutionError::ClassNotFound(full_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port_marker::PortMarker;

    struct Noop;
    impl Component for Noop {
        fn port_spec(&self) -> Vec<PortMarker> {
            Vec::new()
        }
    }

    #[test]
    fn malformed_name_without_separator_is_rejected() {
        let registry = StaticComponentRegistry::new();
        let err = registry.resolve("NoSeparator").unwrap_err();
        assert!(matches!(err, ComponentResolutionError::MalformedName(_)));
    }

    #[test]
    fn unregistered_well_formed_name_is_class_not_found() {
        let registry = StaticComponentRegistry::new();
        let err = registry.resolve("pkg.Missing").unwrap_err();
        assert!(matches!(err, ComponentResolutionError::ClassNotFound(_)));
    }

    #[test]
    fn registered_name_resolves_to_a_working_constructor() {
        let mut registry = StaticComponentRegistry::new();
        registry.register("pkg.Noop", Arc::new(|_name: &str| Box::new(Noop) as Box<dyn Component>));
        assert!(registry.contains("pkg.Noop"));
        let ctor = registry.resolve("pkg.Noop").unwrap();
        let _instance = ctor("whatever");
    }
}
