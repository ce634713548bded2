//! Ground-motion models and the registry used to instantiate them.
//!
//! Logic trees refer to ground-motion models (GSIMs) by identifier. Turning
//! an identifier into a usable model goes through a [`GsimRegistry`], which
//! callers build and pass in explicitly.

use std::{collections::BTreeMap, fmt};

/// A ground-motion model.
///
/// The hazard math behind a model is out of scope here; the registry only
/// needs to construct instances and report which model they are.
pub trait GroundMotionModel: fmt::Debug + Send + Sync {
    /// The identifier the model is registered under.
    fn name(&self) -> &str;
}

/// A ground-motion model known only by its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedGsim {
    name: String,
}

impl NamedGsim {
    /// Creates a model with the given identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl GroundMotionModel for NamedGsim {
    fn name(&self) -> &str {
        &self.name
    }
}

type Factory = Box<dyn Fn() -> Box<dyn GroundMotionModel> + Send + Sync>;

/// Error returned when a ground-motion model identifier is not registered.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown ground-motion model '{0}'")]
pub struct UnknownGsim(pub String);

/// Maps ground-motion model identifiers to factories.
#[derive(Default)]
pub struct GsimRegistry {
    factories: BTreeMap<String, Factory>,
}

impl GsimRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that builds a [`NamedGsim`] for each identifier.
    #[must_use]
    pub fn with_named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for name in names {
            let name = name.into();
            let model = name.clone();
            registry.register(name, move || Box::new(NamedGsim::new(model.clone())));
        }
        registry
    }

    /// Registers a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn GroundMotionModel> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Whether a factory is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The registered identifiers, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.factories.keys().map(String::as_str)
    }

    /// Builds a new instance of the model registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownGsim`] if no factory is registered under `name`.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn GroundMotionModel>, UnknownGsim> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| UnknownGsim(name.to_string()))
    }
}

impl fmt::Debug for GsimRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GsimRegistry")
            .field("gsims", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Scaled;

    impl GroundMotionModel for Scaled {
        fn name(&self) -> &str {
            "Scaled"
        }
    }

    #[test]
    fn instantiates_registered_models() {
        let registry = GsimRegistry::with_named(["BooreAtkinson2008", "ToroEtAl2002"]);
        let gsim = registry.instantiate("ToroEtAl2002").unwrap();
        assert_eq!(gsim.name(), "ToroEtAl2002");
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["BooreAtkinson2008", "ToroEtAl2002"]
        );
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = GsimRegistry::new();
        assert_eq!(
            registry.instantiate("Nope").unwrap_err(),
            UnknownGsim("Nope".to_string())
        );
    }

    #[test]
    fn custom_factories_are_called_each_time() {
        let mut registry = GsimRegistry::new();
        registry.register("Scaled", || Box::new(Scaled));
        assert!(registry.contains("Scaled"));
        let a = registry.instantiate("Scaled").unwrap();
        let b = registry.instantiate("Scaled").unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
        assert!(format!("{registry:?}").contains("Scaled"));
    }
}
