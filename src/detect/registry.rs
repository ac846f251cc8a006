use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::detect::result::Detection;
use crate::frame::Frame;

use super::backend::{DetectionCapability, DetectorBackend};

/// Registry of detector backends.
///
/// The pipeline is single-threaded, so backends are owned directly and
/// borrowed mutably for each `detect` call.
pub struct BackendRegistry {
    backends: HashMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        self.register_boxed(Box::new(backend));
    }

    pub fn register_boxed(&mut self, backend: Box<dyn DetectorBackend>) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, backend);
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Name of a backend that supports the requested capability.
    ///
    /// Prefers the default backend; otherwise the first supporting backend in
    /// name order, so selection is deterministic.
    pub fn backend_for_capability(&self, capability: DetectionCapability) -> Result<String> {
        if let Some(name) = &self.default_name {
            if self
                .backends
                .get(name)
                .is_some_and(|backend| backend.supports(capability))
            {
                return Ok(name.clone());
            }
        }

        self.list()
            .into_iter()
            .find(|name| self.backends[name].supports(capability))
            .ok_or_else(|| {
                anyhow!(
                    "no registered backend supports capability {:?}",
                    capability
                )
            })
    }

    /// Fail unless every capability has a backend. Used before the first frame.
    pub fn require(&self, capabilities: &[DetectionCapability]) -> Result<()> {
        for capability in capabilities {
            self.backend_for_capability(*capability)?;
        }
        Ok(())
    }

    /// Warm up every registered backend.
    pub fn warm_up(&mut self) -> Result<()> {
        for backend in self.backends.values_mut() {
            backend.warm_up()?;
        }
        Ok(())
    }

    /// Run detection using a backend that supports the requested capability.
    pub fn detect_with_capability(
        &mut self,
        capability: DetectionCapability,
        frame: &Frame,
    ) -> Result<Vec<Detection>> {
        let name = self.backend_for_capability(capability)?;
        let backend = self
            .backends
            .get_mut(&name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        backend.detect(frame, capability)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, ObjectClass};

    struct FixedBackend {
        name: &'static str,
        capability: DetectionCapability,
        class: ObjectClass,
    }

    impl DetectorBackend for FixedBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            capability == self.capability
        }

        fn detect(
            &mut self,
            _frame: &Frame,
            _capability: DetectionCapability,
        ) -> Result<Vec<Detection>> {
            Ok(vec![Detection::new(
                self.class,
                BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            )])
        }
    }

    #[test]
    fn registry_routes_by_capability() {
        let mut registry = BackendRegistry::new();
        registry.register(FixedBackend {
            name: "players",
            capability: DetectionCapability::Players,
            class: ObjectClass::Player,
        });
        registry.register(FixedBackend {
            name: "ball",
            capability: DetectionCapability::Ball,
            class: ObjectClass::Ball,
        });

        assert_eq!(registry.default_name(), Some("players"));
        let frame = Frame::blank(0, 2, 2);
        let balls = registry
            .detect_with_capability(DetectionCapability::Ball, &frame)
            .unwrap();
        assert_eq!(balls[0].class, ObjectClass::Ball);
        assert!(registry
            .require(&[DetectionCapability::PitchKeypoints])
            .is_err());
        assert!(registry.set_default("missing").is_err());
    }
}
