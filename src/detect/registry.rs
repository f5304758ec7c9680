use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::Detector;

/// Registry of named detector backends.
///
/// The binary registers every backend compiled in and hands the selected one to
/// the detection loop by value.
pub struct DetectorRegistry {
    backends: HashMap<String, Box<dyn Detector>>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<D: Detector + 'static>(&mut self, backend: D) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("detector '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return a backend by name.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn Detector>> {
        let backend = self
            .backends
            .remove(name)
            .ok_or_else(|| anyhow!("detector '{}' not registered", name))?;
        if self.default_name.as_deref() == Some(name) {
            self.default_name = None;
        }
        Ok(backend)
    }

    /// Remove and return the default backend.
    pub fn take_default(&mut self) -> Result<Box<dyn Detector>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no default detector registered"))?;
        self.take(&name)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
