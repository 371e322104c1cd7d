use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::detect::result::DetectionResult;

use super::backend::{DetectionCapability, DetectionInput, DetectorClient};

/// Shared handle to a registered client.
pub type SharedDetector = Arc<dyn DetectorClient>;

/// Thread-safe registry of detector clients.
pub struct DetectorRegistry {
    clients: HashMap<String, SharedDetector>,
    default_name: Option<String>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a client. The first registered client becomes the default.
    pub fn register<C: DetectorClient + 'static>(&mut self, client: C) {
        let name = client.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.clients.insert(name, Arc::new(client));
    }

    /// Set default client by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.clients.contains_key(name) {
            return Err(anyhow!("detector '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedDetector> {
        self.clients.get(name).cloned()
    }

    pub fn default_client(&self) -> Option<SharedDetector> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered client names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select a client that supports the requested capability.
    ///
    /// Prefers the default client when it supports the capability.
    pub fn client_for_capability(&self, capability: DetectionCapability) -> Result<SharedDetector> {
        if let Some(default_client) = self.default_client() {
            if default_client.supports(capability) {
                return Ok(default_client);
            }
        }

        for name in self.list() {
            let Some(client) = self.get(&name) else {
                continue;
            };
            if client.supports(capability) {
                return Ok(client);
            }
        }

        Err(anyhow!(
            "no registered detector supports capability {:?}",
            capability
        ))
    }

    /// Run detection with a client that supports the input's capability.
    pub fn detect(&self, input: &DetectionInput) -> Result<DetectionResult> {
        self.client_for_capability(input.capability())?.detect(input)
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::StubDetector;

    struct UrlOnly;

    impl DetectorClient for UrlOnly {
        fn name(&self) -> &'static str {
            "url-only"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            matches!(capability, DetectionCapability::RemoteUrl)
        }

        fn detect(&self, _input: &DetectionInput) -> Result<DetectionResult> {
            Ok(DetectionResult::success(Vec::new(), 1))
        }
    }

    #[test]
    fn first_registered_client_is_default() {
        let mut registry = DetectorRegistry::new();
        registry.register(UrlOnly);
        registry.register(StubDetector::new());
        let default = registry.default_client().expect("default");
        assert_eq!(default.name(), "url-only");
        assert_eq!(registry.list(), vec!["stub", "url-only"]);
    }

    #[test]
    fn falls_back_to_a_capable_client() {
        let mut registry = DetectorRegistry::new();
        registry.register(UrlOnly);
        registry.register(StubDetector::new());

        let client = registry
            .client_for_capability(DetectionCapability::LiveFrames)
            .expect("capable client");
        assert_eq!(client.name(), "stub");

        let client = registry
            .client_for_capability(DetectionCapability::RemoteUrl)
            .expect("default client");
        assert_eq!(client.name(), "url-only");
    }

    #[test]
    fn unknown_default_and_missing_capability_are_errors() {
        let mut registry = DetectorRegistry::new();
        assert!(registry.set_default("http").is_err());
        registry.register(UrlOnly);
        assert!(registry
            .detect(&DetectionInput::Encoded(vec![1, 2, 3]))
            .is_err());
    }
}
