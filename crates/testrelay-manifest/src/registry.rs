//! Framework registry and driver resolution
//!
//! Frameworks report how confident they are that they own each loaded
//! binary. Resolution prefers a framework confident about every binary and,
//! in approximate mode, falls back to the best partial match.

use std::collections::HashMap;
use std::sync::Arc;

use testrelay_core::engine::{
    AssemblyInfo, EngineLogger, FallbackMode, FrameworkHandle, FrameworkSelector, LogSeverity,
    TestDriver, TestFrameworkManager,
};
use testrelay_core::{EngineError, EngineResult};
use tracing::{debug, instrument};

use crate::driver::ManifestDriver;
use crate::manifest::Manifest;

/// Id of the built-in manifest framework
pub const MANIFEST_FRAMEWORK_ID: &str = "testrelay.manifest";

/// Detection result for one binary
#[derive(Debug, Clone, Copy)]
pub enum Detection {
    /// Framework definitely not present
    No,
    /// Framework might be present with confidence 0-100
    Maybe(u8),
    /// Framework definitely present with confidence 0-100
    Yes(u8),
}

impl Detection {
    /// Create a confident detection (80-100)
    pub fn confident(confidence: u8) -> Self {
        Self::Yes(confidence.min(100))
    }

    /// Create a possible detection
    pub fn possible(confidence: u8) -> Self {
        Self::Maybe(confidence.min(100))
    }

    /// Get the confidence score (0-100)
    pub fn confidence(&self) -> u8 {
        match self {
            Self::No => 0,
            Self::Maybe(c) | Self::Yes(c) => *c,
        }
    }

    /// Check if detected (Maybe or Yes)
    pub fn detected(&self) -> bool {
        !matches!(self, Self::No)
    }

    /// Check if confident (Yes with high confidence)
    pub fn is_confident(&self) -> bool {
        matches!(self, Self::Yes(c) if *c >= 80)
    }
}

impl PartialEq for Detection {
    fn eq(&self, other: &Self) -> bool {
        self.confidence() == other.confidence()
    }
}

impl Eq for Detection {}

impl PartialOrd for Detection {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Detection {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.confidence().cmp(&other.confidence())
    }
}

/// A framework able to explore manifests
#[derive(Debug, Clone)]
pub struct ManifestFramework {
    handle: FrameworkHandle,
    /// Claims manifests that carry no framework hint
    default: bool,
}

impl ManifestFramework {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: FrameworkHandle::new(id, name),
            default: false,
        }
    }

    /// The built-in framework, which also claims unhinted manifests
    pub fn builtin() -> Self {
        Self {
            handle: FrameworkHandle::new(MANIFEST_FRAMEWORK_ID, "testrelay manifest"),
            default: true,
        }
    }

    pub fn handle(&self) -> &FrameworkHandle {
        &self.handle
    }

    /// How sure this framework is that it owns `assembly`
    pub fn detect(&self, assembly: &AssemblyInfo) -> Detection {
        let Some(manifest) = assembly.payload::<Manifest>() else {
            return Detection::No;
        };
        match manifest.framework.as_deref() {
            Some(hint) if hint == self.handle.id => Detection::confident(100),
            None if self.default => Detection::confident(80),
            _ if self.default => Detection::possible(30),
            _ => Detection::No,
        }
    }
}

/// Candidate framework with its weakest detection across all binaries
#[derive(Debug)]
struct Candidate<'a> {
    framework: &'a ManifestFramework,
    weakest: Detection,
    exact: bool,
}

/// Registry of manifest frameworks
#[derive(Debug, Default)]
pub struct FrameworkRegistry {
    frameworks: HashMap<String, Arc<ManifestFramework>>,
    /// Registration order, used to break ties
    order: Vec<String>,
}

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the built-in framework
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ManifestFramework::builtin());
        registry
    }

    pub fn register(&mut self, framework: ManifestFramework) {
        let id = framework.handle.id.clone();
        debug!(framework_id = %id, "registering framework");
        if !self.frameworks.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.frameworks.insert(id, Arc::new(framework));
    }

    pub fn get(&self, id: &str) -> Option<Arc<ManifestFramework>> {
        self.frameworks.get(id).cloned()
    }

    pub fn framework_ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    fn candidates(&self, selector: &FrameworkSelector, assemblies: &[AssemblyInfo]) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate<'_>> = self
            .order
            .iter()
            .filter_map(|id| self.frameworks.get(id))
            .filter(|framework| selector.accepts(&framework.handle))
            .filter_map(|framework| {
                let detections: Vec<Detection> =
                    assemblies.iter().map(|a| framework.detect(a)).collect();
                if !detections.iter().all(Detection::detected) {
                    return None;
                }
                let weakest = detections.iter().copied().min().unwrap_or(Detection::No);
                Some(Candidate {
                    framework: framework.as_ref(),
                    weakest,
                    exact: detections.iter().all(Detection::is_confident),
                })
            })
            .collect();

        // Stable sort keeps registration order among equals
        candidates.sort_by(|a, b| b.weakest.cmp(&a.weakest));
        candidates
    }
}

impl TestFrameworkManager for FrameworkRegistry {
    fn frameworks(&self) -> Vec<FrameworkHandle> {
        self.order
            .iter()
            .filter_map(|id| self.frameworks.get(id))
            .map(|f| f.handle.clone())
            .collect()
    }

    #[instrument(skip_all, fields(assemblies = assemblies.len(), mode = ?selector.fallback_mode))]
    fn get_test_driver(
        &self,
        selector: &FrameworkSelector,
        assemblies: &[AssemblyInfo],
        logger: &dyn EngineLogger,
    ) -> EngineResult<Arc<dyn TestDriver>> {
        let candidates = self.candidates(selector, assemblies);

        if let Some(exact) = candidates.iter().find(|c| c.exact) {
            debug!(framework_id = %exact.framework.handle.id, "exact framework match");
            return Ok(Arc::new(ManifestDriver::new(exact.framework.handle.clone())));
        }

        match (selector.fallback_mode, candidates.first()) {
            (FallbackMode::Approximate, Some(best)) => {
                logger.log(
                    LogSeverity::Warning,
                    &format!(
                        "No framework matched exactly; using '{}' (confidence {})",
                        best.framework.handle.name,
                        best.weakest.confidence()
                    ),
                    None,
                );
                Ok(Arc::new(ManifestDriver::new(best.framework.handle.clone())))
            }
            _ => Err(EngineError::driver_not_found(format!(
                "no {} framework for {} (registered: {})",
                match selector.fallback_mode {
                    FallbackMode::Strict => "exactly matching",
                    FallbackMode::Approximate => "matching",
                },
                assemblies
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.framework_ids().join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Captured(Mutex<Vec<(LogSeverity, String)>>);

    impl EngineLogger for Captured {
        fn log(&self, severity: LogSeverity, message: &str, _details: Option<&str>) {
            self.0.lock().unwrap().push((severity, message.to_string()));
        }
    }

    fn assembly(framework: Option<&str>) -> AssemblyInfo {
        AssemblyInfo::new("calc", "calc.toml").with_payload(Manifest {
            name: "calc".to_string(),
            framework: framework.map(String::from),
            tests: Vec::new(),
        })
    }

    fn registry() -> FrameworkRegistry {
        let mut registry = FrameworkRegistry::with_builtins();
        registry.register(ManifestFramework::new("NUnitAdapter.TestFramework", "NUnit"));
        registry
    }

    fn resolve(
        registry: &FrameworkRegistry,
        selector: FrameworkSelector,
        assemblies: &[AssemblyInfo],
    ) -> EngineResult<String> {
        registry
            .get_test_driver(&selector, assemblies, &Captured::default())
            .map(|driver| driver.framework().id.clone())
    }

    #[test]
    fn test_detection_ordering() {
        assert!(Detection::Yes(90) > Detection::Maybe(40));
        assert!(Detection::Maybe(40) > Detection::No);
        assert!(Detection::confident(100).is_confident());
        assert!(!Detection::possible(90).is_confident());
        assert_eq!(Detection::confident(200).confidence(), 100);
    }

    #[test]
    fn test_unhinted_manifest_goes_to_builtin() {
        let id = resolve(
            &registry(),
            FrameworkSelector::any(FallbackMode::Strict),
            &[assembly(None)],
        )
        .unwrap();
        assert_eq!(id, MANIFEST_FRAMEWORK_ID);
    }

    #[test]
    fn test_hint_selects_framework() {
        let id = resolve(
            &registry(),
            FrameworkSelector::any(FallbackMode::Strict),
            &[assembly(Some("NUnitAdapter.TestFramework"))],
        )
        .unwrap();
        assert_eq!(id, "NUnitAdapter.TestFramework");
    }

    #[test]
    fn test_excluded_hint_falls_back_when_approximate() {
        let selector = FrameworkSelector::new(
            |f| f.id != "NUnitAdapter.TestFramework",
            FallbackMode::Approximate,
        );
        let logger = Captured::default();
        let driver = registry()
            .get_test_driver(&selector, &[assembly(Some("NUnitAdapter.TestFramework"))], &logger)
            .unwrap();

        assert_eq!(driver.framework().id, MANIFEST_FRAMEWORK_ID);
        assert_eq!(logger.0.lock().unwrap()[0].0, LogSeverity::Warning);
    }

    #[test]
    fn test_excluded_hint_fails_when_strict() {
        let selector = FrameworkSelector::new(
            |f| f.id != "NUnitAdapter.TestFramework",
            FallbackMode::Strict,
        );
        let err = resolve(
            &registry(),
            selector,
            &[assembly(Some("NUnitAdapter.TestFramework"))],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::DriverNotFound { .. }));
    }

    #[test]
    fn test_payloadless_assembly_not_detected() {
        let err = resolve(
            &registry(),
            FrameworkSelector::any(FallbackMode::Approximate),
            &[AssemblyInfo::new("calc", "calc.dll")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("testrelay.manifest"));
    }

    #[test]
    fn test_frameworks_in_registration_order() {
        let ids: Vec<String> = registry().frameworks().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![MANIFEST_FRAMEWORK_ID, "NUnitAdapter.TestFramework"]);
    }
}
