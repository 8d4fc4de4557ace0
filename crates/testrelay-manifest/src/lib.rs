//! testrelay Manifest - Reference test engine
//!
//! An engine whose "test binaries" are manifest files (TOML, YAML or JSON)
//! describing a tree of fixtures and tests. Each leaf may name a shell
//! command; running the test runs the command and maps its exit status.
//!
//! ```toml
//! name = "calc"
//!
//! [[tests]]
//! name = "Arith"
//!
//! [[tests.children]]
//! name = "adds"
//! command = "cargo test -q adds"
//! file = "src/arith.rs"
//! line = 10
//! ```
//!
//! [`ManifestEngine`] exposes the registry, loader, and launcher through the
//! engine contracts in `testrelay-core`.

pub mod driver;
pub mod error;
pub mod launcher;
pub mod loader;
pub mod manifest;
pub mod registry;

use testrelay_core::engine::{AssemblyLoader, TestEngine, TestFrameworkManager, TestLauncher};

pub use driver::ManifestDriver;
pub use error::ManifestError;
pub use launcher::ManifestLauncher;
pub use loader::{load_manifest, ManifestLoader};
pub use manifest::{id_scope, test_id, Manifest, ManifestFormat, ManifestNode};
pub use registry::{Detection, FrameworkRegistry, ManifestFramework, MANIFEST_FRAMEWORK_ID};

/// The manifest engine
#[derive(Debug)]
pub struct ManifestEngine {
    registry: FrameworkRegistry,
}

impl ManifestEngine {
    /// Engine with only the built-in framework registered
    pub fn new() -> Self {
        Self {
            registry: FrameworkRegistry::with_builtins(),
        }
    }

    /// Register another framework that manifests may name as their hint
    pub fn with_framework(mut self, framework: ManifestFramework) -> Self {
        self.registry.register(framework);
        self
    }

    pub fn registry(&self) -> &FrameworkRegistry {
        &self.registry
    }
}

impl Default for ManifestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine for ManifestEngine {
    fn framework_manager(&self) -> &dyn TestFrameworkManager {
        &self.registry
    }

    fn assembly_loader(&self) -> Box<dyn AssemblyLoader> {
        Box::new(ManifestLoader::new())
    }

    fn launcher(&self) -> Box<dyn TestLauncher> {
        Box::new(ManifestLauncher::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testrelay_core::engine::{
        EngineLogger, ExplorationMessage, ExplorationOptions, FallbackMode, FrameworkSelector,
        LogSeverity, NullProgressMonitor,
    };

    struct Silent;

    impl EngineLogger for Silent {
        fn log(&self, _severity: LogSeverity, _message: &str, _details: Option<&str>) {}
    }

    #[test]
    fn test_load_resolve_explore() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("calc.yaml");
        std::fs::write(
            &path,
            "name: calc\nframework: NUnitAdapter.TestFramework\ntests:\n  - name: adds\n    command: \"true\"\n",
        )
        .unwrap();

        let engine = ManifestEngine::new()
            .with_framework(ManifestFramework::new("NUnitAdapter.TestFramework", "NUnit"));
        let assembly = engine
            .assembly_loader()
            .load_assembly_from(&path)
            .unwrap()
            .unwrap();

        let driver = engine
            .framework_manager()
            .get_test_driver(
                &FrameworkSelector::any(FallbackMode::Strict),
                &[assembly.clone()],
                &Silent,
            )
            .unwrap();
        assert_eq!(driver.framework().name, "NUnit");

        let mut discovered = Vec::new();
        driver
            .describe(
                &[assembly],
                &ExplorationOptions::default(),
                &mut |m| {
                    if let ExplorationMessage::TestDiscovered(t) = m {
                        discovered.push(t.full_name.clone());
                    }
                },
                &NullProgressMonitor,
            )
            .unwrap();
        assert_eq!(discovered, vec!["calc/adds", "calc"]);
    }

    #[test]
    fn test_registry_lists_builtin_first() {
        let engine = ManifestEngine::default();
        assert_eq!(engine.registry().framework_ids(), vec![MANIFEST_FRAMEWORK_ID]);
    }
}
