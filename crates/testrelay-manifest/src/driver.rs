//! Exploration driver

use std::path::Path;
use std::sync::Arc;

use testrelay_core::engine::{
    Annotation, AnnotationKind, AssemblyInfo, ExplorationMessage, ExplorationOptions,
    FrameworkHandle, ProgressMonitor, TestDescriptor, TestDriver,
};
use testrelay_core::{EngineError, EngineResult};
use tracing::debug;

use crate::manifest::{Manifest, ManifestNode};

/// Explores loaded manifests into descriptor trees
#[derive(Debug, Clone)]
pub struct ManifestDriver {
    framework: FrameworkHandle,
}

impl ManifestDriver {
    pub fn new(framework: FrameworkHandle) -> Self {
        Self { framework }
    }

    fn annotate(
        manifest: &Manifest,
        path: &Path,
        root: &TestDescriptor,
        consumer: &mut dyn FnMut(ExplorationMessage),
    ) {
        if manifest.tests.is_empty() {
            consumer(ExplorationMessage::AnnotationDiscovered(Annotation::new(
                AnnotationKind::Info,
                format!("Manifest '{}' declares no tests", manifest.name),
            )));
            return;
        }

        let index = manifest.index(path);
        for test in root.all_tests().iter().filter(|t| t.is_test_case) {
            let Some(node) = index.get(&test.id) else {
                continue;
            };
            if let Some(annotation) = Self::leaf_annotation(test, node) {
                consumer(ExplorationMessage::AnnotationDiscovered(annotation));
            }
        }
    }

    fn leaf_annotation(test: &TestDescriptor, node: &ManifestNode) -> Option<Annotation> {
        if node.command.is_some() || node.ignore.is_some() {
            return None;
        }
        let mut annotation = Annotation::new(
            AnnotationKind::Warning,
            format!("Test '{}' has no command and will be inconclusive", test.full_name),
        );
        if let Some(location) = &test.code_location {
            annotation = annotation.with_location(location.clone());
        }
        Some(annotation)
    }
}

impl TestDriver for ManifestDriver {
    fn framework(&self) -> &FrameworkHandle {
        &self.framework
    }

    fn describe(
        &self,
        assemblies: &[AssemblyInfo],
        options: &ExplorationOptions,
        consumer: &mut dyn FnMut(ExplorationMessage),
        progress: &dyn ProgressMonitor,
    ) -> EngineResult<()> {
        progress.begin_task("Exploring manifests", assemblies.len() as f64);

        for assembly in assemblies {
            if progress.is_canceled() {
                break;
            }
            let manifest = assembly.payload::<Manifest>().ok_or_else(|| {
                EngineError::Exploration(format!(
                    "{} was not loaded by the manifest loader",
                    assembly.path.display()
                ))
            })?;

            let root = Arc::new(manifest.to_descriptor(&assembly.path));
            debug!(assembly = %assembly.name, tests = root.all_tests().len(), "explored manifest");

            if options.include_annotations {
                Self::annotate(manifest, &assembly.path, &root, consumer);
            }
            for test in root.all_tests() {
                consumer(ExplorationMessage::TestDiscovered(test));
            }
            consumer(ExplorationMessage::TestDiscovered(root));
            progress.worked(1.0);
        }

        progress.done();
        Ok(())
    }
}
