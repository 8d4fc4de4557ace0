//! Driver resolution, binary loading, and exploration contracts

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::descriptor::{CodeLocation, TestDescriptor};
use crate::error::EngineResult;

/// Severity of an engine-side log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    Debug,
    Info,
    Important,
    Warning,
    Error,
}

/// Logger the engine writes diagnostics to
pub trait EngineLogger: Send + Sync {
    fn log(&self, severity: LogSeverity, message: &str, details: Option<&str>);
}

/// Progress reporting for long-running engine calls
pub trait ProgressMonitor: Send + Sync {
    fn begin_task(&self, name: &str, total_work: f64);

    fn worked(&self, amount: f64);

    fn is_canceled(&self) -> bool;

    fn done(&self);
}

/// Progress monitor that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {
    fn begin_task(&self, _name: &str, _total_work: f64) {}

    fn worked(&self, _amount: f64) {}

    fn is_canceled(&self) -> bool {
        false
    }

    fn done(&self) {}
}

/// Identity of a test framework known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameworkHandle {
    pub id: String,
    pub name: String,
}

impl FrameworkHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// What to do when no framework matches the supplied binaries exactly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Fail resolution
    Strict,
    /// Use the closest candidate
    #[default]
    Approximate,
}

type FrameworkPredicate = dyn Fn(&FrameworkHandle) -> bool + Send + Sync;

/// Criteria for choosing a test driver
#[derive(Clone)]
pub struct FrameworkSelector {
    filter: Arc<FrameworkPredicate>,
    pub fallback_mode: FallbackMode,
}

impl FrameworkSelector {
    pub fn new<F>(filter: F, fallback_mode: FallbackMode) -> Self
    where
        F: Fn(&FrameworkHandle) -> bool + Send + Sync + 'static,
    {
        Self {
            filter: Arc::new(filter),
            fallback_mode,
        }
    }

    /// Selector accepting every framework
    pub fn any(fallback_mode: FallbackMode) -> Self {
        Self::new(|_| true, fallback_mode)
    }

    pub fn accepts(&self, framework: &FrameworkHandle) -> bool {
        (self.filter)(framework)
    }
}

impl fmt::Debug for FrameworkSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameworkSelector")
            .field("fallback_mode", &self.fallback_mode)
            .finish_non_exhaustive()
    }
}

/// A loaded test binary. `payload` carries engine-private data.
#[derive(Clone)]
pub struct AssemblyInfo {
    pub name: String,
    pub path: PathBuf,
    pub payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl AssemblyInfo {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            payload: None,
        }
    }

    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Arc::new(payload));
        self
    }

    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<T>())
    }
}

impl fmt::Debug for AssemblyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyInfo")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// Loads test binaries without holding a lock on the file
pub trait AssemblyLoader: Send {
    /// Directory to probe when resolving a binary's dependencies
    fn add_hint_directory(&mut self, dir: &Path);

    /// Load a binary; `Ok(None)` when the file is not something this engine understands
    fn load_assembly_from(&mut self, path: &Path) -> EngineResult<Option<AssemblyInfo>>;
}

/// Kind of an exploration annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Error,
    Warning,
    Info,
}

/// A note the engine attaches to a test or binary during exploration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub message: String,
    pub details: Option<String>,
    pub code_location: Option<CodeLocation>,
}

impl Annotation {
    pub fn new(kind: AnnotationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            code_location: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_location(mut self, location: CodeLocation) -> Self {
        self.code_location = Some(location);
        self
    }

    /// Write this annotation to an engine logger
    pub fn log(&self, logger: &dyn EngineLogger, include_details: bool) {
        let severity = match self.kind {
            AnnotationKind::Error => LogSeverity::Error,
            AnnotationKind::Warning => LogSeverity::Warning,
            AnnotationKind::Info => LogSeverity::Important,
        };

        let message = match &self.code_location {
            Some(CodeLocation {
                path,
                line: Some(line),
                ..
            }) => format!("[{}:{}] {}", path.display(), line, self.message),
            Some(location) => format!("[{}] {}", location.path.display(), self.message),
            None => self.message.clone(),
        };

        let details = if include_details {
            self.details.as_deref()
        } else {
            None
        };
        logger.log(severity, &message, details);
    }
}

/// Messages emitted while exploring
#[derive(Debug, Clone)]
pub enum ExplorationMessage {
    TestDiscovered(Arc<TestDescriptor>),
    AnnotationDiscovered(Annotation),
}

/// Options controlling exploration
#[derive(Debug, Clone)]
pub struct ExplorationOptions {
    /// Emit annotation messages
    pub include_annotations: bool,
}

impl Default for ExplorationOptions {
    fn default() -> Self {
        Self {
            include_annotations: true,
        }
    }
}

/// A framework-specific driver that explores binaries
pub trait TestDriver: Send + Sync {
    fn framework(&self) -> &FrameworkHandle;

    /// Explore `assemblies`, emitting one `TestDiscovered` message per node
    fn describe(
        &self,
        assemblies: &[AssemblyInfo],
        options: &ExplorationOptions,
        consumer: &mut dyn FnMut(ExplorationMessage),
        progress: &dyn ProgressMonitor,
    ) -> EngineResult<()>;
}

/// Registry of frameworks able to provide drivers
pub trait TestFrameworkManager: Send + Sync {
    fn frameworks(&self) -> Vec<FrameworkHandle>;

    /// Resolve a driver for `assemblies`
    fn get_test_driver(
        &self,
        selector: &FrameworkSelector,
        assemblies: &[AssemblyInfo],
        logger: &dyn EngineLogger,
    ) -> EngineResult<Arc<dyn TestDriver>>;
}
