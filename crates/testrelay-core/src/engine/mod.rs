//! External engine model and contracts
//!
//! The engine explores test binaries into a tree of [`TestDescriptor`]s and
//! reports execution as a stream of step events. Implementations live outside
//! this crate; the adapter only talks to these traits.

pub mod descriptor;
pub mod filter;
pub mod framework;
pub mod markup;
pub mod run;

pub use descriptor::{CodeElement, CodeElementKind, CodeLocation, CodeReference, TestDescriptor};
pub use filter::{FilterSet, TestFilter, ValueFilter};
pub use framework::{
    Annotation, AnnotationKind, AssemblyInfo, AssemblyLoader, EngineLogger, ExplorationMessage,
    ExplorationOptions, FallbackMode, FrameworkHandle, FrameworkSelector, LogSeverity,
    NullProgressMonitor, ProgressMonitor, TestDriver, TestFrameworkManager,
};
pub use markup::{MarkupStream, MarkupTag, StructuredLog, TagVisitor};
pub use run::{
    LaunchSummary, RunExtension, StepFinishedEvent, StepResult, StepStartedEvent, TestEngine,
    TestLauncher, TestStatus, TestStep, TestStepRun,
};
