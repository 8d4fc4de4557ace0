//! Descriptor to host test case translation
//!
//! [`CaseTranslator`] turns one engine descriptor into a flat host case.
//! [`CachingCaseBuilder`] puts the identity cache in front of any builder so
//! every request for the same engine id yields the same `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use testrelay_core::engine::TestDescriptor;
use testrelay_core::{HostTestCase, PropertyKeys, PropertyValue};
use tracing::debug;

use crate::identity::IdentityCache;

/// The source files supplied with one discovery or execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet(Arc<[PathBuf]>);

impl SourceSet {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self(paths.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Path> {
        self.0.get(index).map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }

    /// The only supplied source, if exactly one was supplied
    pub fn single(&self) -> Option<&Path> {
        match &*self.0 {
            [only] => Some(only.as_path()),
            _ => None,
        }
    }

    /// The one source whose file name contains `assembly_name` (case-insensitive).
    ///
    /// `None` when no source or more than one source matches.
    pub fn find_by_assembly_name(&self, assembly_name: &str) -> Option<(usize, &Path)> {
        if assembly_name.is_empty() {
            return None;
        }
        let needle = assembly_name.to_lowercase();
        let mut matches = self.0.iter().enumerate().filter(|(_, path)| {
            path.file_name()
                .map(|name| name.to_string_lossy().to_lowercase().contains(&needle))
                .unwrap_or(false)
        });

        let (index, path) = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some((index, path.as_path()))
    }
}

impl Default for SourceSet {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl<P: Into<PathBuf>> FromIterator<P> for SourceSet {
    fn from_iter<T: IntoIterator<Item = P>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Builds host test cases from engine descriptors
pub trait TestCaseBuilder: Send + Sync {
    fn build_test_case(&self, test: &TestDescriptor, sources: &SourceSet) -> HostTestCase;
}

/// Where a case's source came from
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedSource {
    path: PathBuf,
    /// Position in the request's source set, if chosen from it
    index: Option<usize>,
}

/// Default [`TestCaseBuilder`]
#[derive(Debug, Clone)]
pub struct CaseTranslator {
    executor_uri: String,
    keys: PropertyKeys,
}

impl CaseTranslator {
    pub fn new(executor_uri: impl Into<String>, keys: PropertyKeys) -> Self {
        Self {
            executor_uri: executor_uri.into(),
            keys,
        }
    }

    /// Name shown to the user
    pub fn display_name(test: &TestDescriptor) -> String {
        if let Some((_, last)) = test.full_name.rsplit_once('/') {
            return last.to_string();
        }
        if let Some(member) = &test.code_reference.member_name {
            return member.clone();
        }
        if let Some(element) = &test.code_element {
            return element.name.clone();
        }
        test.full_name.clone()
    }

    /// Resolve the owning binary.
    ///
    /// In priority order: the code element's binary, the only supplied source,
    /// the one supplied source whose file name contains the declared assembly
    /// name. Several candidates with no tie breaker resolve to nothing.
    fn resolve_source(test: &TestDescriptor, sources: &SourceSet) -> Option<ResolvedSource> {
        if let Some(element) = &test.code_element {
            if !element.assembly_path.as_os_str().is_empty() {
                return Some(ResolvedSource {
                    path: element.assembly_path.clone(),
                    index: None,
                });
            }
        }

        if let Some(only) = sources.single() {
            return Some(ResolvedSource {
                path: only.to_path_buf(),
                index: Some(0),
            });
        }

        let assembly_name = test.code_reference.assembly_name.as_deref()?;
        let (index, path) = sources.find_by_assembly_name(assembly_name)?;
        Some(ResolvedSource {
            path: path.to_path_buf(),
            index: Some(index),
        })
    }
}

impl TestCaseBuilder for CaseTranslator {
    fn build_test_case(&self, test: &TestDescriptor, sources: &SourceSet) -> HostTestCase {
        let mut case = HostTestCase::new(&test.id, &test.full_name, &self.executor_uri)
            .with_display_name(Self::display_name(test))
            .with_property(&self.keys.test_id, PropertyValue::Str(test.id.clone()));

        match Self::resolve_source(test, sources) {
            Some(resolved) => {
                case.set_property(
                    &self.keys.source_path,
                    PropertyValue::Str(resolved.path.to_string_lossy().into_owned()),
                );
                if let Some(index) = resolved.index {
                    case.set_property(&self.keys.source_index, PropertyValue::Int(index as i64));
                }
                case.source = Some(resolved.path);
            }
            None => {
                debug!(test_id = %test.id, sources = sources.len(), "source path left unresolved");
            }
        }

        if let Some(location) = &test.code_location {
            case.code_file_path = Some(location.path.clone());
            case.line_number = location.line;
        }

        case
    }
}

/// Identity-caching front for a [`TestCaseBuilder`]
pub struct CachingCaseBuilder {
    inner: Arc<dyn TestCaseBuilder>,
    keys: PropertyKeys,
    cache: IdentityCache<String, HostTestCase>,
}

impl CachingCaseBuilder {
    pub fn new(inner: Arc<dyn TestCaseBuilder>, keys: PropertyKeys) -> Self {
        Self {
            inner,
            keys,
            cache: IdentityCache::new(),
        }
    }

    /// The canonical case for `test`, built on first request
    pub fn get_test_case(&self, test: &TestDescriptor, sources: &SourceSet) -> Arc<HostTestCase> {
        self.cache.memoize(test.id.clone(), || {
            self.inner.build_test_case(test, sources)
        })
    }

    /// Seed the cache with cases the host already owns.
    ///
    /// Each case is keyed by its test-id property, or its own id when the
    /// property is absent. Cases whose key is already bound are left alone.
    pub fn add_test_cases(&self, cases: &[Arc<HostTestCase>]) -> usize {
        let seeded = self
            .cache
            .memoize_all(cases.iter().cloned(), |case| self.identity_key(case));
        debug!(supplied = cases.len(), seeded, "seeded identity cache");
        seeded
    }

    /// Engine identifier a host case is keyed under
    pub fn identity_key(&self, case: &HostTestCase) -> String {
        case.property_str(&self.keys.test_id)
            .unwrap_or(&case.id)
            .to_string()
    }

    /// Cached case for an engine identifier
    pub fn cached(&self, test_id: &str) -> Option<Arc<HostTestCase>> {
        self.cache.get(&test_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl std::fmt::Debug for CachingCaseBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingCaseBuilder")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
