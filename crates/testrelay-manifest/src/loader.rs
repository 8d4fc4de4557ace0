//! Non-locking manifest loader
//!
//! Each manifest is read into memory in one call and the file is closed
//! before parsing, so loading never holds a handle on the source.

use std::path::{Path, PathBuf};

use testrelay_core::engine::{AssemblyInfo, AssemblyLoader};
use testrelay_core::{EngineError, EngineResult};
use tracing::debug;

use crate::manifest::{Manifest, ManifestFormat};

/// Read and parse the manifest at `path`.
///
/// `Ok(None)` when the extension is not a manifest format.
pub fn load_manifest(path: &Path) -> EngineResult<Option<Manifest>> {
    let Some(format) = ManifestFormat::from_path(path) else {
        return Ok(None);
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| EngineError::load_failed(path, e.to_string()))?;
    let manifest =
        Manifest::parse(&content, format).map_err(|e| e.into_load_failure(path))?;
    Ok(Some(manifest))
}

/// [`AssemblyLoader`] for manifest files
#[derive(Debug, Default)]
pub struct ManifestLoader {
    hints: Vec<PathBuf>,
}

impl ManifestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// `path` itself if it exists, else the first hint directory holding it
    fn locate(&self, path: &Path) -> PathBuf {
        if path.exists() || path.is_absolute() {
            return path.to_path_buf();
        }
        self.hints
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| path.to_path_buf())
    }
}

impl AssemblyLoader for ManifestLoader {
    fn add_hint_directory(&mut self, dir: &Path) {
        if !self.hints.iter().any(|d| d == dir) {
            self.hints.push(dir.to_path_buf());
        }
    }

    fn load_assembly_from(&mut self, path: &Path) -> EngineResult<Option<AssemblyInfo>> {
        let located = self.locate(path);
        let Some(manifest) = load_manifest(&located)? else {
            debug!(path = %path.display(), "not a manifest");
            return Ok(None);
        };

        debug!(path = %located.display(), name = %manifest.name, "loaded manifest");
        Ok(Some(
            AssemblyInfo::new(manifest.name.clone(), path).with_payload(manifest),
        ))
    }
}
