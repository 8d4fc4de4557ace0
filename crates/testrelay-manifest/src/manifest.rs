//! Manifest format and descriptor tree construction
//!
//! A manifest stands in for a compiled test binary. It names the binary, an
//! optional framework hint, and a tree of tests. Nodes without children are
//! test cases; nodes with children are fixtures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use testrelay_core::engine::{CodeElement, CodeElementKind, CodeReference, TestDescriptor};

use crate::error::ManifestError;

/// Top-level manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Binary (assembly) name
    pub name: String,
    /// Framework id this binary was written against
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub tests: Vec<ManifestNode>,
}

/// One test or fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    pub name: String,
    /// Shell command; exit status 0 passes
    #[serde(default)]
    pub command: Option<String>,
    /// Skip reason
    #[serde(default)]
    pub ignore: Option<String>,
    /// Source file declaring the test
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub children: Vec<ManifestNode>,
}

impl ManifestNode {
    pub fn is_test_case(&self) -> bool {
        self.children.is_empty()
    }
}

/// Serialization format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Toml,
    Yaml,
    Json,
}

impl ManifestFormat {
    /// Format for `path`, or `None` if the extension is not a manifest one
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Identifier scope for the manifest at `path`.
///
/// The canonical path when the file exists, so relative and absolute spellings
/// of one file agree; otherwise the path as given.
pub fn id_scope(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Stable identifier for a full test name within a manifest scope.
///
/// First 16 hex digits of the SHA-256 of `<scope>::<full name>`. The same
/// test in the same file gets the same id in every process; two files that
/// reuse an assembly name do not collide.
pub fn test_id(scope: &str, full_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"::");
    hasher.update(full_name.as_bytes());
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(16);
    id
}

impl Manifest {
    pub fn parse(content: &str, format: ManifestFormat) -> Result<Self, ManifestError> {
        let manifest: Manifest = match format {
            ManifestFormat::Toml => toml::from_str(content)?,
            ManifestFormat::Yaml => serde_yaml::from_str(content)?,
            ManifestFormat::Json => serde_json::from_str(content)?,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        fn check(nodes: &[ManifestNode], parent: &str) -> Result<(), ManifestError> {
            let mut seen = std::collections::HashSet::new();
            for node in nodes {
                if node.name.is_empty() || node.name.contains('/') {
                    return Err(ManifestError::InvalidName {
                        name: node.name.clone(),
                        parent: parent.to_string(),
                    });
                }
                if !seen.insert(node.name.as_str()) {
                    return Err(ManifestError::DuplicateName {
                        name: node.name.clone(),
                        parent: parent.to_string(),
                    });
                }
                check(&node.children, &format!("{}/{}", parent, node.name))?;
            }
            Ok(())
        }

        if self.name.is_empty() || self.name.contains('/') {
            return Err(ManifestError::InvalidName {
                name: self.name.clone(),
                parent: String::new(),
            });
        }
        check(&self.tests, &self.name)
    }

    /// Descriptor tree rooted at the binary itself
    pub fn to_descriptor(&self, path: &Path) -> TestDescriptor {
        let scope = id_scope(path);
        let mut root = TestDescriptor::new(test_id(&scope, &self.name), &self.name, &self.name)
            .with_code_element(CodeElement {
                name: self.name.clone(),
                kind: CodeElementKind::Assembly,
                assembly_path: path.to_path_buf(),
            })
            .with_code_reference(CodeReference {
                assembly_name: Some(self.name.clone()),
                ..Default::default()
            });

        for node in &self.tests {
            root = root.with_child(self.node_descriptor(node, &self.name, None, path, &scope));
        }
        root
    }

    fn node_descriptor(
        &self,
        node: &ManifestNode,
        parent_full_name: &str,
        fixture: Option<&str>,
        path: &Path,
        scope: &str,
    ) -> TestDescriptor {
        let full_name = format!("{}/{}", parent_full_name, node.name);
        let kind = if node.is_test_case() {
            CodeElementKind::Member
        } else {
            CodeElementKind::Type
        };

        let mut descriptor = TestDescriptor::new(test_id(scope, &full_name), &node.name, &full_name)
            .with_code_element(CodeElement {
                name: node.name.clone(),
                kind,
                assembly_path: path.to_path_buf(),
            })
            .with_code_reference(CodeReference {
                assembly_name: Some(self.name.clone()),
                namespace_name: None,
                type_name: fixture.map(String::from),
                member_name: node.is_test_case().then(|| node.name.clone()),
            });

        descriptor = match (&node.file, node.line) {
            (Some(file), Some(line)) => descriptor.with_code_location(file.clone(), line),
            (Some(file), None) => descriptor.with_code_file(file.clone()),
            (None, _) => descriptor,
        };

        if node.is_test_case() {
            return descriptor.test_case();
        }
        for child in &node.children {
            descriptor = descriptor.with_child(self.node_descriptor(
                child,
                &full_name,
                Some(&node.name),
                path,
                scope,
            ));
        }
        descriptor
    }

    /// Every node by test id, for the manifest loaded from `path`
    pub fn index(&self, path: &Path) -> HashMap<String, &ManifestNode> {
        fn visit<'a>(
            nodes: &'a [ManifestNode],
            parent: &str,
            scope: &str,
            out: &mut HashMap<String, &'a ManifestNode>,
        ) {
            for node in nodes {
                let full_name = format!("{}/{}", parent, node.name);
                out.insert(test_id(scope, &full_name), node);
                visit(&node.children, &full_name, scope, out);
            }
        }

        let mut out = HashMap::new();
        visit(&self.tests, &self.name, &id_scope(path), &mut out);
        out
    }
}
