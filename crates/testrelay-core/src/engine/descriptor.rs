//! Hierarchical test descriptors produced by exploration

use std::path::PathBuf;
use std::sync::Arc;

/// Unresolved reference to the code that declares a test
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeReference {
    pub assembly_name: Option<String>,
    pub namespace_name: Option<String>,
    pub type_name: Option<String>,
    pub member_name: Option<String>,
}

/// Kind of a resolved code element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeElementKind {
    Assembly,
    Type,
    Member,
}

/// A resolved code element, tied to the binary that contains it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeElement {
    /// Simple name (e.g. method name)
    pub name: String,
    pub kind: CodeElementKind,
    /// Path of the compiled binary that owns this element
    pub assembly_path: PathBuf,
}

/// Position in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLocation {
    pub path: PathBuf,
    /// 1-based line, when known
    pub line: Option<u32>,
    pub column: u32,
}

/// A node in the engine's test tree: a container (suite, fixture) or a test case
#[derive(Debug, Clone, PartialEq)]
pub struct TestDescriptor {
    /// Process-unique identifier
    pub id: String,
    /// Local name
    pub name: String,
    /// Full hierarchical name, segments separated by `/`
    pub full_name: String,
    /// Whether this node is a leaf the host should see
    pub is_test_case: bool,
    pub code_reference: CodeReference,
    pub code_element: Option<CodeElement>,
    pub code_location: Option<CodeLocation>,
    pub children: Vec<Arc<TestDescriptor>>,
}

impl TestDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            full_name: full_name.into(),
            is_test_case: false,
            code_reference: CodeReference::default(),
            code_element: None,
            code_location: None,
            children: Vec::new(),
        }
    }

    pub fn test_case(mut self) -> Self {
        self.is_test_case = true;
        self
    }

    pub fn with_child(mut self, child: TestDescriptor) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn with_code_element(mut self, element: CodeElement) -> Self {
        self.code_element = Some(element);
        self
    }

    pub fn with_code_location(mut self, path: impl Into<PathBuf>, line: u32) -> Self {
        self.code_location = Some(CodeLocation {
            path: path.into(),
            line: Some(line),
            column: 0,
        });
        self
    }

    /// Declaring file without a known line
    pub fn with_code_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.code_location = Some(CodeLocation {
            path: path.into(),
            line: None,
            column: 0,
        });
        self
    }

    pub fn with_code_reference(mut self, reference: CodeReference) -> Self {
        self.code_reference = reference;
        self
    }

    /// All descendants, depth-first, pre-order (excluding `self`)
    pub fn all_tests(&self) -> Vec<Arc<TestDescriptor>> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }
}

fn collect_descendants(node: &TestDescriptor, out: &mut Vec<Arc<TestDescriptor>>) {
    for child in &node.children {
        out.push(Arc::clone(child));
        collect_descendants(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tests_is_preorder() {
        let root = TestDescriptor::new("r", "root", "root")
            .with_child(TestDescriptor::new("a", "A", "root/A").test_case())
            .with_child(
                TestDescriptor::new("b", "B", "root/B")
                    .with_child(TestDescriptor::new("c", "C", "root/B/C").test_case())
                    .with_child(TestDescriptor::new("d", "D", "root/B/D").test_case()),
            );

        let ids: Vec<_> = root.all_tests().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_leaf_has_no_descendants() {
        let leaf = TestDescriptor::new("a", "A", "A").test_case();
        assert!(leaf.all_tests().is_empty());
        assert!(leaf.is_test_case);
    }
}
