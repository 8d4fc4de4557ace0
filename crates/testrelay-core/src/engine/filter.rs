//! Test filters understood by the engine's launcher

use std::fmt;

use super::descriptor::TestDescriptor;

/// Predicate over a single string value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFilter {
    Any,
    Equals(String),
    Or(Vec<ValueFilter>),
}

impl ValueFilter {
    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Equals(expected) => expected == value,
            Self::Or(filters) => filters.iter().any(|f| f.is_match(value)),
        }
    }
}

impl fmt::Display for ValueFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Equals(value) => write!(f, "'{}'", value),
            Self::Or(filters) => {
                let parts: Vec<String> = filters.iter().map(|p| p.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

/// Predicate over a test descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestFilter {
    Any,
    Id(ValueFilter),
    FullName(ValueFilter),
    Or(Vec<TestFilter>),
    And(Vec<TestFilter>),
    Not(Box<TestFilter>),
}

impl TestFilter {
    pub fn is_match(&self, test: &TestDescriptor) -> bool {
        match self {
            Self::Any => true,
            Self::Id(filter) => filter.is_match(&test.id),
            Self::FullName(filter) => filter.is_match(&test.full_name),
            Self::Or(filters) => filters.iter().any(|f| f.is_match(test)),
            Self::And(filters) => filters.iter().all(|f| f.is_match(test)),
            Self::Not(filter) => !filter.is_match(test),
        }
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, filters: &[TestFilter], sep: &str) -> fmt::Result {
            let parts: Vec<String> = filters.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", parts.join(sep))
        }

        match self {
            Self::Any => f.write_str("*"),
            Self::Id(filter) => write!(f, "Id: {}", filter),
            Self::FullName(filter) => write!(f, "FullName: {}", filter),
            Self::Or(filters) => join(f, filters, " or "),
            Self::And(filters) => join(f, filters, " and "),
            Self::Not(filter) => write!(f, "not {}", filter),
        }
    }
}

/// The filter set a launcher applies to decide which tests run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    include: TestFilter,
}

impl FilterSet {
    pub fn new(include: TestFilter) -> Self {
        Self { include }
    }

    /// Filter set matching tests whose identifier equals any of `ids`
    pub fn for_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = ids
            .into_iter()
            .map(|id| ValueFilter::Equals(id.into()))
            .collect();
        Self::new(TestFilter::Id(ValueFilter::Or(values)))
    }

    pub fn include(&self) -> &TestFilter {
        &self.include
    }

    pub fn is_match(&self, test: &TestDescriptor) -> bool {
        self.include.is_match(test)
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "include {}", self.include)
    }
}
