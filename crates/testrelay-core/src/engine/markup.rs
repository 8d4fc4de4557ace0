//! Structured diagnostic logs attached to step runs
//!
//! A log is a set of named streams. Each stream body is a tree of tags:
//! plain text, named sections, classed markers (e.g. a stack trace region),
//! and embedded attachments.

/// Well-known stream names
pub mod streams {
    pub const FAILURES: &str = "Failures";
    pub const WARNINGS: &str = "Warnings";
    pub const CONSOLE_OUTPUT: &str = "ConsoleOutput";
    pub const CONSOLE_ERROR: &str = "ConsoleError";
    pub const DEBUG_TRACE: &str = "DebugTrace";
    pub const DEFAULT: &str = "Log";
}

/// Well-known marker classes
pub mod markers {
    pub const STACK_TRACE: &str = "StackTrace";
    pub const EXCEPTION: &str = "Exception";
    pub const EXCEPTION_TYPE: &str = "ExceptionType";
    pub const EXCEPTION_MESSAGE: &str = "ExceptionMessage";
}

/// One node of a stream body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupTag {
    Text(String),
    Section {
        name: String,
        contents: Vec<MarkupTag>,
    },
    Marker {
        class: String,
        contents: Vec<MarkupTag>,
    },
    Embed {
        attachment: String,
    },
}

impl MarkupTag {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn marker(class: impl Into<String>, contents: Vec<MarkupTag>) -> Self {
        Self::Marker {
            class: class.into(),
            contents,
        }
    }

    pub fn section(name: impl Into<String>, contents: Vec<MarkupTag>) -> Self {
        Self::Section {
            name: name.into(),
            contents,
        }
    }

    pub fn accept(&self, visitor: &mut dyn TagVisitor) {
        match self {
            Self::Text(text) => visitor.visit_text(text),
            Self::Section { name, contents } => visitor.visit_section(name, contents),
            Self::Marker { class, contents } => visitor.visit_marker(class, contents),
            Self::Embed { attachment } => visitor.visit_embed(attachment),
        }
    }
}

/// Visitor over markup tags. Default methods walk into nested contents.
pub trait TagVisitor {
    fn visit_text(&mut self, _text: &str) {}

    fn visit_section(&mut self, _name: &str, contents: &[MarkupTag]) {
        walk(self, contents);
    }

    fn visit_marker(&mut self, _class: &str, contents: &[MarkupTag]) {
        walk(self, contents);
    }

    fn visit_embed(&mut self, _attachment: &str) {}
}

/// Visit every tag in `tags`
pub fn walk<V: TagVisitor + ?Sized>(visitor: &mut V, tags: &[MarkupTag]) {
    for tag in tags {
        match tag {
            MarkupTag::Text(text) => visitor.visit_text(text),
            MarkupTag::Section { name, contents } => visitor.visit_section(name, contents),
            MarkupTag::Marker { class, contents } => visitor.visit_marker(class, contents),
            MarkupTag::Embed { attachment } => visitor.visit_embed(attachment),
        }
    }
}

/// Concatenated text of a tag list, sections and markers included
pub fn plain_text(tags: &[MarkupTag]) -> String {
    struct TextCollector(String);

    impl TagVisitor for TextCollector {
        fn visit_text(&mut self, text: &str) {
            self.0.push_str(text);
        }
    }

    let mut collector = TextCollector(String::new());
    walk(&mut collector, tags);
    collector.0
}

/// A named stream of markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupStream {
    pub name: String,
    pub body: Vec<MarkupTag>,
}

impl MarkupStream {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: MarkupTag) -> Self {
        self.body.push(tag);
        self
    }

    pub fn write(&mut self, text: impl Into<String>) {
        self.body.push(MarkupTag::Text(text.into()));
    }

    pub fn to_plain_text(&self) -> String {
        plain_text(&self.body)
    }
}

/// The structured log of one step run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredLog {
    pub streams: Vec<MarkupStream>,
}

impl StructuredLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, stream: MarkupStream) -> Self {
        self.streams.push(stream);
        self
    }

    pub fn get_stream(&self, name: &str) -> Option<&MarkupStream> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Get a stream by name, creating an empty one if missing
    pub fn stream_mut(&mut self, name: &str) -> &mut MarkupStream {
        let idx = match self.streams.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.streams.push(MarkupStream::new(name));
                self.streams.len() - 1
            }
        };
        &mut self.streams[idx]
    }
}
