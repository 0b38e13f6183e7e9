use std::fmt;
use std::path::PathBuf;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

pub type SctResult<T> = Result<T, SctError>;

/// Location of a node inside a project, used to point errors at the
/// offending script, section, instruction, or parameter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    pub script: Option<String>,
    pub section: Option<usize>,
    pub instruction: Option<usize>,
    pub parameter: Option<usize>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn script(name: impl Into<String>) -> Self {
        Self {
            script: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn section(mut self, index: usize) -> Self {
        self.section = Some(index);
        self
    }

    pub fn instruction(mut self, index: usize) -> Self {
        self.instruction = Some(index);
        self
    }

    pub fn parameter(mut self, index: usize) -> Self {
        self.parameter = Some(index);
        self
    }

    pub fn is_root(&self) -> bool {
        self.script.is_none()
            && self.section.is_none()
            && self.instruction.is_none()
            && self.parameter.is_none()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "<root>");
        }
        let mut parts = Vec::with_capacity(4);
        if let Some(script) = &self.script {
            parts.push(format!("script `{script}`"));
        }
        if let Some(section) = self.section {
            parts.push(format!("section {section}"));
        }
        if let Some(instruction) = self.instruction {
            parts.push(format!("instruction {instruction}"));
        }
        if let Some(parameter) = self.parameter {
            parts.push(format!("parameter {parameter}"));
        }
        write!(f, "{}", parts.join("/"))
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum SctError {
    #[error("decode error at {path}: {message}")]
    #[diagnostic(code("sct.decode"))]
    Decode { path: NodePath, message: String },
    #[error("encoding range error at {path}: {message}")]
    #[diagnostic(code("sct.encoding_range"))]
    EncodingRange { path: NodePath, message: String },
    #[error("link resolution error at {path}: offset {offset:#010x} {message}")]
    #[diagnostic(
        code("sct.link_resolution"),
        help("links must land on an instruction or string boundary of their own script")
    )]
    LinkResolution {
        path: NodePath,
        offset: u32,
        message: String,
    },
    #[error("serialization type error at {pointer}: expected {expected}, found {found}")]
    #[diagnostic(code("sct.serialization_type"))]
    SerializationType {
        pointer: String,
        expected: String,
        found: String,
    },
    #[error("project file error: {message}")]
    #[diagnostic(code("sct.project_file"))]
    ProjectFile {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },
    #[error("project error: {0}")]
    #[diagnostic(code("sct.project"))]
    Project(String),
    #[error("node not found: {0}")]
    #[diagnostic(code("sct.node_not_found"))]
    NodeNotFound(NodePath),
    #[error("resource limit exceeded: {0}")]
    #[diagnostic(code("sct.resource_limit"))]
    ResourceLimit(String),
    #[error("config error: {0}")]
    #[diagnostic(code("sct.config"))]
    Config(#[from] toml::de::Error),
    #[error("io error on {}: {source}", .path.display())]
    #[diagnostic(code("sct.io"))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SctError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            path: NodePath::root(),
            message: message.into(),
        }
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        Self::EncodingRange {
            path: NodePath::root(),
            message: message.into(),
        }
    }

    pub(crate) fn link(offset: u32, message: impl Into<String>) -> Self {
        Self::LinkResolution {
            path: NodePath::root(),
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        pointer: &str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::SerializationType {
            pointer: pointer.to_string(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attaches a node path to a path-carrying error that has none yet.
    ///
    /// Errors raised deep inside the codec start at the root and pick up
    /// their location on the way out; an already located error keeps it.
    pub fn at(mut self, location: &NodePath) -> Self {
        match &mut self {
            Self::Decode { path, .. }
            | Self::EncodingRange { path, .. }
            | Self::LinkResolution { path, .. } => {
                if path.is_root() {
                    *path = location.clone();
                }
            }
            _ => {}
        }
        self
    }

    /// Returns the node path for errors that carry one.
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Self::Decode { path, .. }
            | Self::EncodingRange { path, .. }
            | Self::LinkResolution { path, .. } => Some(path),
            Self::NodeNotFound(path) => Some(path),
            _ => None,
        }
    }
}
