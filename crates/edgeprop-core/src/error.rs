use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::codec::CodecError;
use crate::config::ConfigError;

/// Machine-readable error codes surfaced by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FileUnreadable,
    FileUnwritable,
    ConfigInvalid,
    ConfigParseError,
    UnknownNode,
    EdgeIdsNotBijective,
    AttributeMismatch,
    CorruptTopology,
    RunCancelled,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::FileUnreadable => "E1001",
            Self::FileUnwritable => "E1002",
            Self::ConfigInvalid => "E2001",
            Self::ConfigParseError => "E2002",
            Self::UnknownNode => "E3001",
            Self::EdgeIdsNotBijective => "E3002",
            Self::AttributeMismatch => "E3003",
            Self::CorruptTopology => "E3004",
            Self::RunCancelled => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::FileUnreadable => "Instance file missing or unreadable",
            Self::FileUnwritable => "Output file could not be written",
            Self::ConfigInvalid => "Invalid propagation configuration",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownNode => "Edge references an unknown node",
            Self::EdgeIdsNotBijective => "Edge ids are not a bijection onto [0, |E|)",
            Self::AttributeMismatch => "Attribute side file does not match the edge set",
            Self::CorruptTopology => "Corrupt topology file",
            Self::RunCancelled => "Diffusion run cancelled",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::FileUnreadable => Some("Check --instance-dir and --name point at an existing instance."),
            Self::FileUnwritable => Some("Check disk space and write permissions."),
            Self::ConfigInvalid => {
                Some("Use states >= 2, iterations >= 0 and probabilities within [0, 1].")
            }
            Self::ConfigParseError => Some("Fix the TOML syntax in the config file and retry."),
            Self::UnknownNode => Some("Declare every endpoint in the node list before converting."),
            Self::EdgeIdsNotBijective => Some("Re-index edges so ids run from 0 to |E|-1 exactly once."),
            Self::AttributeMismatch => {
                Some("Regenerate side files from the same topology as the .epg file.")
            }
            Self::CorruptTopology => Some("Re-run `ep convert` to rebuild the topology file."),
            Self::RunCancelled => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Structural problems in topology or attribute data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// An edge endpoint is not in the node set.
    #[error("edge {edge} references unknown node {node:?}")]
    UnknownNode { edge: usize, node: String },

    /// An explicit edge id falls outside `[0, |E|)`.
    #[error("edge id {id} out of range for {edge_count} edges")]
    EdgeIdOutOfRange { id: usize, edge_count: usize },

    /// Two edges claim the same id.
    #[error("edge id {0} assigned more than once")]
    DuplicateEdgeId(usize),

    /// Some edges carry explicit ids and others do not.
    #[error("edge ids must be either all explicit or all implicit")]
    MixedEdgeIds,

    /// A dense attribute file does not cover every edge exactly once.
    #[error("attribute {attribute}: expected {expected} records, found {actual}")]
    RecordCountMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An attribute record names an edge id that does not exist.
    #[error("attribute {attribute}: record for unknown edge {id}")]
    UnknownEdge { attribute: &'static str, id: usize },

    /// An attribute record appears twice for the same edge.
    #[error("attribute {attribute}: duplicate record for edge {id}")]
    DuplicateRecord { attribute: &'static str, id: usize },

    /// An attribute line could not be parsed.
    #[error("attribute {attribute}, line {line}: {reason}")]
    MalformedRecord {
        attribute: &'static str,
        line: usize,
        reason: String,
    },

    /// A state vector table does not match the graph it is paired with.
    #[error("state table covers {actual} edges but graph has {expected}")]
    StateTableMismatch { expected: usize, actual: usize },
}

impl IntegrityError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownNode { .. } => ErrorCode::UnknownNode,
            Self::EdgeIdOutOfRange { .. } | Self::DuplicateEdgeId(_) | Self::MixedEdgeIds => {
                ErrorCode::EdgeIdsNotBijective
            }
            Self::RecordCountMismatch { .. }
            | Self::UnknownEdge { .. }
            | Self::DuplicateRecord { .. }
            | Self::MalformedRecord { .. }
            | Self::StateTableMismatch { .. } => ErrorCode::AttributeMismatch,
        }
    }
}

/// Top-level error for loading, seeding and diffusing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("data integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("topology decode error: {0}")]
    Codec(#[from] CodecError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run was aborted at a round barrier.
    #[error("diffusion cancelled after {completed_rounds} completed rounds")]
    Cancelled { completed_rounds: usize },
}

impl Error {
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::FileUnreadable,
            Self::Write { .. } => ErrorCode::FileUnwritable,
            Self::Integrity(inner) => inner.code(),
            Self::Codec(_) => ErrorCode::CorruptTopology,
            Self::Config(ConfigError::Parse { .. }) => ErrorCode::ConfigParseError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::Cancelled { .. } => ErrorCode::RunCancelled,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
