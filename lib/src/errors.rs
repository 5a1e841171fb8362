// Error taxonomy for SPARQL requests

use crate::formats::GraphFormat;
use oxigraph::io::RdfParseError;
use reqwest::StatusCode;
use std::error::Error;
use std::fmt;

/// The caller-facing operation a failure is attributed to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Query,
    Construct,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Query => write!(f, "Query"),
            Operation::Construct => write!(f, "Construct"),
            Operation::Update => write!(f, "Update"),
        }
    }
}

/// Network-level failure reported by the HTTP executor (DNS, refused connection, TLS, timeout).
#[derive(Debug)]
pub struct TransportError {
    source: Box<dyn Error + Send + Sync>,
}

impl TransportError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        TransportError {
            source: source.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SPARQL transport failed: {}", self.source)
    }
}

impl Error for TransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// What could be recovered from the body of a rejected response.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ResponseBody {
    /// The body was empty or whitespace only.
    Empty,
    /// Trimmed body text.
    Text(String),
    /// Reading the body failed.
    Unreadable,
}

/// The server answered outside the accepted status window.
#[derive(Debug, Clone)]
pub struct StatusError {
    pub operation: Operation,
    pub status: StatusCode,
    pub body: ResponseBody,
}

impl StatusError {
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: SPARQL request failed: {}.",
            self.operation, self.status
        )?;
        match &self.body {
            ResponseBody::Empty => Ok(()),
            ResponseBody::Text(text) => write!(f, " Response body: \n{}", text),
            ResponseBody::Unreadable => write!(f, " Failed to read response body"),
        }
    }
}

impl Error for StatusError {}

/// A successful response whose body could not be turned into the declared shape.
#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Well-formed JSON that does not follow the SPARQL results layout.
    Invalid(String),
    Rdf(RdfParseError),
    /// The graph format has no codec; only raw text retrieval works for it.
    UnsupportedFormat(GraphFormat),
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Io(e) => write!(f, "Failed to read response body: {}", e),
            DecodeError::Json(e) => write!(f, "Invalid SPARQL results JSON: {}", e),
            DecodeError::Invalid(msg) => write!(f, "Invalid SPARQL results: {}", msg),
            DecodeError::Rdf(e) => write!(f, "Failed to parse RDF response: {}", e),
            DecodeError::UnsupportedFormat(format) => {
                write!(f, "No RDF parser available for {}", format.media_type())
            }
            DecodeError::Utf8(e) => write!(f, "Response body is not valid UTF-8: {}", e),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DecodeError::Io(e) => Some(e),
            DecodeError::Json(e) => Some(e),
            DecodeError::Rdf(e) => Some(e),
            DecodeError::Utf8(e) => Some(e),
            DecodeError::Invalid(_) | DecodeError::UnsupportedFormat(_) => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(e)
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

impl From<RdfParseError> for DecodeError {
    fn from(e: RdfParseError) -> Self {
        DecodeError::Rdf(e)
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        DecodeError::Utf8(e)
    }
}

/// Every way a repository call can fail. Each kind is surfaced as-is; nothing is retried.
#[derive(Debug)]
pub enum RepoError {
    Transport(TransportError),
    Status(StatusError),
    Decode(DecodeError),
    UnsupportedDialect(String),
    Config(String),
}

impl RepoError {
    /// Only transport failures are worth repeating unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Transport(_))
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RepoError::Status(e) => Some(e.status),
            _ => None,
        }
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RepoError::Transport(e) => e.fmt(f),
            RepoError::Status(e) => e.fmt(f),
            RepoError::Decode(e) => e.fmt(f),
            RepoError::UnsupportedDialect(name) => write!(f, "Invalid database type: {}", name),
            RepoError::Config(msg) => write!(f, "Invalid repository configuration: {}", msg),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RepoError::Transport(e) => Some(e),
            RepoError::Status(e) => Some(e),
            RepoError::Decode(e) => Some(e),
            RepoError::UnsupportedDialect(_) | RepoError::Config(_) => None,
        }
    }
}

impl From<TransportError> for RepoError {
    fn from(e: TransportError) -> Self {
        RepoError::Transport(e)
    }
}

impl From<StatusError> for RepoError {
    fn from(e: StatusError) -> Self {
        RepoError::Status(e)
    }
}

impl From<DecodeError> for RepoError {
    fn from(e: DecodeError) -> Self {
        RepoError::Decode(e)
    }
}
