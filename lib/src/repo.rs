//! The repository handle: encodes requests for its dialect, sends them through its
//! executor, classifies the response status and decodes successful bodies.

use crate::config::RepoConfig;
use crate::dialect::{Dialect, EncodedRequest, Purpose};
use crate::errors::{DecodeError, Operation, RepoError, ResponseBody, StatusError};
use crate::formats::{is_results_json, GraphFormat, SPARQL_RESULTS_JSON};
use crate::results::{self, ResultSet};
use crate::transport::{self, HttpExecutor, HttpResponse};
use crate::triples;
use log::{debug, info, warn};
use oxigraph::model::{Quad, Triple};
use reqwest::StatusCode;
use std::io::Read;
use std::sync::Arc;
use url::Url;

/// Upper bound on how much of a rejected response body is read into the error.
pub const MAX_ERROR_BODY_BYTES: u64 = 64 * 1024;

const UPDATE_ACCEPT: &str = "*/*";

/// Decoded body of a successful [`Repository::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Results(ResultSet),
    Graph(Vec<Quad>),
}

/// What the caller wants done with a successful body; fixed before any I/O.
enum Expect {
    Results,
    Graph(GraphFormat),
}

impl Expect {
    fn for_accept(accept: &str) -> Result<Self, RepoError> {
        if is_results_json(accept) {
            return Ok(Expect::Results);
        }
        GraphFormat::from_media_type(accept)
            .map(Expect::Graph)
            .ok_or_else(|| RepoError::Config(format!("no decoder for Accept {:?}", accept)))
    }

    fn operation(&self) -> Operation {
        match self {
            Expect::Results => Operation::Query,
            Expect::Graph(_) => Operation::Construct,
        }
    }
}

/// Whether `status` counts as success. SELECT/ASK answers must be exactly 200 while
/// graph answers and updates accept the whole 200..=205 range.
fn is_accepted(status: StatusCode, operation: Operation) -> bool {
    match operation {
        Operation::Query => status == StatusCode::OK,
        Operation::Construct | Operation::Update => (200..206).contains(&status.as_u16()),
    }
}

/// Reads a bounded, trimmed excerpt of a rejected response body.
fn read_error_body(body: &mut dyn Read) -> ResponseBody {
    let mut buf = Vec::new();
    match body.take(MAX_ERROR_BODY_BYTES).read_to_end(&mut buf) {
        Ok(_) => {
            let text = String::from_utf8_lossy(&buf);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                ResponseBody::Empty
            } else {
                ResponseBody::Text(trimmed.to_string())
            }
        }
        Err(e) => {
            debug!("Failed to read error response body: {}", e);
            ResponseBody::Unreadable
        }
    }
}

/// A SPARQL endpoint reached through one dialect.
///
/// The handle holds no per-request state, so a single instance can be shared across
/// threads and used concurrently.
#[derive(Clone)]
pub struct Repository {
    endpoint: Url,
    dialect: Dialect,
    executor: Arc<dyn HttpExecutor>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("endpoint", &self.endpoint.as_str())
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Creates a repository with a `reqwest` executor built from `config`, answering
    /// digest challenges when the credentials ask for it.
    pub fn new(config: &RepoConfig) -> Result<Self, RepoError> {
        let executor = transport::executor_from_config(config)?;
        Self::with_executor(config, executor)
    }

    /// Creates a repository that sends every request through `executor`.
    pub fn with_executor(
        config: &RepoConfig,
        executor: Arc<dyn HttpExecutor>,
    ) -> Result<Self, RepoError> {
        let endpoint = config.endpoint_url()?;
        info!("Using {} endpoint {}", config.dialect, endpoint);
        Ok(Repository {
            endpoint,
            dialect: config.dialect,
            executor,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Encodes `query` for this repository without sending it.
    pub fn encode(
        &self,
        query: &str,
        purpose: Purpose,
        accept: &str,
    ) -> Result<EncodedRequest, RepoError> {
        self.dialect.encode(&self.endpoint, query, purpose, accept)
    }

    /// Sends a request and decodes the body according to its `Accept` header.
    pub fn execute(&self, request: &EncodedRequest) -> Result<Response, RepoError> {
        let expect = Expect::for_accept(request.accept())?;
        let mut response = self.send(request, expect.operation())?;
        let decoded = match expect {
            Expect::Results => Response::Results(results::decode(&mut response.body)?),
            Expect::Graph(format) => Response::Graph(triples::decode(&mut response.body, format)?),
        };
        Ok(decoded)
    }

    /// Runs a SELECT or ASK query and decodes the SPARQL results JSON answer.
    pub fn query(&self, query: &str) -> Result<ResultSet, RepoError> {
        let request = self.encode(query, Purpose::classify(query), SPARQL_RESULTS_JSON)?;
        let mut response = self.send(&request, Operation::Query)?;
        Ok(results::decode(&mut response.body)?)
    }

    /// Runs a CONSTRUCT (or DESCRIBE) query, requesting Turtle, and returns its triples.
    pub fn construct(&self, query: &str) -> Result<Vec<Triple>, RepoError> {
        Ok(self
            .construct_quads(query, GraphFormat::Turtle)?
            .into_iter()
            .map(|quad| Triple::new(quad.subject, quad.predicate, quad.object))
            .collect())
    }

    /// Runs a CONSTRUCT query in `format` and decodes it, keeping graph names.
    pub fn construct_quads(
        &self,
        query: &str,
        format: GraphFormat,
    ) -> Result<Vec<Quad>, RepoError> {
        if format.rdf_format().is_none() {
            return Err(DecodeError::UnsupportedFormat(format).into());
        }
        let request = self.encode(query, Purpose::classify(query), format.media_type())?;
        let mut response = self.send(&request, Operation::Construct)?;
        Ok(triples::decode(&mut response.body, format)?)
    }

    /// Runs a query asking for `format` and returns the response body byte for byte.
    ///
    /// Works for every [`GraphFormat`], including binary RDF and the formats without a
    /// parser.
    pub fn construct_format(
        &self,
        query: &str,
        format: GraphFormat,
    ) -> Result<Vec<u8>, RepoError> {
        let request = self.encode(query, Purpose::classify(query), format.media_type())?;
        let mut response = self.send(&request, Operation::Construct)?;
        let mut bytes = Vec::new();
        response
            .body
            .read_to_end(&mut bytes)
            .map_err(DecodeError::from)?;
        Ok(bytes)
    }

    /// Like [`Repository::construct_format`] for textual formats; fails with
    /// [`DecodeError::Utf8`] when the body is not UTF-8.
    pub fn construct_text(&self, query: &str, format: GraphFormat) -> Result<String, RepoError> {
        let bytes = self.construct_format(query, format)?;
        Ok(String::from_utf8(bytes).map_err(DecodeError::from)?)
    }

    /// Sends a SPARQL update regardless of what the keyword scan would decide.
    pub fn update(&self, update: &str) -> Result<(), RepoError> {
        let request = self.encode(update, Purpose::Write, UPDATE_ACCEPT)?;
        self.send(&request, Operation::Update)?;
        Ok(())
    }

    /// Performs the round trip and rejects statuses outside the operation's window.
    /// On rejection the body is read for the error and dropped before returning.
    fn send(
        &self,
        request: &EncodedRequest,
        operation: Operation,
    ) -> Result<HttpResponse, RepoError> {
        debug!(
            "{} {} {} via {} dialect",
            operation, request.method, request.url, self.dialect
        );
        let mut response = self.executor.execute(request)?;
        if is_accepted(response.status, operation) {
            return Ok(response);
        }
        let body = read_error_body(&mut response.body);
        warn!(
            "{} against {} failed with {}",
            operation, self.endpoint, response.status
        );
        Err(StatusError {
            operation,
            status: response.status,
            body,
        }
        .into())
    }
}
