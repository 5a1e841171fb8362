//! Client-side SPARQL protocol layer for RDF triple stores.
//!
//! A [`Repository`] is bound to one endpoint and one [`Dialect`]. It packages queries
//! and updates into HTTP requests the backend understands, sends them through an
//! injected [`HttpExecutor`], and decodes the answers into a [`ResultSet`] (SELECT and
//! ASK) or a list of triples (CONSTRUCT). Failures are reported as a [`RepoError`] that
//! keeps transport problems, rejected statuses and undecodable bodies apart.
//!
//! ```no_run
//! use sparqlrepo::{Dialect, RepoConfig, Repository};
//!
//! let config = RepoConfig::builder()
//!     .endpoint("http://localhost:7200/repositories/demo")
//!     .dialect(Dialect::Ontotext)
//!     .timeout_secs(30u64)
//!     .build()?;
//! let repo = Repository::new(&config)?;
//! let results = repo.query("SELECT ?s WHERE { ?s ?p ?o } LIMIT 10")?;
//! for row in &results {
//!     println!("{:?}", row.get("s"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod dialect;
pub mod errors;
pub mod formats;
pub mod repo;
pub mod results;
pub mod transport;
pub mod triples;

pub use config::{AuthScheme, Credentials, RepoConfig};
pub use dialect::{Dialect, EncodedRequest, Purpose};
pub use errors::{DecodeError, Operation, RepoError, ResponseBody, StatusError, TransportError};
pub use formats::GraphFormat;
pub use repo::{Repository, Response};
pub use results::{Binding, ResultSet};
pub use transport::{DigestExecutor, HttpExecutor, HttpResponse, ReqwestExecutor};
