//! Backend dialects and the pure request encoder.
//!
//! Triple stores disagree on how a SPARQL query or update is packaged into an HTTP
//! request: which method to use, which form field carries the text, and whether the
//! desired result format travels as a form field. Each [`Dialect`] captures one such
//! set of rules. Encoding performs no I/O, so requests can be inspected in tests
//! without a live server.

use crate::errors::RepoError;
use crate::formats::FORM_URLENCODED;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded;
use url::Url;

/// Whether a request reads from or writes to the store.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Purpose {
    Read,
    Write,
}

impl Purpose {
    /// Classifies a query by scanning for the `INSERT` and `DELETE` keywords.
    ///
    /// The scan is case-sensitive and ignores SPARQL syntax entirely, so a read query
    /// that mentions either word inside a string literal, a comment or an IRI (for
    /// example `ex:INSERT`) is treated as a write. Lower-case updates are treated as
    /// reads. Callers that know better should pass a [`Purpose`] explicitly.
    pub fn classify(query: &str) -> Self {
        if query.contains("INSERT") || query.contains("DELETE") {
            Purpose::Write
        } else {
            Purpose::Read
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, Purpose::Write)
    }
}

/// Request-shape rules of a SPARQL backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Dialect {
    /// Always POST a form with a single `query` field.
    Sparql,
    /// GET with a `query` parameter for reads, POST an `update` field for writes (GraphDB).
    Ontotext,
    /// POST `query` + `format` for reads and a `request` field for writes.
    Oracle,
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sparql => "sparql",
            Dialect::Ontotext => "ontotext",
            Dialect::Oracle => "oracle",
        }
    }

    /// Packages `query` into a request against `endpoint` asking for `accept`.
    pub fn encode(
        self,
        endpoint: &Url,
        query: &str,
        purpose: Purpose,
        accept: &str,
    ) -> Result<EncodedRequest, RepoError> {
        let accept_value = HeaderValue::from_str(accept)
            .map_err(|e| RepoError::Config(format!("invalid Accept value {:?}: {}", accept, e)))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, accept_value);

        let request = match self {
            Dialect::Sparql => EncodedRequest::form(endpoint, &[("query", query)], headers),
            Dialect::Ontotext => match purpose {
                Purpose::Read => {
                    let mut url = endpoint.clone();
                    url.query_pairs_mut().append_pair("query", query);
                    EncodedRequest {
                        method: Method::GET,
                        url,
                        body: Vec::new(),
                        headers,
                    }
                }
                Purpose::Write => {
                    EncodedRequest::form(endpoint, &[("update", query)], headers)
                }
            },
            Dialect::Oracle => match purpose {
                Purpose::Read => EncodedRequest::form(
                    endpoint,
                    &[("format", accept), ("query", query)],
                    headers,
                ),
                Purpose::Write => {
                    EncodedRequest::form(endpoint, &[("request", query)], headers)
                }
            },
        };
        Ok(request)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Dialect {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sparql" | "generic" => Ok(Dialect::Sparql),
            "ontotext" | "graphdb" => Ok(Dialect::Ontotext),
            "oracle" => Ok(Dialect::Oracle),
            _ => Err(RepoError::UnsupportedDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = RepoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dialect> for String {
    fn from(value: Dialect) -> Self {
        value.name().to_string()
    }
}

/// A fully-encoded HTTP request, ready for an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl EncodedRequest {
    fn form(endpoint: &Url, fields: &[(&str, &str)], mut headers: HeaderMap) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter().copied())
            .finish();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        EncodedRequest {
            method: Method::POST,
            url: endpoint.clone(),
            body: body.into_bytes(),
            headers,
        }
    }

    /// The `Accept` header value, which selects the decoder for the response.
    pub fn accept(&self) -> &str {
        self.headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    /// Decoded `(name, value)` form fields of the body.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(&self.body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{GraphFormat, SPARQL_RESULTS_JSON};

    fn endpoint() -> Url {
        Url::parse("http://localhost:7200/repositories/test").unwrap()
    }

    const SELECT: &str = "SELECT ?s WHERE { ?s ?p ?o } LIMIT 10";
    const UPDATE: &str = "DELETE DATA { <http://a> <http://b> \"c\" }";

    #[test]
    fn classify_is_case_sensitive_substring_scan() {
        assert_eq!(Purpose::classify(SELECT), Purpose::Read);
        assert_eq!(
            Purpose::classify("INSERT DATA { <http://a> <http://b> <http://c> }"),
            Purpose::Write
        );
        assert_eq!(Purpose::classify(UPDATE), Purpose::Write);
        assert_eq!(
            Purpose::classify("insert data { <http://a> <http://b> <http://c> }"),
            Purpose::Read
        );
        // known misfire: keyword inside a literal
        assert_eq!(
            Purpose::classify("SELECT ?s WHERE { ?s ?p \"DELETE me\" }"),
            Purpose::Write
        );
    }

    #[test]
    fn sparql_dialect_always_posts_query_field() {
        for purpose in [Purpose::Read, Purpose::Write] {
            let req = Dialect::Sparql
                .encode(&endpoint(), SELECT, purpose, SPARQL_RESULTS_JSON)
                .unwrap();
            assert_eq!(req.method, Method::POST);
            assert_eq!(req.url, endpoint());
            assert_eq!(
                req.form_fields(),
                vec![("query".to_string(), SELECT.to_string())]
            );
            assert_eq!(req.headers[CONTENT_TYPE], FORM_URLENCODED);
            assert_eq!(req.accept(), SPARQL_RESULTS_JSON);
        }
    }

    #[test]
    fn ontotext_reads_use_get() {
        let req = Dialect::Ontotext
            .encode(&endpoint(), SELECT, Purpose::Read, "text/turtle")
            .unwrap();
        assert_eq!(req.method, Method::GET);
        assert!(req.body.is_empty());
        let pairs: Vec<(String, String)> = req
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs, vec![("query".to_string(), SELECT.to_string())]);
        assert!(req.headers.get(CONTENT_TYPE).is_none());
        assert_eq!(req.accept(), "text/turtle");
    }

    #[test]
    fn ontotext_writes_post_update_field() {
        let req = Dialect::Ontotext
            .encode(&endpoint(), UPDATE, Purpose::Write, "text/turtle")
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.url, endpoint());
        assert_eq!(
            req.form_fields(),
            vec![("update".to_string(), UPDATE.to_string())]
        );
    }

    #[test]
    fn oracle_reads_carry_format_field() {
        let accept = GraphFormat::RdfXml.media_type();
        let req = Dialect::Oracle
            .encode(&endpoint(), SELECT, Purpose::Read, accept)
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(
            req.form_fields(),
            vec![
                ("format".to_string(), accept.to_string()),
                ("query".to_string(), SELECT.to_string()),
            ]
        );
        assert_eq!(req.headers[CONTENT_TYPE], FORM_URLENCODED);
    }

    #[test]
    fn oracle_writes_use_request_field() {
        let req = Dialect::Oracle
            .encode(&endpoint(), UPDATE, Purpose::Write, "text/turtle")
            .unwrap();
        assert_eq!(req.method, Method::POST);
        assert!(req.body_str().starts_with("request="));
        assert!(!req.body_str().contains("query="));
        assert!(!req.body_str().contains("format="));
    }

    #[test]
    fn encoding_is_pure() {
        for dialect in [Dialect::Sparql, Dialect::Ontotext, Dialect::Oracle] {
            for query in [SELECT, UPDATE] {
                let purpose = Purpose::classify(query);
                let a = dialect
                    .encode(&endpoint(), query, purpose, "text/turtle")
                    .unwrap();
                let b = dialect
                    .encode(&endpoint(), query, purpose, "text/turtle")
                    .unwrap();
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn unknown_dialect_is_rejected() {
        assert_eq!("oracle".parse::<Dialect>().unwrap(), Dialect::Oracle);
        assert_eq!("Ontotext".parse::<Dialect>().unwrap(), Dialect::Ontotext);
        let err = "virtuoso".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, RepoError::UnsupportedDialect(ref name) if name == "virtuoso"));
        assert_eq!(err.to_string(), "Invalid database type: virtuoso");
    }

    #[test]
    fn invalid_accept_is_a_config_error() {
        let err = Dialect::Sparql
            .encode(&endpoint(), SELECT, Purpose::Read, "text/turtle\n")
            .unwrap_err();
        assert!(matches!(err, RepoError::Config(_)));
    }
}
