//! The HTTP executor capability and its blocking `reqwest` implementation.

use crate::config::{AuthScheme, Credentials, RepoConfig};
use crate::dialect::EncodedRequest;
use crate::errors::{RepoError, TransportError};
use digest_auth::{AuthContext, WwwAuthenticateHeader};
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Method, StatusCode};
use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex};
use url::Position;

/// Status, headers and an unread body stream. Dropping the value releases the body.
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn new<R>(status: StatusCode, headers: HeaderMap, body: R) -> Self
    where
        R: Read + Send + 'static,
    {
        HttpResponse {
            status,
            headers,
            body: Box::new(body),
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends encoded requests. Implementations must be shareable across threads; a
/// [`crate::Repository`] holds one for its whole lifetime.
pub trait HttpExecutor: Send + Sync {
    /// Performs one round trip. Any HTTP status is a successful return; only failures
    /// to obtain a response at all are errors.
    fn execute(&self, request: &EncodedRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpExecutor`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    client: Client,
    credentials: Option<Credentials>,
}

impl ReqwestExecutor {
    pub fn new(client: Client, credentials: Option<Credentials>) -> Self {
        ReqwestExecutor {
            client,
            credentials,
        }
    }

    /// Builds a client honoring the configured timeout and basic-auth credentials.
    pub fn from_config(config: &RepoConfig) -> Result<Self, RepoError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RepoError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::new(client, config.credentials.clone()))
    }
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &EncodedRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if let Some(creds) = &self.credentials {
            if creds.scheme == AuthScheme::Basic {
                builder = builder.basic_auth(&creds.username, Some(&creds.password));
            }
        }
        let resp = builder.send().map_err(TransportError::new)?;
        debug!("{} {} -> {}", request.method, request.url, resp.status());
        let status = resp.status();
        let headers = resp.headers().clone();
        Ok(HttpResponse::new(status, headers, resp))
    }
}

/// Wraps an executor and answers HTTP digest challenges.
///
/// A request that comes back 401 with a `Digest` challenge is resent once with an
/// `Authorization` header. The challenge is kept and answered up front on later
/// requests until the server issues a new one.
pub struct DigestExecutor<E> {
    inner: E,
    credentials: Credentials,
    challenge: Mutex<Option<WwwAuthenticateHeader>>,
}

impl<E> fmt::Debug for DigestExecutor<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("DigestExecutor")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl<E: HttpExecutor> DigestExecutor<E> {
    pub fn new(inner: E, credentials: Credentials) -> Self {
        DigestExecutor {
            inner,
            credentials,
            challenge: Mutex::new(None),
        }
    }

    fn authorize(
        &self,
        prompt: &mut WwwAuthenticateHeader,
        request: &EncodedRequest,
    ) -> Result<EncodedRequest, TransportError> {
        let uri = &request.url[Position::BeforePath..];
        let context = if request.method == Method::GET {
            AuthContext::new(
                self.credentials.username.as_str(),
                self.credentials.password.as_str(),
                uri,
            )
        } else {
            AuthContext::new_post(
                self.credentials.username.as_str(),
                self.credentials.password.as_str(),
                uri,
                Some(request.body.as_slice()),
            )
        };
        let answer = prompt
            .respond(&context)
            .map_err(|e| TransportError::new(format!("digest authentication failed: {}", e)))?;
        let value =
            HeaderValue::from_str(&answer.to_header_string()).map_err(TransportError::new)?;
        let mut authorized = request.clone();
        authorized.headers.insert(AUTHORIZATION, value);
        Ok(authorized)
    }
}

/// The first parsable `Digest` challenge among the `WWW-Authenticate` headers.
fn digest_challenge(headers: &HeaderMap) -> Option<WwwAuthenticateHeader> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| value.trim_start().to_ascii_lowercase().starts_with("digest"))
        .find_map(|value| match digest_auth::parse(value) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                debug!("Ignoring malformed digest challenge {:?}: {}", value, e);
                None
            }
        })
}

impl<E: HttpExecutor> HttpExecutor for DigestExecutor<E> {
    fn execute(&self, request: &EncodedRequest) -> Result<HttpResponse, TransportError> {
        let preauthorized = {
            let mut cached = self.challenge.lock().unwrap_or_else(|e| e.into_inner());
            match cached.as_mut() {
                Some(prompt) => Some(self.authorize(prompt, request)?),
                None => None,
            }
        };
        let response = self.inner.execute(preauthorized.as_ref().unwrap_or(request))?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(mut prompt) = digest_challenge(&response.headers) else {
            return Ok(response);
        };
        drop(response);
        debug!("Answering digest challenge from {}", request.url);
        let authorized = self.authorize(&mut prompt, request)?;
        *self.challenge.lock().unwrap_or_else(|e| e.into_inner()) = Some(prompt);
        self.inner.execute(&authorized)
    }
}

/// The executor a [`crate::Repository`] uses for `config`: a [`ReqwestExecutor`],
/// wrapped in a [`DigestExecutor`] when the credentials ask for digest.
pub fn executor_from_config(config: &RepoConfig) -> Result<Arc<dyn HttpExecutor>, RepoError> {
    let executor = ReqwestExecutor::from_config(config)?;
    match &config.credentials {
        Some(creds) if creds.scheme == AuthScheme::Digest => {
            info!("Using digest authentication as {}", creds.username);
            Ok(Arc::new(DigestExecutor::new(executor, creds.clone())))
        }
        _ => Ok(Arc::new(executor)),
    }
}
