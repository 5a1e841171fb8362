//! Defines the repository configuration: which endpoint to talk to, in which dialect,
//! and how the HTTP client should behave.

use crate::dialect::Dialect;
use crate::errors::RepoError;
use anyhow::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// How credentials are presented to the endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// HTTP digest authentication, answered after the server's 401 challenge.
    #[default]
    Digest,
    /// HTTP basic authentication sent with every request. The password travels in
    /// clear text unless the endpoint is https.
    Basic,
}

impl std::fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AuthScheme::Digest => write!(f, "digest"),
            AuthScheme::Basic => write!(f, "basic"),
        }
    }
}

impl std::str::FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "digest" => Ok(AuthScheme::Digest),
            "basic" => Ok(AuthScheme::Basic),
            _ => Err(format!("Unknown authentication scheme: {}", s)),
        }
    }
}

/// Username and password for the endpoint.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub scheme: AuthScheme,
}

impl Credentials {
    /// Credentials answered with HTTP digest authentication.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
            scheme: AuthScheme::Digest,
        }
    }

    pub fn with_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("scheme", &self.scheme)
            .finish()
    }
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct RepoConfig {
    /// Absolute http(s) URL of the SPARQL endpoint.
    #[builder(setter(into))]
    pub endpoint: String,
    #[builder(default = "Dialect::Sparql")]
    #[serde(default = "default_dialect")]
    pub dialect: Dialect,
    // wall-clock limit on a whole round trip; None keeps the client default
    #[builder(setter(into, strip_option), default)]
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[builder(setter(strip_option), default)]
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_dialect() -> Dialect {
    Dialect::Sparql
}

fn parse_endpoint(endpoint: &str) -> Result<Url, RepoError> {
    let url = Url::parse(endpoint)
        .map_err(|e| RepoError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(RepoError::Config(format!(
            "endpoint {:?} is not an absolute http(s) URL",
            endpoint
        )));
    }
    Ok(url)
}

fn check_timeout(timeout_secs: Option<u64>) -> Result<(), RepoError> {
    if timeout_secs == Some(0) {
        return Err(RepoError::Config(
            "timeout must be at least one second".to_string(),
        ));
    }
    Ok(())
}

impl RepoConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            parse_endpoint(endpoint).map_err(|e| e.to_string())?;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            check_timeout(timeout_secs).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl RepoConfig {
    pub fn builder() -> RepoConfigBuilder {
        RepoConfigBuilder::default()
    }

    /// Shorthand for an unauthenticated config without a timeout.
    pub fn new(endpoint: impl Into<String>, dialect: Dialect) -> Result<Self, RepoError> {
        RepoConfig::builder()
            .endpoint(endpoint)
            .dialect(dialect)
            .build()
            .map_err(|e| RepoError::Config(e.to_string()))
    }

    /// Applies the builder's checks to an already constructed config.
    pub fn validate(&self) -> Result<(), RepoError> {
        parse_endpoint(&self.endpoint)?;
        check_timeout(self.timeout_secs)
    }

    pub fn endpoint_url(&self) -> Result<Url, RepoError> {
        parse_endpoint(&self.endpoint)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    /// Loads a JSON config, rejecting anything the builder would reject.
    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let config: RepoConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_and_validation() {
        let config = RepoConfig::builder()
            .endpoint("http://localhost:3030/ds/sparql")
            .build()
            .unwrap();
        assert_eq!(config.dialect, Dialect::Sparql);
        assert_eq!(config.timeout(), None);
        assert!(config.credentials.is_none());

        let config = RepoConfig::builder()
            .endpoint("https://db.example.org/sparql")
            .dialect(Dialect::Oracle)
            .timeout_secs(5u64)
            .credentials(Credentials::new("admin", "secret"))
            .build()
            .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert!(!format!("{:?}", config).contains("secret"));

        assert!(RepoConfig::builder().build().is_err());
        assert!(RepoConfig::builder().endpoint("not a url").build().is_err());
        assert!(RepoConfig::builder()
            .endpoint("ftp://example.org/sparql")
            .build()
            .is_err());
        assert!(RepoConfig::builder()
            .endpoint("http://example.org/sparql")
            .timeout_secs(0u64)
            .build()
            .is_err());
    }

    #[test]
    fn file_round_trip_and_dialect_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.json");
        let config = RepoConfig::new("http://localhost:7200/repositories/x", Dialect::Ontotext)
            .unwrap();
        config.save_to_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"ontotext\""));
        assert_eq!(RepoConfig::from_file(&path).unwrap(), config);

        std::fs::write(
            &path,
            r#"{"endpoint": "http://localhost/sparql", "dialect": "virtuoso"}"#,
        )
        .unwrap();
        let err = RepoConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("virtuoso"));

        std::fs::write(&path, r#"{"endpoint": "http://localhost/sparql"}"#).unwrap();
        assert_eq!(
            RepoConfig::from_file(&path).unwrap().dialect,
            Dialect::Sparql
        );
    }

    #[test]
    fn file_is_validated_like_the_builder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.json");

        std::fs::write(
            &path,
            r#"{"endpoint": "http://localhost/sparql", "timeout_secs": 0}"#,
        )
        .unwrap();
        let err = RepoConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("timeout"), "{}", err);

        std::fs::write(&path, r#"{"endpoint": "ftp://localhost/sparql"}"#).unwrap();
        assert!(RepoConfig::from_file(&path).is_err());

        std::fs::write(
            &path,
            r#"{"endpoint": "http://localhost/sparql", "timeout_secs": 3}"#,
        )
        .unwrap();
        assert_eq!(RepoConfig::from_file(&path).unwrap().timeout_secs, Some(3));
    }

    #[test]
    fn credentials_default_to_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.json");
        std::fs::write(
            &path,
            r#"{"endpoint": "http://localhost/sparql",
                "credentials": {"username": "admin", "password": "root"}}"#,
        )
        .unwrap();
        let config = RepoConfig::from_file(&path).unwrap();
        let creds = config.credentials.unwrap();
        assert_eq!(creds.scheme, AuthScheme::Digest);
        assert_eq!(creds, Credentials::new("admin", "root"));

        let basic = Credentials::new("admin", "root").with_scheme(AuthScheme::Basic);
        let written = serde_json::to_string(&basic).unwrap();
        assert!(written.contains("\"basic\""), "{}", written);
        assert_eq!("BASIC".parse::<AuthScheme>(), Ok(AuthScheme::Basic));
        assert!("ntlm".parse::<AuthScheme>().is_err());
    }
}
