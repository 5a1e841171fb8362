//! Media types understood by the repository: the SPARQL results JSON format used for
//! SELECT/ASK answers and the graph serializations accepted for CONSTRUCT answers.

use oxigraph::io::RdfFormat;
use std::fmt;
use std::str::FromStr;

pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Serializations a CONSTRUCT request may ask for in its `Accept` header.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GraphFormat {
    Turtle,
    NQuads,
    RdfXml,
    TriX,
    TriG,
    N3,
    RdfJson,
    BinaryRdf,
    /// `text/plain`, which triple stores answer with N-Triples.
    PlainText,
}

impl GraphFormat {
    pub const ALL: [GraphFormat; 9] = [
        GraphFormat::Turtle,
        GraphFormat::NQuads,
        GraphFormat::RdfXml,
        GraphFormat::TriX,
        GraphFormat::TriG,
        GraphFormat::N3,
        GraphFormat::RdfJson,
        GraphFormat::BinaryRdf,
        GraphFormat::PlainText,
    ];

    pub fn media_type(self) -> &'static str {
        match self {
            GraphFormat::Turtle => "text/turtle",
            GraphFormat::NQuads => "application/n-quads",
            GraphFormat::RdfXml => "application/rdf+xml",
            GraphFormat::TriX => "application/trix",
            GraphFormat::TriG => "application/x-trig",
            GraphFormat::N3 => "text/rdf+n3",
            GraphFormat::RdfJson => "application/rdf+json",
            GraphFormat::BinaryRdf => "application/x-binary-rdf",
            GraphFormat::PlainText => "text/plain",
        }
    }

    /// The oxigraph parser for this format, if there is one.
    pub fn rdf_format(self) -> Option<RdfFormat> {
        match self {
            GraphFormat::Turtle => Some(RdfFormat::Turtle),
            GraphFormat::NQuads => Some(RdfFormat::NQuads),
            GraphFormat::RdfXml => Some(RdfFormat::RdfXml),
            GraphFormat::TriG => Some(RdfFormat::TriG),
            GraphFormat::N3 => Some(RdfFormat::N3),
            GraphFormat::PlainText => Some(RdfFormat::NTriples),
            GraphFormat::TriX | GraphFormat::RdfJson | GraphFormat::BinaryRdf => None,
        }
    }

    /// Looks up a format by media type, ignoring parameters such as `charset`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or(media_type).trim();
        GraphFormat::ALL
            .into_iter()
            .find(|f| f.media_type().eq_ignore_ascii_case(essence))
    }
}

impl fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.media_type())
    }
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GraphFormat::from_media_type(s).ok_or_else(|| format!("Unknown graph format: {}", s))
    }
}

/// True when `accept` asks for SPARQL results JSON rather than a graph.
pub fn is_results_json(accept: &str) -> bool {
    accept
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(SPARQL_RESULTS_JSON))
        .unwrap_or(false)
}
