//! Decoder for `application/sparql-results+json` responses (SELECT and ASK answers).

use crate::errors::DecodeError;
use log::debug;
use oxigraph::model::{BlankNode, Literal, NamedNode, Term};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{BufReader, Read};
use std::sync::Arc;

#[derive(Deserialize)]
struct RawResults {
    head: Option<RawHead>,
    results: Option<RawBindings>,
    boolean: Option<bool>,
}

#[derive(Deserialize)]
struct RawHead {
    #[serde(default)]
    vars: Vec<String>,
    #[serde(default)]
    link: Vec<String>,
}

#[derive(Deserialize)]
struct RawBindings {
    bindings: Vec<HashMap<String, RawTerm>>,
}

#[derive(Deserialize)]
struct RawTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
    datatype: Option<String>,
}

impl RawTerm {
    fn into_term(self) -> Result<Term, DecodeError> {
        match self.kind.as_str() {
            "uri" => Ok(named_node(self.value)?.into()),
            "bnode" => Ok(blank_node(self.value)?.into()),
            // typed-literal is the SPARQL 1.0 spelling, still sent by some stores
            "literal" | "typed-literal" => {
                if let Some(lang) = self.lang {
                    Literal::new_language_tagged_literal(self.value, &lang)
                        .map(Term::from)
                        .map_err(|e| {
                            DecodeError::Invalid(format!("invalid language tag {:?}: {}", lang, e))
                        })
                } else if let Some(datatype) = self.datatype {
                    Ok(Literal::new_typed_literal(self.value, named_node(datatype)?).into())
                } else {
                    Ok(Literal::new_simple_literal(self.value).into())
                }
            }
            other => Err(DecodeError::Invalid(format!(
                "unknown term type {:?}",
                other
            ))),
        }
    }
}

fn named_node(iri: String) -> Result<NamedNode, DecodeError> {
    NamedNode::new(iri.as_str())
        .map_err(|e| DecodeError::Invalid(format!("invalid IRI <{}>: {}", iri, e)))
}

/// Blank node labels are opaque to clients, so any non-empty label is kept as the
/// server sent it (Virtuoso answers with labels like `nodeID://b10006`).
fn blank_node(label: String) -> Result<BlankNode, DecodeError> {
    if label.is_empty() {
        return Err(DecodeError::Invalid("empty blank node label".to_string()));
    }
    match BlankNode::new(label.as_str()) {
        Ok(node) => Ok(node),
        Err(e) => {
            debug!("Keeping non N-Triples blank node label {:?}: {}", label, e);
            Ok(BlankNode::new_unchecked(label))
        }
    }
}

/// One solution of a SELECT query. Unbound variables have no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    variables: Arc<[String]>,
    values: Vec<Option<Term>>,
}

impl Binding {
    pub fn get(&self, variable: &str) -> Option<&Term> {
        let idx = self.variables.iter().position(|v| v == variable)?;
        self.values[idx].as_ref()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.get(variable).is_some()
    }

    /// Bound `(variable, term)` pairs in the order the variables were declared.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.variables
            .iter()
            .zip(self.values.iter())
            .filter_map(|(var, value)| value.as_ref().map(|term| (var.as_str(), term)))
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A decoded SPARQL results document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    variables: Arc<[String]>,
    rows: Vec<Binding>,
    boolean: Option<bool>,
    links: Vec<String>,
}

impl ResultSet {
    /// Projected variable names, in declared order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[Binding] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Binding> {
        self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The answer of an ASK query; `None` for SELECT results.
    pub fn boolean(&self) -> Option<bool> {
        self.boolean
    }

    /// Links to metadata documents listed in `head.link`.
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Column view: every declared variable mapped to the terms bound to it, in row order.
    pub fn bindings(&self) -> HashMap<String, Vec<Term>> {
        let mut columns: HashMap<String, Vec<Term>> = self
            .variables
            .iter()
            .map(|v| (v.clone(), Vec::new()))
            .collect();
        for row in &self.rows {
            for (var, term) in row.iter() {
                if let Some(column) = columns.get_mut(var) {
                    column.push(term.clone());
                }
            }
        }
        columns
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Parses a SPARQL 1.1 results JSON document.
///
/// `head` is required. `results` is required unless the document is an ASK answer
/// carrying `boolean`. A binding for a variable missing from `head.vars`, or a term
/// that does not describe a valid IRI, literal or non-empty blank node label, fails the whole
/// document rather than dropping the row.
pub fn decode<R: Read>(reader: R) -> Result<ResultSet, DecodeError> {
    let raw: RawResults = serde_json::from_reader(BufReader::new(reader))?;
    let head = raw
        .head
        .ok_or_else(|| DecodeError::Invalid("missing \"head\" object".to_string()))?;
    let variables: Arc<[String]> = head.vars.into();

    let raw_rows = match (raw.results, raw.boolean) {
        (Some(results), _) => results.bindings,
        (None, Some(_)) => Vec::new(),
        (None, None) => {
            return Err(DecodeError::Invalid(
                "missing \"results\" object".to_string(),
            ))
        }
    };

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (idx, raw_row) in raw_rows.into_iter().enumerate() {
        let mut values: Vec<Option<Term>> = vec![None; variables.len()];
        for (name, raw_term) in raw_row {
            let Some(pos) = variables.iter().position(|v| *v == name) else {
                return Err(DecodeError::Invalid(format!(
                    "row {} binds undeclared variable ?{}",
                    idx, name
                )));
            };
            values[pos] = Some(raw_term.into_term()?);
        }
        rows.push(Binding {
            variables: variables.clone(),
            values,
        });
    }
    debug!(
        "Decoded {} rows over {} variables",
        rows.len(),
        variables.len()
    );

    Ok(ResultSet {
        variables,
        rows,
        boolean: raw.boolean,
        links: head.link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(iri: &str) -> Term {
        NamedNode::new(iri).unwrap().into()
    }

    #[test]
    fn decodes_select_rows_in_declared_order() {
        let body = r#"{
            "head": {"vars": ["s", "p", "o"]},
            "results": {"bindings": [
                {"o": {"type": "literal", "value": "c"},
                 "s": {"type": "uri", "value": "http://a"},
                 "p": {"type": "uri", "value": "http://b"}}
            ]}
        }"#;
        let results = decode(body.as_bytes()).unwrap();
        assert_eq!(results.variables(), ["s", "p", "o"]);
        assert_eq!(results.len(), 1);
        let row = &results.rows()[0];
        let pairs: Vec<(&str, &Term)> = row.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("s", &uri("http://a")),
                ("p", &uri("http://b")),
                ("o", &Term::from(Literal::new_simple_literal("c"))),
            ]
        );
        assert_eq!(results.boolean(), None);
    }

    #[test]
    fn unbound_variables_are_absent() {
        let body = r#"{
            "head": {"vars": ["s", "o"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": "http://a"}},
                {"s": {"type": "bnode", "value": "b0"}, "o": {"type": "literal", "value": "x"}}
            ]}
        }"#;
        let results = decode(body.as_bytes()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results.rows()[0].contains("o"));
        assert_eq!(results.rows()[0].len(), 1);
        assert!(results.rows()[1].contains("o"));
        assert_eq!(results.bindings()["o"].len(), 1);
        assert_eq!(results.bindings()["s"].len(), 2);
    }

    #[test]
    fn server_specific_blank_node_labels_are_kept() {
        let body = r#"{
            "head": {"vars": ["s", "o"]},
            "results": {"bindings": [
                {"s": {"type": "bnode", "value": "nodeID://b10006"}, "o": {"type": "bnode", "value": "b1"}}
            ]}
        }"#;
        let results = decode(body.as_bytes()).unwrap();
        let row = &results.rows()[0];
        let Some(Term::BlankNode(s)) = row.get("s") else {
            panic!("expected blank node");
        };
        assert_eq!(s.as_str(), "nodeID://b10006");
        assert_eq!(row.get("o"), Some(&BlankNode::new("b1").unwrap().into()));
    }

    #[test]
    fn literal_language_and_datatype() {
        let body = r#"{
            "head": {"vars": ["a", "b", "c"]},
            "results": {"bindings": [{
                "a": {"type": "literal", "value": "chat", "xml:lang": "fr"},
                "b": {"type": "literal", "value": "42", "datatype": "http://www.w3.org/2001/XMLSchema#integer"},
                "c": {"type": "typed-literal", "value": "1.5", "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}
            }]}
        }"#;
        let results = decode(body.as_bytes()).unwrap();
        let row = &results.rows()[0];
        assert_eq!(
            row.get("a"),
            Some(&Literal::new_language_tagged_literal("chat", "fr").unwrap().into())
        );
        let Some(Term::Literal(b)) = row.get("b") else {
            panic!("expected literal");
        };
        assert_eq!(b.value(), "42");
        assert_eq!(
            b.datatype().as_str(),
            "http://www.w3.org/2001/XMLSchema#integer"
        );
        let Some(Term::Literal(c)) = row.get("c") else {
            panic!("expected literal");
        };
        assert_eq!(
            c.datatype().as_str(),
            "http://www.w3.org/2001/XMLSchema#decimal"
        );
    }

    #[test]
    fn ask_answer_needs_no_results() {
        let results = decode(r#"{"head": {}, "boolean": true}"#.as_bytes()).unwrap();
        assert_eq!(results.boolean(), Some(true));
        assert!(results.is_empty());
        assert!(results.variables().is_empty());
    }

    #[test]
    fn head_links_are_kept() {
        let body = r#"{"head": {"vars": [], "link": ["http://example.org/meta"]}, "results": {"bindings": []}}"#;
        let results = decode(body.as_bytes()).unwrap();
        assert_eq!(results.links(), ["http://example.org/meta"]);
    }

    #[test]
    fn malformed_documents_fail() {
        let cases = [
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "uri""#,
            r#"{"results": {"bindings": []}}"#,
            r#"{"head": {"vars": ["s"]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "triple", "value": "x"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "uri"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"value": "http://a"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "uri", "value": "not an iri"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"x": {"type": "uri", "value": "http://a"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "literal", "value": "a", "xml:lang": "not a tag!"}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "bnode", "value": ""}}]}}"#,
            r#"{"head": {"vars": ["s"]}, "results": {"bindings": [{"s": {"type": "bnode"}}]}}"#,
        ];
        for body in cases {
            assert!(decode(body.as_bytes()).is_err(), "accepted {}", body);
        }
    }
}
