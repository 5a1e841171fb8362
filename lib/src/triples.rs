use crate::errors::DecodeError;
use crate::formats::GraphFormat;
use log::debug;
use oxigraph::io::RdfParser;
use oxigraph::model::{Quad, Triple};
use std::io::{Cursor, Read};

/// Buffers `reader` and parses it as `format`, collecting every quad in document order.
/// The first parser error aborts decoding.
pub fn decode<R: Read>(mut reader: R, format: GraphFormat) -> Result<Vec<Quad>, DecodeError> {
    let rdf_format = format
        .rdf_format()
        .ok_or(DecodeError::UnsupportedFormat(format))?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    let parser = RdfParser::from_format(rdf_format).for_reader(Cursor::new(bytes));
    let mut quads = Vec::new();
    for quad in parser {
        quads.push(quad?);
    }
    debug!("Decoded {} quads from {}", quads.len(), format);
    Ok(quads)
}

/// Like [`decode`], dropping graph names.
pub fn decode_triples<R: Read>(reader: R, format: GraphFormat) -> Result<Vec<Triple>, DecodeError> {
    Ok(decode(reader, format)?
        .into_iter()
        .map(|quad| Triple::new(quad.subject, quad.predicate, quad.object))
        .collect())
}
