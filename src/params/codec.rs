//! Token codec for transform filenames.
//!
//! A transform filename has the shape `basename[,k_v]*.ext`, where each `k`
//! is a single letter from the [`Field`] table:
//!
//! ```text
//! demo,c_100,h_100,w_100.jpg
//! ^^^^ ^^^^^ ^^^^^ ^^^^^ ^^^
//! base  crop height width extension
//! ```
//!
//! Decoding never fails on an unknown or malformed token; such tokens are
//! dropped. Only a missing extension or base name is an error.

use crate::error::ThumbError;

use super::spec::Field;

/// A single recognized `letter_value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub field: Field,
    pub value: String,
}

/// A decoded transform filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedName {
    pub basename: String,
    /// Lower-cased extension
    pub extension: String,
    /// Recognized tokens in request order
    pub tokens: Vec<Token>,
}

impl DecodedName {
    /// The source filename this request refers to (`basename.ext`).
    pub fn source_filename(&self) -> String {
        format!("{}.{}", self.basename, self.extension)
    }
}

/// Decode a transform filename.
pub fn decode(name: &str) -> Result<DecodedName, ThumbError> {
    let (main, extension) = name
        .rsplit_once('.')
        .ok_or_else(|| ThumbError::InvalidRequest(format!("filename has no extension: '{}'", name)))?;
    if extension.is_empty() {
        return Err(ThumbError::InvalidRequest(format!(
            "filename has no extension: '{}'",
            name
        )));
    }

    let mut segments = main.split(',');
    let basename = segments.next().unwrap_or_default();
    if basename.is_empty() {
        return Err(ThumbError::InvalidRequest(format!(
            "filename has no base name: '{}'",
            name
        )));
    }

    let tokens = segments.filter_map(decode_token).collect();

    Ok(DecodedName {
        basename: basename.to_string(),
        extension: extension.to_ascii_lowercase(),
        tokens,
    })
}

/// Decode one `k_v` segment, or `None` if it is not a recognized token.
fn decode_token(segment: &str) -> Option<Token> {
    if segment.len() < 3 || segment.as_bytes()[1] != b'_' {
        return None;
    }
    let letter = segment.chars().next()?;
    let field = Field::from_letter(letter)?;
    // Index 1 is an ASCII underscore, so byte offset 2 is a char boundary
    let value = &segment[2..];
    Some(Token {
        field,
        value: value.to_string(),
    })
}

/// Encode a filename from field values.
///
/// Pairs are emitted in [`Field::ALL`] order regardless of input order, so
/// equal inputs always produce byte-identical output.
pub fn encode(basename: &str, extension: &str, pairs: &[(Field, String)]) -> String {
    let mut out = String::from(basename);
    for field in Field::ALL {
        for (_, value) in pairs.iter().filter(|(f, _)| *f == field) {
            out.push(',');
            out.push(field.letter());
            out.push('_');
            out.push_str(value);
        }
    }
    out.push('.');
    out.push_str(extension);
    out
}

// =============================================================================
// Tests
// =============================================================================
