//! REST route patterns: `/`-delimited literal and `{name}` capture segments.

use std::fmt;

use crate::params::{percent_decode, PathParams};

/// One segment of a compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// Errors from parsing a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("route pattern must start with '/': {pattern}")]
    MissingLeadingSlash { pattern: String },
    #[error("route pattern has an empty segment: {pattern}")]
    EmptySegment { pattern: String },
    #[error("malformed capture segment '{segment}' in {pattern}")]
    MalformedCapture { pattern: String, segment: String },
    #[error("capture '{name}' appears twice in {pattern}")]
    DuplicateCapture { pattern: String, name: String },
}

/// A compiled route pattern such as `/v2/email/identities/{EmailIdentity}`.
///
/// Matching requires equal segment counts and exact literal equality; capture
/// segments accept any non-empty segment and record its percent-decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the pattern does not start with `/`, has
    /// empty segments, malformed braces or a repeated capture name.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(PatternError::MissingLeadingSlash {
                pattern: pattern.to_string(),
            });
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                segments.push(parse_segment(pattern, part)?);
            }
        }

        let mut names: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Capture(name) = segment {
                if names.contains(&name.as_str()) {
                    return Err(PatternError::DuplicateCapture {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                names.push(name);
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches a request path, returning the captured parameters on success.
    ///
    /// A single trailing `/` on the path is ignored.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let parts: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part && *literal != percent_decode(part) {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), percent_decode(part));
                }
            }
        }
        Some(params)
    }

    /// Whether two patterns accept exactly the same set of paths.
    ///
    /// Capture names are irrelevant: `/a/{x}` and `/a/{y}` overlap completely.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Capture(_), Segment::Capture(_)) => true,
                    _ => false,
                })
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(pattern: &str, part: &str) -> Result<Segment, PatternError> {
    if part.is_empty() {
        return Err(PatternError::EmptySegment {
            pattern: pattern.to_string(),
        });
    }
    let malformed = || PatternError::MalformedCapture {
        pattern: pattern.to_string(),
        segment: part.to_string(),
    };
    match part.strip_prefix('{') {
        Some(inner) => {
            let name = inner.strip_suffix('}').ok_or_else(malformed)?;
            if name.is_empty() || name.contains(['{', '}']) {
                return Err(malformed());
            }
            Ok(Segment::Capture(name.to_string()))
        }
        None if part.contains(['{', '}']) => Err(malformed()),
        None => Ok(Segment::Literal(part.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
