//! URI pattern matching for resource reads.

use crate::BridgeError;

/// How a resource pattern claims and binds a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriPattern {
    /// Matches one literal URI, binds nothing.
    Exact(&'static str),
    /// `uri.split('/')` must start with `prefix`'s segments and have at least
    /// `min_segments` segments; the segment at `index` is bound.
    Segmented {
        prefix: &'static str,
        min_segments: usize,
        index: usize,
    },
    /// Strip a literal prefix; the remainder is bound.
    Prefix(&'static str),
}

impl UriPattern {
    /// Whether this pattern takes responsibility for the URI.
    ///
    /// Claiming is separate from binding: a claimed URI that fails to bind is
    /// malformed, not unknown.
    pub fn claims(&self, uri: &str) -> bool {
        match self {
            UriPattern::Exact(literal) => uri == *literal,
            UriPattern::Segmented { prefix, .. } | UriPattern::Prefix(prefix) => {
                uri.starts_with(prefix)
            }
        }
    }

    /// Extract the bound variable, if any.
    pub fn bind(&self, uri: &str) -> Result<Option<String>, BridgeError> {
        match self {
            UriPattern::Exact(literal) => {
                if uri == *literal {
                    Ok(None)
                } else {
                    Err(invalid(uri, "does not match"))
                }
            }
            UriPattern::Segmented {
                min_segments,
                index,
                ..
            } => {
                let segments: Vec<&str> = uri.split('/').collect();
                if segments.len() < *min_segments {
                    return Err(invalid(
                        uri,
                        &format!(
                            "expected at least {} segments, got {}",
                            min_segments,
                            segments.len()
                        ),
                    ));
                }
                match segments.get(*index).filter(|s| !s.is_empty()) {
                    Some(value) => Ok(Some(value.to_string())),
                    None => Err(invalid(uri, "empty identifier")),
                }
            }
            UriPattern::Prefix(prefix) => match uri.strip_prefix(prefix) {
                Some(rest) if !rest.is_empty() => Ok(Some(rest.to_string())),
                Some(_) => Err(invalid(uri, "empty identifier")),
                None => Err(invalid(uri, "prefix mismatch")),
            },
        }
    }
}

fn invalid(uri: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidUri {
        uri: uri.to_string(),
        reason: reason.to_string(),
    }
}
