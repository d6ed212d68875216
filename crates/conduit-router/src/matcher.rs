//! Path pattern parsing and matching
//!
//! Patterns are `/`-delimited. A segment is either a literal or a parameter
//! written `{name}` or `{name:regex}`. Parameter constraints are compiled once
//! when the pattern is parsed.

use conduit_core::{Error, Result};
use regex::Regex;

/// One segment of a parsed pattern
#[derive(Debug, Clone)]
pub enum Segment {
    /// Must equal the request segment exactly
    Literal(String),
    /// Captures the request segment under `name`
    Param {
        /// Parameter name
        name: String,
        /// Optional constraint the captured value must satisfy
        constraint: Option<Regex>,
    },
}

impl Segment {
    /// Parse a single segment
    fn parse(pattern: &str, raw: &str) -> Result<Self> {
        let Some((name, expr)) = split_param(raw) else {
            return Ok(Segment::Literal(raw.to_string()));
        };

        let constraint = match expr {
            Some(expr) if !expr.is_empty() => {
                Some(Regex::new(expr).map_err(|e| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("constraint for '{name}': {e}"),
                })?)
            }
            _ => None,
        };

        Ok(Segment::Param {
            name: name.to_string(),
            constraint,
        })
    }

    /// Match one request segment, returning the capture for parameters
    fn accept<'a>(&'a self, value: &'a str) -> Option<Option<(&'a str, &'a str)>> {
        match self {
            Segment::Literal(literal) => (literal == value).then_some(None),
            Segment::Param { name, constraint } => match constraint {
                Some(re) if !re.is_match(value) => None,
                _ => Some(Some((name.as_str(), value))),
            },
        }
    }
}

/// Split `{name}` / `{name:expr}` into its parts; `None` for literals
fn split_param(raw: &str) -> Option<(&str, Option<&str>)> {
    let inner = raw.strip_prefix('{')?.strip_suffix('}')?;
    let (name, expr) = match inner.split_once(':') {
        Some((name, expr)) => (name, Some(expr)),
        None => (inner, None),
    };

    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid_name.then_some((name, expr))
}

/// A compiled path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// Original pattern
    pattern: String,

    /// Segments in order, including the empty leading segment of absolute paths
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern
    ///
    /// Patterns:
    /// - `/users` - literal path
    /// - `/articles/{slug}` - unconstrained parameter
    /// - `/items/{id:^[0-9]+$}` - parameter constrained by a regex
    pub fn parse(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let segments = pattern
            .split('/')
            .map(|raw| Segment::parse(&pattern, raw))
            .collect::<Result<Vec<_>>>()?;

        let mut names: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        if names.len() != total {
            return Err(Error::InvalidPattern {
                pattern,
                reason: "duplicate parameter name".to_string(),
            });
        }

        Ok(Self { pattern, segments })
    }

    /// Match a request path
    ///
    /// The path is accepted only if it has as many segments as the pattern and
    /// every segment matches. Returns the captured parameters in pattern order.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let mut params = Vec::new();
        let mut parts = path.split('/');

        for segment in &self.segments {
            let part = parts.next()?;
            if let Some((name, value)) = segment.accept(part)? {
                params.push((name.to_string(), value.to_string()));
            }
        }

        // Longer request path
        if parts.next().is_some() {
            return None;
        }

        Some(params)
    }

    /// Get the pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Is this a literal path (no params)?
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_static_path() {
        let pattern = PathPattern::parse("/api/tags").unwrap();
        assert!(pattern.is_static());

        assert_eq!(pattern.matches("/api/tags").unwrap().len(), 0);
        assert!(pattern.matches("/api/tag").is_none());
        assert!(pattern.matches("/api/tags/x").is_none());
        assert!(pattern.matches("/api").is_none());
    }

    #[test]
    fn test_single_param() {
        let pattern = PathPattern::parse("/api/articles/{slug}").unwrap();
        assert_eq!(pattern.param_names(), vec!["slug"]);

        let params = pattern.matches("/api/articles/how-to-train").unwrap();
        assert_eq!(param(&params, "slug"), Some("how-to-train"));

        assert!(pattern.matches("/api/articles").is_none());
    }

    #[test]
    fn test_mismatch_in_any_position_rejects() {
        let pattern = PathPattern::parse("/api/profiles/{username}/follow").unwrap();

        assert!(pattern.matches("/api/profiles/jake/follow").is_some());
        // Mismatch before the parameter
        assert!(pattern.matches("/api/profile/jake/follow").is_none());
        // Mismatch in a middle literal with a matching tail
        assert!(pattern.matches("/x/profiles/jake/follow").is_none());
        // Mismatch in the last segment
        assert!(pattern.matches("/api/profiles/jake/unfollow").is_none());
    }

    #[test]
    fn test_constrained_param() {
        let pattern = PathPattern::parse("/items/{id:^[0-9]+$}").unwrap();

        let params = pattern.matches("/items/42").unwrap();
        assert_eq!(param(&params, "id"), Some("42"));

        assert!(pattern.matches("/items/abc").is_none());
        assert!(pattern.matches("/items/4a").is_none());
    }

    #[test]
    fn test_constrained_param_followed_by_literal() {
        let pattern = PathPattern::parse("/articles/{id:^[0-9]+$}/comments").unwrap();

        assert!(pattern.matches("/articles/abc/comments").is_none());
        assert!(pattern.matches("/articles/7/comments").is_some());
    }

    #[test]
    fn test_multiple_params() {
        let pattern = PathPattern::parse("/api/articles/{slug}/comments/{id}").unwrap();

        let params = pattern.matches("/api/articles/dragons/comments/3").unwrap();
        assert_eq!(
            params,
            vec![
                ("slug".to_string(), "dragons".to_string()),
                ("id".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_constraint() {
        let err = PathPattern::parse("/items/{id:[0-9}").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_param_name() {
        let err = PathPattern::parse("/a/{id}/b/{id}").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_malformed_braces_are_literal() {
        let pattern = PathPattern::parse("/a/{b").unwrap();
        assert!(pattern.is_static());
        assert!(pattern.matches("/a/{b").is_some());
    }
}
