//! Path patterns - Tokenized route paths with `:name` captures.
//!
//! A pattern is split on `/` into segments, each either a literal or a named
//! parameter. Empty segments are ignored on both sides, so `/user/42/` and
//! `/user/42` are the same path and `/` has no segments at all.
//!
//! ```ignore
//! let pattern = PathPattern::parse("/user/:id");
//! let params = pattern.match_path("/user/42").unwrap();
//! assert_eq!(params["id"], "42");
//! ```

use std::fmt;

use indexmap::IndexMap;

/// Captured parameters, in pattern order.
pub type Params = IndexMap<String, String>;

/// One `/`-separated piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(String),
    /// Matches any single non-empty path segment and captures it.
    Param(String),
}

/// A parsed route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PathPattern {
    /// Tokenize `pattern`. A `:` followed by a name is a capture; a bare `:`
    /// is a literal.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .into_iter()
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self {
            source: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match the whole of `path`.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let segments = split_path(path);
        match self.match_prefix(&segments) {
            Some((params, consumed)) if consumed == segments.len() => Some(params),
            _ => None,
        }
    }

    /// Match the leading segments of an already split path.
    ///
    /// Returns the captures and how many segments were consumed. This is how
    /// nested routes extend a parent's match to the rest of the path.
    pub fn match_prefix(&self, path: &[&str]) -> Option<(Params, usize)> {
        if path.len() < self.segments.len() {
            return None;
        }

        let mut params = Params::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }
        Some((params, self.segments.len()))
    }

    /// Append `child`'s segments to this pattern.
    pub fn join(&self, child: &PathPattern) -> PathPattern {
        let mut segments = self.segments.clone();
        segments.extend(child.segments.iter().cloned());

        let mut source = String::new();
        for segment in &segments {
            source.push('/');
            match segment {
                Segment::Literal(literal) => source.push_str(literal),
                Segment::Param(name) => {
                    source.push(':');
                    source.push_str(name);
                }
            }
        }
        if source.is_empty() {
            source.push('/');
        }
        PathPattern { source, segments }
    }
}

/// Split a path into its non-empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}
