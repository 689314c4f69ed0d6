//! Path parsing and canonical form
//!
//! Remote paths address repository objects as a slash-delimited sequence of
//! `type/value` pairs, e.g. `/project/QIN/subject/Breast003/session/Session01`.
//! The leading project, subject and experiment type names may be omitted
//! (`/QIN/Breast003/Session01`). A trailing `/files` marker is accepted and
//! reported separately. Command-line arguments prefixed with `xnat:` are
//! remote; anything else is a local filesystem path.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};

use crate::error::{Error, Result};
use crate::schema::EntityType;

/// Prefix that marks a command-line argument as a remote path
pub const REMOTE_PREFIX: &str = "xnat:";

/// Types implied by position when the leading type names are omitted
const POSITIONAL_TYPES: [EntityType; 3] = [
    EntityType::Project,
    EntityType::Subject,
    EntityType::Experiment,
];

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// The value part of a path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    /// Exact object name
    Literal(String),
    /// Glob pattern over sibling names
    Pattern(Pattern),
}

impl Matcher {
    /// Classify a path value, compiling it when it holds `*` or `?`
    pub fn parse(value: &str) -> Result<Self> {
        if value.contains(['*', '?']) {
            Pattern::new(value)
                .map(Matcher::Pattern)
                .map_err(|e| Error::MalformedPath(format!("invalid pattern '{value}': {}", e.msg)))
        } else {
            Ok(Matcher::Literal(value.to_string()))
        }
    }

    /// The matcher that accepts every name
    pub fn any() -> Self {
        // A single star always compiles.
        Matcher::Pattern(Pattern::new("*").unwrap_or_default())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Matcher::Pattern(_))
    }

    /// The literal name, if this is not a pattern
    pub fn literal(&self) -> Option<&str> {
        match self {
            Matcher::Literal(name) => Some(name),
            Matcher::Pattern(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Matcher::Literal(name) => name,
            Matcher::Pattern(p) => p.as_str(),
        }
    }

    /// Case-sensitive match of an object name
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == name,
            Matcher::Pattern(p) => p.matches_with(name, GLOB_OPTIONS),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed path component
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub entity: EntityType,
    pub matcher: Matcher,
}

impl PathSegment {
    pub fn new(entity: EntityType, matcher: Matcher) -> Self {
        Self { entity, matcher }
    }

    /// A segment naming exactly one object
    pub fn literal(entity: EntityType, name: impl Into<String>) -> Self {
        Self {
            entity,
            matcher: Matcher::Literal(name.into()),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity, self.matcher)
    }
}

/// A validated remote path
///
/// The segment sequence always starts at a project and every step is
/// allowed by [`EntityType::can_contain`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XnatPath {
    segments: Vec<PathSegment>,
}

impl XnatPath {
    /// Validate a segment sequence against the schema nesting
    pub fn from_segments(segments: Vec<PathSegment>) -> Result<Self> {
        let Some(first) = segments.first() else {
            return Err(Error::MalformedPath("path is empty".into()));
        };
        if first.entity != EntityType::Project {
            return Err(Error::MalformedPath(format!(
                "path must start at a project, not a {}",
                first.entity
            )));
        }
        for pair in segments.windows(2) {
            if !pair[0].entity.can_contain(pair[1].entity) {
                return Err(Error::MalformedPath(format!(
                    "a {} cannot be placed under a {}",
                    pair[1].entity, pair[0].entity
                )));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The deepest segment
    pub fn last(&self) -> &PathSegment {
        // from_segments rejects empty sequences
        &self.segments[self.segments.len() - 1]
    }

    /// The type of object this path addresses
    pub fn terminal_type(&self) -> EntityType {
        self.last().entity
    }

    /// Whether any segment is a glob pattern
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| s.matcher.is_wildcard())
    }

    /// Append a segment, validating the nesting
    pub fn join(&self, segment: PathSegment) -> Result<Self> {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self::from_segments(segments)
    }

    /// The enclosing path, or `None` at the project level
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether this path lies strictly above `other`
    pub fn is_ancestor_of(&self, other: &XnatPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// The value of the first segment of the given type
    pub fn value_of(&self, entity: EntityType) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.entity == entity)
            .map(|s| s.matcher.as_str())
    }
}

impl fmt::Display for XnatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for XnatPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for XnatPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_path(s)
    }
}

/// A tokenized path together with its stripped `/files` marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    pub path: XnatPath,
    /// Whether the path ended with a bare `file`/`files` marker
    pub files_suffix: bool,
}

/// Tokenize a remote path string
///
/// Leading and trailing slashes are ignored. A trailing type name without a
/// value selects every child of that type, except `file`/`files`, which is
/// stripped and reported in [`Tokenized::files_suffix`].
pub fn tokenize(path: &str) -> Result<Tokenized> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::MalformedPath("path is empty".into()));
    }

    let items: Vec<&str> = trimmed.split('/').collect();
    if items.iter().any(|item| item.is_empty()) {
        return Err(Error::MalformedPath(format!("empty component in '{path}'")));
    }

    let mut segments = Vec::with_capacity(items.len());
    let mut rest = &items[..];

    // Shorthand: leading values without type names
    if EntityType::from_name(items[0]).is_none() {
        for entity in POSITIONAL_TYPES {
            match rest.first() {
                Some(item) if EntityType::from_name(item).is_none() => {
                    segments.push(PathSegment::new(entity, Matcher::parse(item)?));
                    rest = &rest[1..];
                }
                _ => break,
            }
        }
    }

    let mut files_suffix = false;
    while let Some((name, tail)) = rest.split_first() {
        let entity = EntityType::from_name(name).ok_or_else(|| {
            Error::MalformedPath(format!("'{name}' is not an XNAT object type in '{path}'"))
        })?;
        match tail.split_first() {
            Some((value, tail)) => {
                segments.push(PathSegment::new(entity, Matcher::parse(value)?));
                rest = tail;
            }
            None if entity == EntityType::File => {
                files_suffix = true;
                rest = tail;
            }
            None => {
                segments.push(PathSegment::new(entity, Matcher::any()));
                rest = tail;
            }
        }
    }

    let path = XnatPath::from_segments(segments)?;
    Ok(Tokenized { path, files_suffix })
}

/// Parse a remote path, discarding any `/files` marker
pub fn parse_path(path: &str) -> Result<XnatPath> {
    tokenize(path).map(|t| t.path)
}

/// A command-line location: either local or remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path
    Local(PathBuf),
    /// Repository path
    Remote(Tokenized),
}

impl Location {
    /// Check if this is a remote path
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Check if this is a local path
    pub fn is_local(&self) -> bool {
        matches!(self, Location::Local(_))
    }

    /// Get the remote path if this is a remote path
    pub fn as_remote(&self) -> Option<&Tokenized> {
        match self {
            Location::Remote(t) => Some(t),
            Location::Local(_) => None,
        }
    }

    /// Get the local path if this is a local path
    pub fn as_local(&self) -> Option<&PathBuf> {
        match self {
            Location::Local(p) => Some(p),
            Location::Remote(_) => None,
        }
    }
}

/// Parse a command-line argument into a [`Location`]
///
/// Arguments starting with `xnat:` are tokenized as remote paths.
pub fn parse_location(arg: &str) -> Result<Location> {
    if arg.is_empty() {
        return Err(Error::InvalidArgument("Path cannot be empty".into()));
    }
    match arg.strip_prefix(REMOTE_PREFIX) {
        Some(remote) => tokenize(remote).map(Location::Remote),
        None => Ok(Location::Local(PathBuf::from(arg))),
    }
}
