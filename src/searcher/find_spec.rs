//! Find criteria: location segment matchers plus an entry type filter.

use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};

use crate::types::LOCATION_SEPARATOR;
use crate::{FileEntryType, VfsError};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// What to look for during a [`find`](super::FileSystemSearcher::find).
///
/// A location is split at `/` into segments; an entry matches when each
/// segment matches the entry's ancestor (or own) name at the same depth.
/// Without a location every entry of an allowed type matches.
///
/// Matching is case sensitive by default; the flag applies to literal, glob
/// and regex segments alike.
///
/// # Example
///
/// ```rust
/// use nestvfs::{FileEntryType, FindSpec};
///
/// let logs = FindSpec::new()
///     .location_glob("/var/log/*.gz")?
///     .entry_types([FileEntryType::File]);
///
/// let any_dir = FindSpec::new().entry_types([FileEntryType::Directory]);
/// let passwd = FindSpec::new().location("/etc/passwd").case_sensitive(false);
/// # let _ = (logs, any_dir, passwd);
/// # Ok::<(), nestvfs::VfsError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FindSpec {
    location: Option<Vec<Segment>>,
    entry_types: Option<Vec<FileEntryType>>,
    case_insensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(String),
    Regex(String),
}

impl FindSpec {
    /// Matches every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches the exact location.
    pub fn location(mut self, location: &str) -> Self {
        self.location = Some(
            split(location)
                .map(|s| Segment::Literal(s.to_string()))
                .collect(),
        );
        self
    }

    /// Matches a location with glob wildcards per segment: `*`, `?`, `[...]`
    /// and `{a,b}`. No wildcard crosses a `/`.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if a segment is not a valid glob
    pub fn location_glob(mut self, pattern: &str) -> Result<Self, VfsError> {
        let segments = split(pattern)
            .map(|s| {
                if s.contains(GLOB_META) {
                    compile_glob(s, false)?;
                    Ok(Segment::Glob(s.to_string()))
                } else {
                    Ok(Segment::Literal(s.to_string()))
                }
            })
            .collect::<Result<_, VfsError>>()?;
        self.location = Some(segments);
        Ok(self)
    }

    /// Matches a location with one regular expression per segment. Each
    /// expression must match the whole name.
    ///
    /// The pattern is split at every `/` before compiling, so no segment
    /// expression may contain one, not even inside a class: `/[^/]+` is
    /// rejected. Names never contain `/`, so `/.+` expresses the same thing.
    ///
    /// # Errors
    ///
    /// - [`VfsError::InvalidArgument`] if a segment is not a valid regex
    pub fn location_regex(mut self, pattern: &str) -> Result<Self, VfsError> {
        if separator_in_class(pattern) {
            return Err(VfsError::invalid_argument(
                "find spec",
                format!("regex {pattern:?}: '/' inside a character class"),
            ));
        }
        let segments = split(pattern)
            .map(|s| {
                compile_regex(s, false)?;
                Ok(Segment::Regex(s.to_string()))
            })
            .collect::<Result<_, VfsError>>()?;
        self.location = Some(segments);
        Ok(self)
    }

    /// Restricts matches to these entry types.
    pub fn entry_types(mut self, types: impl IntoIterator<Item = FileEntryType>) -> Self {
        self.entry_types = Some(types.into_iter().collect());
        self
    }

    /// Sets case sensitive matching (the default) on or off.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_insensitive = !case_sensitive;
        self
    }

    /// Returns `true` if the spec constrains the location.
    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    pub(super) fn compile(&self) -> Result<CompiledSpec, VfsError> {
        let segments = match &self.location {
            None => None,
            Some(segments) => Some(
                segments
                    .iter()
                    .map(|segment| self.compile_segment(segment))
                    .collect::<Result<_, _>>()?,
            ),
        };
        Ok(CompiledSpec {
            segments,
            entry_types: self.entry_types.clone(),
        })
    }

    fn compile_segment(&self, segment: &Segment) -> Result<Matcher, VfsError> {
        let ci = self.case_insensitive;
        Ok(match segment {
            Segment::Literal(name) if ci => Matcher::LiteralFolded(name.to_lowercase()),
            Segment::Literal(name) => Matcher::Literal(name.clone()),
            Segment::Glob(pattern) => Matcher::Glob(compile_glob(pattern, ci)?),
            Segment::Regex(pattern) => Matcher::Regex(compile_regex(pattern, ci)?),
        })
    }

    /// The joined location if it is made of case-sensitive literals only.
    pub(super) fn literal_location(&self) -> Option<String> {
        if self.case_insensitive {
            return None;
        }
        let segments = self.location.as_ref().filter(|s| !s.is_empty())?;
        let mut location = String::new();
        for segment in segments {
            let Segment::Literal(name) = segment else {
                return None;
            };
            location.push(LOCATION_SEPARATOR);
            location.push_str(name);
        }
        Some(location)
    }
}

fn split(location: &str) -> impl Iterator<Item = &str> {
    location
        .split(LOCATION_SEPARATOR)
        .filter(|segment| !segment.is_empty())
}

fn separator_in_class(pattern: &str) -> bool {
    let mut depth = 0usize;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            LOCATION_SEPARATOR if depth > 0 => return true,
            _ => {}
        }
    }
    false
}

fn compile_glob(pattern: &str, case_insensitive: bool) -> Result<GlobMatcher, VfsError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(case_insensitive)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| VfsError::invalid_argument("find spec", format!("glob {pattern:?}: {e}")))
}

fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, VfsError> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| VfsError::invalid_argument("find spec", format!("regex {pattern:?}: {e}")))
}

/// A find spec with its matchers built.
#[derive(Debug)]
pub(super) struct CompiledSpec {
    segments: Option<Vec<Matcher>>,
    entry_types: Option<Vec<FileEntryType>>,
}

#[derive(Debug)]
enum Matcher {
    Literal(String),
    LiteralFolded(String),
    Glob(GlobMatcher),
    Regex(Regex),
}

impl Matcher {
    fn is_match(&self, name: &str) -> bool {
        match self {
            Matcher::Literal(literal) => literal == name,
            Matcher::LiteralFolded(folded) => *folded == name.to_lowercase(),
            Matcher::Glob(glob) => glob.is_match(name),
            Matcher::Regex(regex) => regex.is_match(name),
        }
    }
}

impl CompiledSpec {
    /// Returns `true` if an entry at `depth` named `name` keeps this spec
    /// alive, given its ancestors did.
    pub(super) fn matches_segment(&self, depth: usize, name: &str) -> bool {
        match &self.segments {
            None => true,
            Some(segments) => depth
                .checked_sub(1)
                .and_then(|index| segments.get(index))
                .is_some_and(|matcher| matcher.is_match(name)),
        }
    }

    /// Returns `true` if every segment is consumed at `depth`.
    pub(super) fn is_complete(&self, depth: usize) -> bool {
        self.segments.as_ref().is_none_or(|s| s.len() == depth)
    }

    /// Returns `true` if entries below `depth` can still match.
    pub(super) fn descends_below(&self, depth: usize) -> bool {
        self.segments.as_ref().is_none_or(|s| s.len() > depth)
    }

    pub(super) fn accepts_type(&self, entry_type: FileEntryType) -> bool {
        self.entry_types
            .as_ref()
            .is_none_or(|types| types.contains(&entry_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_splits_into_literals() {
        let spec = FindSpec::new().location("/A/b.txt");
        assert_eq!(spec.literal_location().as_deref(), Some("/A/b.txt"));

        let compiled = spec.compile().unwrap();
        assert!(compiled.matches_segment(1, "A"));
        assert!(!compiled.matches_segment(1, "a"));
        assert!(compiled.matches_segment(2, "b.txt"));
        assert!(!compiled.matches_segment(3, "b.txt"));
        assert!(compiled.is_complete(2));
        assert!(!compiled.descends_below(2));
    }

    #[test]
    fn root_location_has_no_segments() {
        let compiled = FindSpec::new().location("/").compile().unwrap();
        assert!(compiled.is_complete(0));
        assert!(!compiled.descends_below(0));
        assert!(FindSpec::new().location("/").literal_location().is_none());
    }

    #[test]
    fn glob_segments_do_not_cross_separators() {
        let compiled = FindSpec::new().location_glob("/*.gz").unwrap().compile().unwrap();
        assert!(compiled.matches_segment(1, "log1.gz"));
        assert!(!compiled.matches_segment(1, "log1.txt"));
        assert!(!compiled.matches_segment(1, "a/b.gz"));
    }

    #[test]
    fn glob_without_wildcards_stays_literal() {
        let spec = FindSpec::new().location_glob("/var/*/syslog").unwrap();
        assert!(spec.literal_location().is_none());

        let spec = FindSpec::new().location_glob("/var/log").unwrap();
        assert_eq!(spec.literal_location().as_deref(), Some("/var/log"));
    }

    #[test]
    fn regex_must_match_whole_segment() {
        let compiled = FindSpec::new()
            .location_regex("/log[0-9]+")
            .unwrap()
            .compile()
            .unwrap();
        assert!(compiled.matches_segment(1, "log42"));
        assert!(!compiled.matches_segment(1, "log42.gz"));
        assert!(!compiled.matches_segment(1, "xlog4"));
    }

    #[test]
    fn case_flag_applies_to_all_matchers() {
        let literal = FindSpec::new().location("/Windows").case_sensitive(false);
        assert!(literal.literal_location().is_none());
        assert!(literal.compile().unwrap().matches_segment(1, "WINDOWS"));

        let glob = FindSpec::new()
            .location_glob("/sys*")
            .unwrap()
            .case_sensitive(false);
        assert!(glob.compile().unwrap().matches_segment(1, "System32"));

        let regex = FindSpec::new()
            .location_regex("/pagefile\\.sys")
            .unwrap()
            .case_sensitive(false);
        assert!(regex.compile().unwrap().matches_segment(1, "PAGEFILE.SYS"));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(matches!(
            FindSpec::new().location_glob("/[a"),
            Err(VfsError::InvalidArgument { .. })
        ));
        assert!(matches!(
            FindSpec::new().location_regex("/(unclosed"),
            Err(VfsError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn regex_segments_cannot_hold_separators() {
        assert!(matches!(
            FindSpec::new().location_regex("/var/[^/]+"),
            Err(VfsError::InvalidArgument { .. })
        ));
        assert!(matches!(
            FindSpec::new().location_regex("/[[:alpha:]/]"),
            Err(VfsError::InvalidArgument { .. })
        ));
        assert!(FindSpec::new().location_regex("/[a-z]+/\\[x\\]").is_ok());
        let compiled = FindSpec::new()
            .location_regex("/var/.+")
            .unwrap()
            .compile()
            .unwrap();
        assert!(compiled.matches_segment(2, "log"));
    }

    #[test]
    fn type_filter() {
        let compiled = FindSpec::new()
            .entry_types([FileEntryType::Link])
            .compile()
            .unwrap();
        assert!(compiled.accepts_type(FileEntryType::Link));
        assert!(!compiled.accepts_type(FileEntryType::File));
        assert!(compiled.is_complete(5));
        assert!(compiled.descends_below(5));
    }
}
