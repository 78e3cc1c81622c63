//! Regular expression patterns carried by policies.
//!
//! A `Pattern` serializes as its source text and compares by that text, so
//! it can sit inside persisted, structurally-compared policy graphs.

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use warden_core::error::PolicyError;

/// A compiled regular expression that remembers its source.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    source: String,
    search: Regex,
    full: Regex,
}

impl Pattern {
    /// Compile a pattern.
    pub fn new(source: impl Into<String>) -> Result<Self, PolicyError> {
        let source = source.into();
        let search = compile(&source, &source)?;
        let full = compile(&source, &format!("^(?:{})$", source))?;

        Ok(Self {
            source,
            search,
            full,
        })
    }

    /// The source text of this pattern.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern matches anywhere in `value`.
    pub fn is_match(&self, value: &str) -> bool {
        self.search.is_match(value)
    }

    /// Whether the pattern matches the whole of `value`.
    pub fn matches_fully(&self, value: &str) -> bool {
        self.full.is_match(value)
    }
}

fn compile(source: &str, expr: &str) -> Result<Regex, PolicyError> {
    Regex::new(expr).map_err(|e| PolicyError::InvalidPattern {
        pattern: source.to_string(),
        reason: e.to_string(),
    })
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Pattern {
    type Error = PolicyError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::new(source)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

/// Match `value` against a glob.
///
/// `**` matches any run of characters, `*` any run without `/`, and `?`
/// exactly one character. Everything else matches literally.
pub fn glob_matches(glob: &str, value: &str) -> bool {
    glob_regex(glob).is_ok_and(|re| re.is_match(value))
}

/// Compile a glob into an anchored regular expression.
pub fn glob_regex(glob: &str) -> Result<Regex, PolicyError> {
    let mut expr = String::with_capacity(glob.len() + 8);
    expr.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                expr.push_str(".*");
            }
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');

    compile(glob, &expr)
}

/// How a matcher interprets its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchSyntax {
    Glob,
    Regex,
}

/// A compiled service-id matcher.
pub(crate) struct CompiledMatcher {
    syntax: MatchSyntax,
    source: String,
    regex: Result<Regex, PolicyError>,
}

impl CompiledMatcher {
    fn compile(syntax: MatchSyntax, source: &str) -> Self {
        let regex = match syntax {
            MatchSyntax::Glob => glob_regex(source),
            MatchSyntax::Regex => compile(source, &format!("^(?:{})$", source)),
        };
        Self {
            syntax,
            source: source.to_string(),
            regex,
        }
    }

    /// Whether the whole of `value` matches; an invalid source matches nothing.
    pub(crate) fn is_match(&self, value: &str) -> bool {
        self.regex.as_ref().is_ok_and(|re| re.is_match(value))
    }

    /// The compilation error, if the source is invalid.
    pub(crate) fn error(&self) -> Option<&PolicyError> {
        self.regex.as_ref().err()
    }
}

/// Holds the last compiled matcher and recompiles only when the source changes.
///
/// Clones share the compiled matcher. Equality ignores the cache.
#[derive(Default)]
pub(crate) struct MatcherCache {
    compiled: RwLock<Option<Arc<CompiledMatcher>>>,
}

impl MatcherCache {
    /// The matcher for `source`; `on_compile` sees each fresh compilation.
    pub(crate) fn get(
        &self,
        syntax: MatchSyntax,
        source: &str,
        on_compile: impl FnOnce(&CompiledMatcher),
    ) -> Arc<CompiledMatcher> {
        if let Some(matcher) = self.compiled.read().as_ref() {
            if matcher.syntax == syntax && matcher.source == source {
                return Arc::clone(matcher);
            }
        }

        let matcher = Arc::new(CompiledMatcher::compile(syntax, source));
        on_compile(&matcher);
        *self.compiled.write() = Some(Arc::clone(&matcher));
        matcher
    }
}

impl Clone for MatcherCache {
    fn clone(&self) -> Self {
        Self {
            compiled: RwLock::new(self.compiled.read().clone()),
        }
    }
}

impl PartialEq for MatcherCache {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for MatcherCache {}

impl fmt::Debug for MatcherCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MatcherCache")
    }
}
