//! Route patterns exempt from authentication.
//!
//! Patterns use router template syntax: literal text, `{name}` for exactly
//! one path segment, and `{name:regex}` for a segment matched by `regex`
//! (which may span `/`). A pattern must match the whole path.

use std::borrow::Cow;
use std::fmt;

use regex::Regex;

/// A compiled skip-auth route pattern.
#[derive(Debug, Clone)]
pub struct SkipPattern {
    template: String,
    regex: Regex,
}

impl SkipPattern {
    /// Compiles a route template.
    pub fn new(template: &str) -> Result<Self, PatternError> {
        let source = template_to_regex(template)?;
        let regex = Regex::new(&source).map_err(|e| PatternError {
            template: template.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    /// Returns the template this pattern was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns true if `path` matches the whole pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Ordered set of skip-auth patterns.
#[derive(Debug, Clone, Default)]
pub struct SkipAuthMatcher {
    patterns: Vec<SkipPattern>,
}

impl SkipAuthMatcher {
    /// Compiles every template, failing on the first invalid one.
    pub fn new<I, S>(templates: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = templates
            .into_iter()
            .map(|t| SkipPattern::new(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Returns the compiled patterns in configuration order.
    pub fn patterns(&self) -> &[SkipPattern] {
        &self.patterns
    }

    /// Returns the first pattern matching the request path, if any.
    ///
    /// The path is percent-decoded before matching; a path that does not
    /// decode to UTF-8 is matched as-is.
    pub fn find(&self, path: &str) -> Option<&SkipPattern> {
        let decoded = urlencoding::decode(path).unwrap_or(Cow::Borrowed(path));
        self.patterns.iter().find(|p| p.is_match(&decoded))
    }

    /// Returns true if the request path skips authentication.
    pub fn is_match(&self, path: &str) -> bool {
        self.find(path).is_some()
    }
}

/// Translates a route template into an anchored regular expression.
fn template_to_regex(template: &str) -> Result<String, PatternError> {
    let error = |reason: &str| PatternError {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    let mut source = String::from("^");
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        source.push_str(&regex::escape(&rest[..open]));

        // Find the matching close brace; the variable's regex may itself
        // contain balanced braces such as `{3}`.
        let mut depth = 0usize;
        let mut close = None;
        for (i, ch) in rest[open..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close.ok_or_else(|| error("unbalanced braces"))?;

        let variable = &rest[open + 1..close];
        let (name, pattern) = match variable.split_once(':') {
            Some((name, pattern)) => (name, pattern),
            None => (variable, "[^/]+"),
        };
        if name.is_empty() {
            return Err(error("missing variable name"));
        }
        if pattern.is_empty() {
            return Err(error("empty variable pattern"));
        }

        source.push_str("(?:");
        source.push_str(pattern);
        source.push(')');
        rest = &rest[close + 1..];
    }

    if rest.contains('}') {
        return Err(error("unbalanced braces"));
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    Ok(source)
}

/// An invalid skip-auth pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub template: String,
    pub reason: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid skip-auth pattern '{}': {}",
            self.template, self.reason
        )
    }
}

impl std::error::Error for PatternError {}
