//! SQL `LIKE`-style name patterns used by catalog lookups.
//!
//! `%` matches any run of characters, `_` matches exactly one, and the search
//! string escape `\` makes the following character literal. Matching is case
//! sensitive and anchored at both ends.

use regex::Regex;

/// Escape character for metadata search strings.
pub const SEARCH_STRING_ESCAPE: char = '\\';

#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 8);
        // wildcards match line breaks too
        expr.push_str("(?s)^");
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                SEARCH_STRING_ESCAPE => match chars.next() {
                    Some(escaped) => expr.push_str(&regex::escape(&escaped.to_string())),
                    // trailing escape matches itself
                    None => expr.push_str(&regex::escape(&c.to_string())),
                },
                '%' => expr.push_str(".*"),
                '_' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        Ok(Self {
            source: pattern.to_string(),
            regex: Regex::new(&expr)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the pattern contains no unescaped wildcard.
    pub fn is_literal(&self) -> bool {
        let mut chars = self.source.chars();
        while let Some(c) = chars.next() {
            match c {
                SEARCH_STRING_ESCAPE => {
                    chars.next();
                }
                '%' | '_' => return false,
                _ => {}
            }
        }
        true
    }
}

/// Optional pattern argument: `None` means unconstrained.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter(Option<NamePattern>);

impl PatternFilter {
    pub fn new(pattern: Option<&str>) -> Result<Self, regex::Error> {
        Ok(Self(pattern.map(NamePattern::new).transpose()?))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.as_ref().map(|p| p.matches(name)).unwrap_or(true)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.is_none()
    }
}
