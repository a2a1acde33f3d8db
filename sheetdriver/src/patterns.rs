//! Window-title matching rules.
//!
//! A [`TitlePattern`] matches a title when its text occurs in the title
//! (case-insensitively), or when the text is a valid regular expression that
//! finds a match in the title (also case-insensitively). A [`PatternSet`] is an
//! ordered list of patterns; earlier patterns take priority.

use crate::AutomationError;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Clone)]
pub struct TitlePattern {
    text: String,
    lowered: String,
    regex: Option<Regex>,
}

impl TitlePattern {
    /// Lenient constructor: the text is always usable as a substring, and is
    /// additionally used as a regex when it compiles as one.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let regex = RegexBuilder::new(&text).case_insensitive(true).build().ok();
        Self {
            lowered: text.to_lowercase(),
            text,
            regex,
        }
    }

    /// Substring-only pattern; regex metacharacters have no special meaning.
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            lowered: text.to_lowercase(),
            text,
            regex: None,
        }
    }

    /// Strict constructor that rejects text that is not a valid regex.
    pub fn regex(text: impl Into<String>) -> Result<Self, AutomationError> {
        let text = text.into();
        let regex = RegexBuilder::new(&text)
            .case_insensitive(true)
            .build()
            .map_err(|e| AutomationError::InvalidPattern(format!("{text}: {e}")))?;
        Ok(Self {
            lowered: text.to_lowercase(),
            text,
            regex: Some(regex),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// An empty pattern matches nothing, even though "" is a valid regex.
    pub fn matches(&self, title: &str) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.matches_substring(title)
            || self
                .regex
                .as_ref()
                .map(|re| re.is_match(title))
                .unwrap_or(false)
    }

    /// Plain case-insensitive containment, ignoring any regex reading.
    pub fn matches_substring(&self, title: &str) -> bool {
        !self.lowered.is_empty() && title.to_lowercase().contains(&self.lowered)
    }
}

impl PartialEq for TitlePattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.regex.is_some() == other.regex.is_some()
    }
}

impl Eq for TitlePattern {}

impl fmt::Debug for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TitlePattern").field(&self.text).finish()
    }
}

impl fmt::Display for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for TitlePattern {
    fn from(s: &str) -> Self {
        TitlePattern::new(s)
    }
}

impl From<String> for TitlePattern {
    fn from(s: String) -> Self {
        TitlePattern::new(s)
    }
}

impl Serialize for TitlePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for TitlePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TitlePattern::new)
    }
}

/// Ordered list of title patterns. First match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternSet(Vec<TitlePattern>);

impl PatternSet {
    pub fn new(patterns: Vec<TitlePattern>) -> Self {
        Self(patterns)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TitlePattern> {
        self.0.iter()
    }

    /// Earliest pattern in set order that matches `title`.
    pub fn first_match(&self, title: &str) -> Option<&TitlePattern> {
        self.0.iter().find(|p| p.matches(title))
    }

    /// Like [`first_match`](Self::first_match) but with substring semantics only.
    pub fn first_substring_match(&self, title: &str) -> Option<&TitlePattern> {
        self.0.iter().find(|p| p.matches_substring(title))
    }
}

impl fmt::Display for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(|p| p.as_str()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl From<&str> for PatternSet {
    fn from(s: &str) -> Self {
        PatternSet(vec![TitlePattern::new(s)])
    }
}

impl From<Vec<TitlePattern>> for PatternSet {
    fn from(patterns: Vec<TitlePattern>) -> Self {
        PatternSet(patterns)
    }
}

impl From<&[&str]> for PatternSet {
    fn from(items: &[&str]) -> Self {
        PatternSet(items.iter().map(|s| TitlePattern::new(*s)).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PatternSet {
    fn from(items: [&str; N]) -> Self {
        PatternSet(items.iter().map(|s| TitlePattern::new(*s)).collect())
    }
}

impl From<Vec<&str>> for PatternSet {
    fn from(items: Vec<&str>) -> Self {
        PatternSet(items.into_iter().map(TitlePattern::new).collect())
    }
}

impl FromIterator<TitlePattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = TitlePattern>>(iter: I) -> Self {
        PatternSet(iter.into_iter().collect())
    }
}
