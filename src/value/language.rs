//! Content-language annotations (RFC 5646 shaped tags such as `en-US`).

use crate::error::InvalidValue;
use std::fmt;
use std::str::FromStr;

const MAX_SUBTAG_LEN: usize = 8;

/// A single language tag. Comparison is case-insensitive.
#[derive(Debug, Clone, Eq)]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn parse(tag: &str) -> Result<Self, InvalidValue> {
        let mut subtags = tag.split('-');
        let primary = subtags.next().unwrap_or_default();
        if !valid_subtag(primary, |c| c.is_ascii_alphabetic()) {
            return Err(InvalidValue::InvalidLanguageTag(tag.to_string()));
        }
        for subtag in subtags {
            if !valid_subtag(subtag, |c| c.is_ascii_alphanumeric()) {
                return Err(InvalidValue::InvalidLanguageTag(tag.to_string()));
            }
        }
        Ok(Self(tag.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag (`en` for `en-US`)
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or_default()
    }
}

fn valid_subtag(subtag: &str, allowed: impl Fn(char) -> bool) -> bool {
    !subtag.is_empty() && subtag.len() <= MAX_SUBTAG_LEN && subtag.chars().all(allowed)
}

impl PartialEq for LanguageTag {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ordered list of language tags describing the human language of string content.
///
/// Order is significant (most preferred first); duplicates are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageTags(Vec<LanguageTag>);

impl LanguageTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tags(tags: Vec<LanguageTag>) -> Result<Self, InvalidValue> {
        let mut list = Self::new();
        for tag in tags {
            list.push(tag)?;
        }
        Ok(list)
    }

    /// Parse a comma-separated list (`"en-US, fr"`), the form used in
    /// Content-Language headers.
    pub fn parse_list(list: &str) -> Result<Self, InvalidValue> {
        let tags = list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(LanguageTag::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_tags(tags)
    }

    pub fn push(&mut self, tag: LanguageTag) -> Result<(), InvalidValue> {
        if self.0.contains(&tag) {
            return Err(InvalidValue::DuplicateLanguageTag(tag.0));
        }
        self.0.push(tag);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageTag> {
        self.0.iter()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|t| t.0.clone()).collect()
    }
}

impl fmt::Display for LanguageTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(LanguageTag::as_str).collect();
        f.write_str(&joined.join(", "))
    }
}
