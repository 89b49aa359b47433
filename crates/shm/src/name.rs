//! Unique shm name generation from `prefix*suffix` patterns.
//!
//! Candidates are `prefix + hex(random u32) + suffix`. The hex part is at most
//! 8 characters, so a pattern is rejected up front when even the longest
//! candidate would not fit the platform limit.

use std::fmt;
use std::path::is_separator;

use crate::error::{Result, ShmError};

/// Longest rendering of a `u32` in hex.
const MAX_RANDOM_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    prefix: String,
    suffix: String,
    name_max: usize,
}

impl NamePattern {
    /// Validate `pattern` and split it around its last `*`.
    pub fn parse(pattern: &str, required_prefix: &str, name_max: usize) -> Result<Self> {
        if pattern.chars().any(is_separator) {
            return Err(ShmError::PatternHasSeparator {
                pattern: pattern.to_owned(),
            });
        }

        let (prefix, suffix) = match pattern.rfind('*') {
            Some(pos) => (&pattern[..pos], &pattern[pos + 1..]),
            None => (pattern, ""),
        };

        let mut full_prefix = String::with_capacity(required_prefix.len() + prefix.len());
        if !prefix.starts_with(required_prefix) {
            full_prefix.push_str(required_prefix);
        }
        full_prefix.push_str(prefix);

        let parsed = Self {
            prefix: full_prefix,
            suffix: suffix.to_owned(),
            name_max,
        };

        let longest = parsed.prefix.len() + MAX_RANDOM_LEN + parsed.suffix.len();
        if longest > name_max {
            return Err(ShmError::PatternTooLong {
                name: format!("{}{}{}", parsed.prefix, "f".repeat(MAX_RANDOM_LEN), parsed.suffix),
                max: name_max,
            });
        }
        Ok(parsed)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Produce a fresh random candidate.
    pub fn candidate(&self) -> Result<String> {
        self.candidate_with(rand::random::<u32>())
    }

    fn candidate_with(&self, token: u32) -> Result<String> {
        let name = format!("{}{:x}{}", self.prefix, token, self.suffix);
        if name.len() > self.name_max {
            return Err(ShmError::PatternTooLong {
                name,
                max: self.name_max,
            });
        }
        Ok(name)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.prefix, self.suffix)
    }
}
