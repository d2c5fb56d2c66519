//! Search text tokenizing and album key parsing.

use regex::Regex;

/// Most tokens taken from one search string
pub const MAX_SEARCH_TOKENS: usize = 8;

/// Album selected by an album key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Album {
    All,
    /// No date taken, or a date of unknown origin
    UnknownDate,
    /// Indexed within the recent window
    Recent,
    /// Hash shared by two or more assets in scope
    Duplicates,
    /// Exactly this (lowercase) hash
    DuplicateGroup(String),
    Year(i32),
    Month(i32, u32),
}

/// Compiled patterns for query input
#[derive(Debug, Clone)]
pub struct QuerySyntax {
    separators: Regex,
    year_key: Regex,
    month_key: Regex,
}

impl QuerySyntax {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            separators: Regex::new(r"[\s,;|/\\\-_.]+")?,
            year_key: Regex::new(r"(?i)^year:(\d{1,4})$")?,
            month_key: Regex::new(r"(?i)^month:(\d{1,4})-(\d{1,2})$")?,
        })
    }

    /// Split free text into at most [`MAX_SEARCH_TOKENS`] distinct
    /// (case-insensitive) tokens.
    ///
    /// Text made only of separators becomes a single token of itself.
    pub fn tokenize(&self, raw: &str) -> Vec<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut tokens: Vec<String> = Vec::new();
        for token in self.separators.split(trimmed).filter(|t| !t.is_empty()) {
            if tokens.len() == MAX_SEARCH_TOKENS {
                break;
            }
            let folded = token.to_lowercase();
            if !tokens.iter().any(|t| t.to_lowercase() == folded) {
                tokens.push(token.to_string());
            }
        }

        if tokens.is_empty() {
            tokens.push(trimmed.to_string());
        }
        tokens
    }

    /// Parse an album key. Blank and unrecognized keys select everything.
    pub fn parse_album(&self, key: Option<&str>) -> Album {
        let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Album::All;
        };

        let lower = key.to_lowercase();
        match lower.as_str() {
            "all" => return Album::All,
            "unknown" => return Album::UnknownDate,
            "recent" => return Album::Recent,
            "duplicates" => return Album::Duplicates,
            _ => {}
        }

        if let Some(hash) = lower.strip_prefix("dup:") {
            let hash = hash.trim();
            if !hash.is_empty() {
                return Album::DuplicateGroup(hash.to_string());
            }
        }

        if let Some(year) = self
            .year_key
            .captures(key)
            .and_then(|c| c[1].parse::<i32>().ok())
        {
            return Album::Year(year);
        }

        if let Some(caps) = self.month_key.captures(key) {
            if let (Ok(year), Ok(month)) = (caps[1].parse::<i32>(), caps[2].parse::<u32>()) {
                return Album::Month(year, month);
            }
        }

        Album::All
    }
}
