//! Accession ID splitting
//!
//! Accession rows carry the full ID plus a prefix part and a numeric part
//! (`MGI:1344588` -> `MGI:` / `1344588`). IDs with no trailing digits keep
//! the whole string as prefix and an empty numeric part.

use regex::Regex;
use std::sync::OnceLock;

fn trailing_digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"^(.*?)(\d+)$") {
        Ok(re) => re,
        Err(e) => unreachable!("static accession pattern is valid: {e}"),
    })
}

/// An accession ID split for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessionId {
    pub id: String,
    pub prefix: String,
    pub numeric: Option<i64>,
}

impl AccessionId {
    pub fn split(id: &str) -> Self {
        let id = id.trim();
        if let Some(caps) = trailing_digits().captures(id) {
            let digits = &caps[2];
            // very long digit runs do not fit the numeric column; keep them as prefix
            if let Ok(numeric) = digits.parse::<i64>() {
                return Self {
                    id: id.to_string(),
                    prefix: caps[1].to_string(),
                    numeric: Some(numeric),
                };
            }
        }

        Self {
            id: id.to_string(),
            prefix: id.to_string(),
            numeric: None,
        }
    }

    /// Numeric part rendered for a delimited column (empty when absent).
    pub fn numeric_field(&self) -> String {
        self.numeric.map(|n| n.to_string()).unwrap_or_default()
    }
}
