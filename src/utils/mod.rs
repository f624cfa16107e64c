//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::sync::OnceLock;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Sanitize filename by removing invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();

    let re =
        INVALID_CHARS.get_or_init(|| Regex::new(r#"[<>:"/\\|?*!]"#).expect("Invalid regex pattern"));

    re.replace_all(filename, "_").to_string()
}

/// Parse the first integer found in text ("共 50 页" -> 50, "1,234" -> 1234)
pub fn parse_leading_int(text: &str) -> Option<u32> {
    static INT_RE: OnceLock<Regex> = OnceLock::new();

    let re = INT_RE.get_or_init(|| Regex::new(r"\d[\d,]*").expect("Invalid regex pattern"));

    re.find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Parse the first decimal number found in text ("1.25kg" -> 1.25)
pub fn parse_leading_number(text: &str) -> Option<f64> {
    static NUM_RE: OnceLock<Regex> = OnceLock::new();

    let re = NUM_RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("Invalid regex pattern"));

    re.find(text).and_then(|m| m.as_str().parse().ok())
}
