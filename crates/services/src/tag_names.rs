//! Default tag name rules for free-text tag input.

use anyhow::bail;
use domains::TagNameValidator;
use once_cell::sync::Lazy;
use regex::Regex;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;\s]+").expect("valid separator regex"));
static TAG_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.:()\[\]\-]+$").expect("valid tag name regex")
});

/// Splits on commas, semicolons and whitespace, then checks each name.
///
/// Names are compared case-insensitively for duplicates; the first spelling
/// wins. An empty result is an error since every post needs a tag.
#[derive(Debug, Clone)]
pub struct BasicTagNameValidator {
    max_length: usize,
}

impl BasicTagNameValidator {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for BasicTagNameValidator {
    fn default() -> Self {
        Self::new(64)
    }
}

impl TagNameValidator for BasicTagNameValidator {
    fn validate(&self, text: &str) -> anyhow::Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for name in SEPARATORS.split(text.trim()).filter(|name| !name.is_empty()) {
            if name.chars().count() > self.max_length {
                bail!("Tag must have at most {} characters", self.max_length);
            }
            if !TAG_NAME.is_match(name) || name == "." || name == ".." {
                bail!("Invalid tag \"{name}\"");
            }
            if !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }

        if names.is_empty() {
            bail!("No tags set");
        }
        Ok(names)
    }
}
