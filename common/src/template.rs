//! Display templates with exactly one integer slot.

use core::{fmt, str::FromStr};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error as ThisError;

/// The only placeholder a template may (and must) contain.
pub const COUNT_PLACEHOLDER: &str = "{count}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("placeholder pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TemplateError {
    #[error("template must contain the {{count}} placeholder")]
    MissingPlaceholder,
    #[error("template must contain {{count}} exactly once, found it {0} times")]
    RepeatedPlaceholder(usize),
    #[error("unknown placeholder '{0}' in template, only {{count}} is supported")]
    UnknownPlaceholder(String),
}

/// A validated template, split around its single placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    prefix: String,
    suffix: String,
}

impl Template {
    /// Validates `raw` and splits it around the placeholder.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let mut found = 0_usize;
        for m in PLACEHOLDER_RE.find_iter(raw) {
            if m.as_str() == COUNT_PLACEHOLDER {
                found += 1;
            } else {
                return Err(TemplateError::UnknownPlaceholder(m.as_str().to_string()));
            }
        }
        match found {
            0 => Err(TemplateError::MissingPlaceholder),
            1 => {
                let (prefix, suffix) = raw
                    .split_once(COUNT_PLACEHOLDER)
                    .ok_or(TemplateError::MissingPlaceholder)?;
                Ok(Self {
                    prefix: prefix.to_string(),
                    suffix: suffix.to_string(),
                })
            }
            n => Err(TemplateError::RepeatedPlaceholder(n)),
        }
    }

    #[must_use]
    pub fn render(&self, count: u64) -> String {
        format!("{}{count}{}", self.prefix, self.suffix)
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{COUNT_PLACEHOLDER}{}", self.prefix, self.suffix)
    }
}
