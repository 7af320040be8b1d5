//! Naming-convention mapper: path segments to symbolic-name segments.
//!
//! The default rule upper-camel-cases a snake_case segment
//! (`users_controller` -> `UsersController`). An override table handles the
//! exceptions the default rule cannot express, typically acronyms
//! (`html_parser` -> `HTMLParser`).

use crate::error::{ModloadError, Result};
use heck::ToUpperCamelCase;
use std::collections::HashMap;

/// Pure segment-to-symbol converter. No state beyond the override table.
#[derive(Debug, Default, Clone)]
pub struct NameMapper {
    overrides: HashMap<String, String>,
}

impl NameMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Add custom inflections, e.g. `{"html_parser": "HTMLParser"}`.
    /// Overrides are matched against the raw segment before the default
    /// rule runs and are returned verbatim.
    pub fn add_overrides(&mut self, overrides: impl IntoIterator<Item = (String, String)>) {
        self.overrides.extend(overrides);
    }

    /// Convert one path segment into a symbolic-name segment.
    ///
    /// Deterministic and total over non-empty segments; an empty segment is
    /// an error. `is_terminal` distinguishes leaf segments for conventions
    /// that need it; the default rule applies the same transformation to
    /// containers and leaves.
    pub fn to_symbol(&self, segment: &str, _is_terminal: bool) -> Result<String> {
        if segment.is_empty() {
            return Err(ModloadError::EmptySegment);
        }
        if let Some(symbol) = self.overrides.get(segment) {
            return Ok(symbol.clone());
        }
        Ok(segment.to_upper_camel_case())
    }
}
