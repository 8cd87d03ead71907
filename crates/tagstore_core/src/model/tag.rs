//! Tag records and tag query parameters.

use super::color::Color;
use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Canonical tag record. Identity is `name` (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    /// Assigned once at creation and never changed afterwards.
    pub color: Color,
}

/// Caller input for tag creation; `color` is drawn from the palette when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTag {
    pub name: String,
    #[serde(default)]
    pub color: Option<Color>,
}

impl NewTag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }

    pub fn with_color(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color: Some(color),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("tag.name"));
        }
        Ok(())
    }
}

impl From<&Tag> for NewTag {
    fn from(value: &Tag) -> Self {
        Self::with_color(value.name.clone(), value.color.clone())
    }
}

/// Exact-match filters for tag listing. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagParams {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl TagParams {
    /// Builds params from query-string style pairs, ignoring unknown keys.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = non_blank(value);
            match key {
                "name" => params.name = value,
                "color" => {
                    params.color = value.map(|raw| match Color::parse(&raw) {
                        Ok(color) => color.as_str().to_string(),
                        Err(_) => raw,
                    })
                }
                _ => {}
            }
        }
        params
    }

    /// Returns `true` when no filter is active.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.color.is_none()
    }
}

pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
