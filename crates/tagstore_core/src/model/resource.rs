//! Resource records and resource query parameters.
//!
//! # Invariants
//! - `id`, `name` and `kind` are immutable after creation.
//! - A resource never holds the same tag name twice.

use super::tag::{non_blank, NewTag, Tag};
use super::ValidationError;
use serde::{Deserialize, Serialize};

/// Canonical resource record as persisted by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Caller-assigned unique identifier.
    pub id: String,
    pub name: String,
    /// Serialized as `type` to match external schema naming.
    #[serde(rename = "type")]
    pub kind: String,
    /// Most recently attached tag first.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Resource {
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Caller input for resource creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewResource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<NewTag>,
}

impl NewResource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            tags: Vec::new(),
        }
    }

    /// Appends one tag reference by name.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(NewTag::named(tag));
        self
    }

    /// Checks required fields before any storage access.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.kind.trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        for tag in &self.tags {
            tag.validate()?;
        }
        Ok(())
    }
}

/// Exact-match filters for resource listing. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub tag: Option<String>,
}

impl ResourceParams {
    pub fn by_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Builds params from query-string style pairs, ignoring unknown keys.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let value = non_blank(value);
            match key {
                "type" => params.kind = value,
                "name" => params.name = value,
                "tag" => params.tag = value,
                _ => {}
            }
        }
        params
    }

    /// Returns `true` when no filter is active.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.name.is_none() && self.tag.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{NewResource, Resource, ResourceParams};
    use crate::model::ValidationError;

    #[test]
    fn validate_reports_first_missing_field() {
        let err = NewResource::new("", "x", "y").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("id"));
        let err = NewResource::new("a", " ", "y").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("name"));
        let err = NewResource::new("a", "x", "").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("type"));
        let err = NewResource::new("a", "x", "y").tagged("").validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingField("tag.name"));
    }

    #[test]
    fn resource_json_uses_type_field() {
        let raw = r##"{"id":"a","name":"x","type":"book","tags":[{"name":"red","color":"#FF0000"}]}"##;
        let resource: Resource = serde_json::from_str(raw).unwrap();
        assert_eq!(resource.kind, "book");
        assert_eq!(resource.tag_names(), vec!["red"]);

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["type"], "book");
        assert_eq!(json["tags"][0]["color"], "#FF0000");
    }

    #[test]
    fn from_pairs_maps_known_fields_only() {
        let params =
            ResourceParams::from_pairs([("type", "book"), ("tag", "red"), ("owner", "me")]);
        assert_eq!(params.kind.as_deref(), Some("book"));
        assert_eq!(params.tag.as_deref(), Some("red"));
        assert!(params.name.is_none());
        assert!(ResourceParams::from_pairs([("owner", "me")]).is_empty());
    }
}
