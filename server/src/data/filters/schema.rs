//! Filter schemas
//!
//! Every searchable entity declares which fields can be filtered and what
//! type each one has. Schemas are built once per entity and may be
//! extended per request with dynamic fields (see [`super::dynamic`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Text,
    Number,
    Date,
    Boolean,
    Enum,
    Array,
    Blob,
    Contact,
}

impl FilterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::Blob => "blob",
            Self::Contact => "contact",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub nullable: bool,
}

impl FilterDefinition {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            options: None,
            nullable: false,
        }
    }

    pub fn text() -> Self {
        Self::new(FilterType::Text)
    }

    pub fn number() -> Self {
        Self::new(FilterType::Number)
    }

    pub fn date() -> Self {
        Self::new(FilterType::Date)
    }

    pub fn boolean() -> Self {
        Self::new(FilterType::Boolean)
    }

    pub fn array() -> Self {
        Self::new(FilterType::Array)
    }

    pub fn blob() -> Self {
        Self::new(FilterType::Blob)
    }

    pub fn contact() -> Self {
        Self::new(FilterType::Contact)
    }

    pub fn enumeration<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filter_type: FilterType::Enum,
            options: Some(options.into_iter().map(Into::into).collect()),
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Field name to definition map for one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSchema {
    fields: BTreeMap<String, FilterDefinition>,
}

impl FilterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, definition: FilterDefinition) -> Self {
        self.fields.insert(field.into(), definition);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FilterDefinition> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Merge `fragment` under `prefix`, so its field `a.b` becomes `prefix.a.b`
    pub fn merge_prefixed(&mut self, prefix: &str, fragment: FilterSchema) {
        for (field, definition) in fragment.fields {
            self.fields.insert(format!("{}.{}", prefix, field), definition);
        }
    }
}

impl<K: Into<String>> FromIterator<(K, FilterDefinition)> for FilterSchema {
    fn from_iter<T: IntoIterator<Item = (K, FilterDefinition)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
