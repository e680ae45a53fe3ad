// file: src/models/template.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope name of the fallback template.
pub const DEFAULT_SCOPE: &str = "default";

/// Selector kind that addresses top-level record attributes instead of a
/// nested object.
pub const RECORD_KIND: &str = "reservation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Title,
    Location,
    Description,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Title, Category::Location, Category::Description];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Title => "title",
            Category::Location => "location",
            Category::Description => "description",
        }
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "title" => Ok(Category::Title),
            "location" => Ok(Category::Location),
            "description" => Ok(Category::Description),
            _ => Err(format!("Unknown template category: {}", value)),
        }
    }

    /// Separator used when joining the values selected for this category.
    pub fn separator(&self) -> &'static str {
        match self {
            Category::Title | Category::Location => " - ",
            Category::Description => "<br>",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of template configuration: render `source_kind.source_field` into
/// `category` for events of `sink_group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRule {
    pub id: i64,
    pub category: Category,
    pub source_kind: String,
    pub source_field: String,
    pub sink_group: String,
}

impl TemplateRule {
    pub fn new(id: i64, category: Category, source_kind: &str, source_field: &str, sink_group: &str) -> Self {
        Self {
            id,
            category,
            source_kind: source_kind.to_string(),
            source_field: source_field.to_string(),
            sink_group: sink_group.to_string(),
        }
    }
}

/// Which categories a group, and the fallback scope, have rules for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCoverage {
    pub group: Vec<Category>,
    pub default: Vec<Category>,
}

impl TemplateCoverage {
    pub fn is_complete(&self) -> bool {
        Category::ALL.iter().all(|c| self.group.contains(c)) || Category::ALL.iter().all(|c| self.default.contains(c))
    }
}
