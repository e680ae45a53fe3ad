//! Template compiler.
//!
//! Turns the raw template rule rows into one validated [`CompiledTemplate`]
//! per sink group, plus the minimal field manifest handed to the source
//! adapter so it only fetches what rendering will read.

use crate::error::{SyncError, SyncResult};
use crate::models::{Category, TemplateRule, DEFAULT_SCOPE, RECORD_KIND};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One `(kind, field)` pair a category draws its text from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub kind: String,
    pub field: String,
}

impl Selector {
    pub fn new(kind: &str, field: &str) -> Self {
        Self {
            kind: kind.to_string(),
            field: field.to_string(),
        }
    }

    /// True for selectors reading the reservation's own attributes.
    pub fn is_record_level(&self) -> bool {
        self.kind == RECORD_KIND
    }
}

/// The rendering template of a single scope (a sink group or `"default"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    scope: String,
    title: Vec<Selector>,
    location: Vec<Selector>,
    description: Vec<Selector>,
}

/// Fields the source adapter has to return for one template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldManifest {
    /// Object kind -> fields, deduplicated in order of first use.
    pub by_kind: BTreeMap<String, Vec<String>>,
    /// Fields read from the reservation itself.
    pub record_fields: Vec<String>,
}

impl FieldManifest {
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty() && self.record_fields.is_empty()
    }

    fn push(&mut self, selector: &Selector) {
        let fields = if selector.is_record_level() {
            &mut self.record_fields
        } else {
            self.by_kind.entry(selector.kind.clone()).or_default()
        };
        if !fields.contains(&selector.field) {
            fields.push(selector.field.clone());
        }
    }
}

impl CompiledTemplate {
    fn empty(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            title: Vec::new(),
            location: Vec::new(),
            description: Vec::new(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn selectors(&self, category: Category) -> &[Selector] {
        match category {
            Category::Title => &self.title,
            Category::Location => &self.location,
            Category::Description => &self.description,
        }
    }

    fn selectors_mut(&mut self, category: Category) -> &mut Vec<Selector> {
        match category {
            Category::Title => &mut self.title,
            Category::Location => &mut self.location,
            Category::Description => &mut self.description,
        }
    }

    /// Usable only with at least one rule in every category.
    pub fn is_complete(&self) -> bool {
        Category::ALL.iter().all(|c| !self.selectors(*c).is_empty())
    }

    pub fn field_manifest(&self) -> FieldManifest {
        let mut manifest = FieldManifest::default();
        for category in Category::ALL {
            for selector in self.selectors(category) {
                manifest.push(selector);
            }
        }
        manifest
    }

    /// Comparable rendering of every `(category, kind, field)` triple.
    pub fn signature(&self) -> String {
        let mut signature = format!("{}|", self.scope);
        for category in Category::ALL {
            for selector in self.selectors(category) {
                signature.push_str(&format!("{}:{}:{};", category, selector.kind, selector.field));
            }
        }
        signature
    }
}

/// All usable templates keyed by scope.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, CompiledTemplate>,
}

impl TemplateSet {
    /// Compiles every scope that has rules in all three categories. Fails if
    /// the rule table as a whole does not mention all three categories, since
    /// then not even the fallback can render.
    pub fn compile(rules: &[TemplateRule]) -> SyncResult<Self> {
        let categories: BTreeSet<Category> = rules.iter().map(|r| r.category).collect();
        if categories.len() < Category::ALL.len() {
            return Err(SyncError::template(format!(
                "template rules cover {} of 3 categories",
                categories.len()
            )));
        }

        let mut scopes: HashMap<String, CompiledTemplate> = HashMap::new();
        for rule in rules {
            scopes
                .entry(rule.sink_group.clone())
                .or_insert_with(|| CompiledTemplate::empty(&rule.sink_group))
                .selectors_mut(rule.category)
                .push(Selector::new(&rule.source_kind, &rule.source_field));
        }

        let templates: HashMap<String, CompiledTemplate> = scopes
            .into_iter()
            .filter(|(scope, template)| {
                let keep = template.is_complete();
                if !keep {
                    debug!("Dropping incomplete template for scope {}", scope);
                }
                keep
            })
            .collect();

        Ok(Self { templates })
    }

    /// The group's own template, else the `"default"` one.
    pub fn resolve(&self, sink_group: &str) -> Option<&CompiledTemplate> {
        self.templates
            .get(sink_group)
            .or_else(|| self.templates.get(DEFAULT_SCOPE))
    }

    pub fn resolve_or_err(&self, sink_group: &str) -> SyncResult<&CompiledTemplate> {
        self.resolve(sink_group).ok_or_else(|| {
            SyncError::template(format!("no valid template for group {} or {}", sink_group, DEFAULT_SCOPE))
        })
    }
}

/// Compiles `rules` and resolves the template `sink_group` renders with.
pub fn compile_for_group(rules: &[TemplateRule], sink_group: &str) -> SyncResult<CompiledTemplate> {
    let set = TemplateSet::compile(rules)?;
    set.resolve_or_err(sink_group).cloned()
}
