//! Declarative schemas: field name → ordered rule identifiers.

use serde::{Deserialize, Serialize};

/// Rules for one field, evaluated in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<String>,
}

/// An ordered field → rules mapping. Field order is evaluation order.
///
/// Serializes as a list of `{ field, rules }` entries so schemas can live
/// in static config files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<FieldRules>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a static table.
    pub fn from_table(table: &[(&str, &[&str])]) -> Self {
        table
            .iter()
            .fold(Self::new(), |schema, (field, rules)| schema.field(field, rules))
    }

    /// Add (or replace) a field's rule list.
    pub fn field(mut self, name: &str, rules: &[&str]) -> Self {
        let rules: Vec<String> = rules.iter().map(|r| r.to_string()).collect();
        match self.fields.iter_mut().find(|f| f.field == name) {
            Some(existing) => existing.rules = rules,
            None => self.fields.push(FieldRules {
                field: name.to_string(),
                rules,
            }),
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldRules> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.field.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    pub fn rules_for(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.rules.as_slice())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
