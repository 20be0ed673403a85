use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PlanError;
use crate::models::fields;
use crate::parsers::KeywordRule;

/// One way of locating a field inside a listing block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub css: String,
    /// Attribute to read instead of the node's text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl SelectorCandidate {
    pub fn text(css: &str) -> Self {
        Self {
            css: css.to_string(),
            attr: None,
        }
    }

    pub fn attr(css: &str, attr: &str) -> Self {
        Self {
            css: css.to_string(),
            attr: Some(attr.to_string()),
        }
    }
}

/// Ordered candidates for one field; the first that yields a value wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    pub candidates: Vec<SelectorCandidate>,
    /// Abort the block when no candidate matches any node.
    #[serde(default)]
    pub required: bool,
    /// Resolve relative values against the page URL.
    #[serde(default)]
    pub resolve_url: bool,
}

impl FieldRule {
    pub fn new(name: &str, candidates: Vec<SelectorCandidate>) -> Self {
        Self {
            name: name.to_string(),
            candidates,
            required: false,
            resolve_url: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn url(mut self) -> Self {
        self.resolve_url = true;
        self
    }
}

/// Per-site description of how to turn a listing block into a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionPlan {
    pub fields: Vec<FieldRule>,
    /// Candidate selectors for loose sub-items; the first that matches anything is used.
    #[serde(default)]
    pub aux_items: Vec<String>,
    #[serde(default)]
    pub classification: Vec<KeywordRule>,
}

impl ExtractionPlan {
    /// Selector fields followed by classification-only targets, deduplicated.
    pub fn declared_fields(&self) -> Vec<&str> {
        let mut declared: Vec<&str> = Vec::new();
        let names = self
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.classification.iter().map(|r| r.field.as_str()));
        for name in names {
            if !declared.contains(&name) {
                declared.push(name);
            }
        }
        declared
    }

    pub fn compile(&self) -> Result<CompiledPlan, PlanError> {
        let mut seen = HashSet::new();
        let mut compiled_fields = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            check_field_name(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(PlanError::DuplicateField(field.name.clone()));
            }
            if field.candidates.is_empty() {
                return Err(PlanError::NoCandidates(field.name.clone()));
            }

            let candidates = field
                .candidates
                .iter()
                .map(|c| {
                    Ok(CompiledCandidate {
                        selector: compile_selector(&c.css)?,
                        attr: c.attr.clone(),
                    })
                })
                .collect::<Result<Vec<_>, PlanError>>()?;

            compiled_fields.push(CompiledField {
                name: field.name.clone(),
                candidates,
                required: field.required,
                resolve_url: field.resolve_url,
            });
        }

        for rule in &self.classification {
            check_field_name(&rule.field)?;
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(PlanError::EmptyRule(rule.field.clone()));
            }
        }

        let aux_items = self
            .aux_items
            .iter()
            .map(|css| compile_selector(css))
            .collect::<Result<Vec<_>, _>>()?;

        // Keyword matching runs on lower-cased text.
        let rules = self
            .classification
            .iter()
            .map(|r| KeywordRule {
                field: r.field.clone(),
                keywords: r
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| k.to_lowercase())
                    .collect(),
            })
            .collect();

        Ok(CompiledPlan {
            fields: compiled_fields,
            aux_items,
            rules,
            declared: self.declared_fields().into_iter().map(String::from).collect(),
        })
    }
}

fn check_field_name(name: &str) -> Result<(), PlanError> {
    if name == fields::PAGE_INDEX || name == fields::CAPTURED_AT || name.trim().is_empty() {
        return Err(PlanError::ReservedField(name.to_string()));
    }
    Ok(())
}

pub(crate) fn compile_selector(css: &str) -> Result<Selector, PlanError> {
    Selector::parse(css).map_err(|e| PlanError::InvalidSelector {
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

pub(crate) struct CompiledCandidate {
    pub selector: Selector,
    pub attr: Option<String>,
}

pub(crate) struct CompiledField {
    pub name: String,
    pub candidates: Vec<CompiledCandidate>,
    pub required: bool,
    pub resolve_url: bool,
}

/// An [`ExtractionPlan`] with every selector parsed. Built once per batch.
pub struct CompiledPlan {
    pub(crate) fields: Vec<CompiledField>,
    pub(crate) aux_items: Vec<Selector>,
    pub(crate) rules: Vec<KeywordRule>,
    pub(crate) declared: Vec<String>,
}

impl CompiledPlan {
    pub fn declared_fields(&self) -> &[String] {
        &self.declared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::default_rules;
    use pretty_assertions::assert_eq;

    fn plan() -> ExtractionPlan {
        ExtractionPlan {
            fields: vec![
                FieldRule::new("title", vec![SelectorCandidate::text("h2")]),
                FieldRule::new("address", vec![SelectorCandidate::text(".location")]),
            ],
            aux_items: vec!["li".to_string()],
            classification: default_rules(),
        }
    }

    #[test]
    fn declared_fields_merge_classification_targets() {
        assert_eq!(
            plan().declared_fields(),
            vec!["title", "address", "bedrooms", "bathrooms", "surface"]
        );
    }

    #[test]
    fn compiles_valid_plan() {
        let compiled = plan().compile().unwrap();
        assert_eq!(compiled.fields.len(), 2);
        assert_eq!(compiled.aux_items.len(), 1);
        assert_eq!(compiled.declared_fields().len(), 5);
    }

    #[test]
    fn rejects_bad_selector() {
        let mut bad = plan();
        bad.fields[0].candidates.push(SelectorCandidate::text("h2[["));
        assert!(matches!(bad.compile(), Err(PlanError::InvalidSelector { .. })));
    }

    #[test]
    fn rejects_duplicates_and_reserved_names() {
        let mut dup = plan();
        dup.fields.push(FieldRule::new("title", vec![SelectorCandidate::text("h3")]));
        assert_eq!(dup.compile().err(), Some(PlanError::DuplicateField("title".into())));

        let mut reserved = plan();
        reserved
            .fields
            .push(FieldRule::new("page_index", vec![SelectorCandidate::text("span")]));
        assert_eq!(
            reserved.compile().err(),
            Some(PlanError::ReservedField("page_index".into()))
        );
    }

    #[test]
    fn rejects_field_without_candidates() {
        let mut empty = plan();
        empty.fields.push(FieldRule::new("price", vec![]));
        assert_eq!(empty.compile().err(), Some(PlanError::NoCandidates("price".into())));
    }

    #[test]
    fn plan_round_trips_through_json() {
        let json = serde_json::to_string(&plan()).unwrap();
        let back: ExtractionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan());
    }
}
