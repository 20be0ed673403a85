use scraper::ElementRef;
use std::collections::{HashMap, HashSet};
use url::Url;

use crate::error::{ExtractionCause, ExtractionError};
use crate::models::{fields, FieldValue, ListingRecord};
use crate::parsers::{classify, clean_text};
use crate::scrapers::plan::{CompiledField, CompiledPlan};

/// Where a block sits, for error reporting and the constant fields.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext<'a> {
    pub block_index: usize,
    pub page_index: u32,
    pub captured_at: &'a str,
    pub page_url: Option<&'a Url>,
}

/// Turn one listing block into a record.
///
/// Unmatched fields become [`FieldValue::Unavailable`]. Only a required field
/// with no structural match fails the block.
pub fn extract(
    block: ElementRef<'_>,
    plan: &CompiledPlan,
    ctx: &BlockContext<'_>,
) -> Result<ListingRecord, ExtractionError> {
    let mut consumed = HashSet::new();
    let mut planned: HashMap<&str, FieldValue> = HashMap::with_capacity(plan.fields.len());

    for field in &plan.fields {
        let value = match extract_field(block, field, ctx.page_url) {
            FieldMatch::Value(node, text) => {
                consumed.insert(node.id());
                FieldValue::Text(text)
            }
            FieldMatch::Empty => FieldValue::Unavailable,
            FieldMatch::NoNode if field.required => {
                return Err(ExtractionError {
                    block_index: ctx.block_index,
                    cause: ExtractionCause::MissingRequired {
                        field: field.name.clone(),
                    },
                });
            }
            FieldMatch::NoNode => FieldValue::Unavailable,
        };
        planned.insert(field.name.as_str(), value);
    }

    let mut classified: HashMap<&str, String> = HashMap::new();
    for item in aux_items(block, plan) {
        if consumed.contains(&item.id()) {
            continue;
        }
        let text = clean_text(&item.text().collect::<String>()).to_lowercase();
        let Some(field) = classify(&plan.rules, &text) else {
            continue;
        };
        if planned.get(field).map_or(false, FieldValue::is_available) {
            continue;
        }
        classified.insert(field, text);
    }

    let mut values = Vec::with_capacity(plan.declared.len() + 2);
    for name in &plan.declared {
        let value = match planned.remove(name.as_str()) {
            Some(v @ FieldValue::Text(_)) => v,
            _ => classified
                .remove(name.as_str())
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Unavailable),
        };
        values.push((name.clone(), value));
    }
    values.push((
        fields::PAGE_INDEX.to_string(),
        FieldValue::Text(ctx.page_index.to_string()),
    ));
    values.push((
        fields::CAPTURED_AT.to_string(),
        FieldValue::Text(ctx.captured_at.to_string()),
    ));

    Ok(ListingRecord::from_fields(values))
}

enum FieldMatch<'a> {
    Value(ElementRef<'a>, String),
    /// Some candidate matched a node, none yielded a value.
    Empty,
    NoNode,
}

fn extract_field<'a>(
    block: ElementRef<'a>,
    field: &CompiledField,
    page_url: Option<&Url>,
) -> FieldMatch<'a> {
    let mut matched_any = false;

    for candidate in &field.candidates {
        let Some(node) = block.select(&candidate.selector).next() else {
            continue;
        };
        matched_any = true;

        if let Some(text) = read_value(node, candidate.attr.as_deref()) {
            let text = if field.resolve_url {
                resolve_url(page_url, text)
            } else {
                text
            };
            return FieldMatch::Value(node, text);
        }
    }

    if matched_any {
        FieldMatch::Empty
    } else {
        FieldMatch::NoNode
    }
}

fn read_value(node: ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    let value = match attr {
        Some(name) => node.value().attr(name)?.trim().to_string(),
        None => clean_text(&node.text().collect::<String>()),
    };
    (!value.is_empty()).then_some(value)
}

fn resolve_url(page_url: Option<&Url>, value: String) -> String {
    match page_url.and_then(|base| base.join(&value).ok()) {
        Some(full_url) => full_url.to_string(),
        None => value,
    }
}

fn aux_items<'a>(block: ElementRef<'a>, plan: &CompiledPlan) -> Vec<ElementRef<'a>> {
    plan.aux_items
        .iter()
        .map(|selector| block.select(selector).collect::<Vec<_>>())
        .find(|items| !items.is_empty())
        .unwrap_or_default()
}
