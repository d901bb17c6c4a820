//! Role-tagged highlighting of entities inside annotation text.
//!
//! Every case-insensitive occurrence of an entity is wrapped in
//! `<span class="{role}">…</span>`. Matching uses a regex-escaped literal and
//! is not anchored to word boundaries, so partial-word matches are wrapped
//! too. Text outside the matches is returned unchanged (no escaping).
//!
//! Roles are applied as successive layers. Each layer runs over the output of
//! the previous one, markup included: a name that occurs inside an already
//! inserted tag (for example inside a class attribute) is wrapped again.
//! Within a layer all names share one pass, ordered longest first, so a
//! shorter name never splits a longer one that contains it.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::change::ChangeType;
use crate::error::CoreError;

/// Visual role of a highlighted entity; doubles as the span's CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightRole {
    RemovedDrug,
    RemovedEvent,
    AddedDrug,
    AddedEvent,
    Drug,
    AdverseEvent,
}

impl HighlightRole {
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::RemovedDrug => "removed-drug",
            Self::RemovedEvent => "removed-event",
            Self::AddedDrug => "added-drug",
            Self::AddedEvent => "added-event",
            Self::Drug => "drug",
            Self::AdverseEvent => "adverse-event",
        }
    }
}

/// The four entity sets rendered by the change view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeHighlights {
    pub removed_drugs: Vec<String>,
    pub removed_events: Vec<String>,
    pub added_drugs: Vec<String>,
    pub added_events: Vec<String>,
}

impl ChangeHighlights {
    /// Collect entity names from logged change events.
    ///
    /// Bulk updates and events without an entity name are ignored. Each name
    /// is kept once per set, at its first occurrence.
    pub fn from_changes<'a, I>(changes: I) -> Self
    where
        I: IntoIterator<Item = (ChangeType, Option<&'a str>)>,
    {
        let mut out = Self::default();
        let mut seen: HashSet<(ChangeType, &str)> = HashSet::new();
        for (change_type, entity_name) in changes {
            let Some(name) = entity_name else { continue };
            if !seen.insert((change_type, name)) {
                continue;
            }
            let target = match change_type {
                ChangeType::DrugRemoved => &mut out.removed_drugs,
                ChangeType::EventRemoved => &mut out.removed_events,
                ChangeType::DrugAdded => &mut out.added_drugs,
                ChangeType::EventAdded => &mut out.added_events,
                ChangeType::BulkUpdate => continue,
            };
            target.push(name.to_string());
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.removed_drugs.is_empty()
            && self.removed_events.is_empty()
            && self.added_drugs.is_empty()
            && self.added_events.is_empty()
    }

    /// Layers in application order.
    fn layers(&self) -> [(HighlightRole, &[String]); 4] {
        [
            (HighlightRole::RemovedDrug, self.removed_drugs.as_slice()),
            (HighlightRole::RemovedEvent, self.removed_events.as_slice()),
            (HighlightRole::AddedDrug, self.added_drugs.as_slice()),
            (HighlightRole::AddedEvent, self.added_events.as_slice()),
        ]
    }
}

/// Render the diff view of `text`: removed drugs, removed events, added
/// drugs, then added events.
pub fn highlight_changes(text: &str, highlights: &ChangeHighlights) -> Result<String, CoreError> {
    apply_layers(text, &highlights.layers())
}

/// Render the review view of `text` with the current entity lists.
pub fn highlight_entities(
    text: &str,
    drugs: &[String],
    adverse_events: &[String],
) -> Result<String, CoreError> {
    apply_layers(
        text,
        &[
            (HighlightRole::Drug, drugs),
            (HighlightRole::AdverseEvent, adverse_events),
        ],
    )
}

fn apply_layers(text: &str, layers: &[(HighlightRole, &[String])]) -> Result<String, CoreError> {
    let mut out = text.to_string();
    for (role, names) in layers {
        if let Some(pattern) = layer_pattern(names)? {
            out = wrap_matches(&out, &pattern, *role);
        }
    }
    Ok(out)
}

/// Build one case-insensitive alternation for a layer, longest names first.
///
/// Returns `None` for an empty layer.
fn layer_pattern(names: &[String]) -> Result<Option<Regex>, CoreError> {
    if names.iter().any(|n| n.is_empty()) {
        return Err(CoreError::Validation(
            "entity name must not be empty".to_string(),
        ));
    }
    if names.is_empty() {
        return Ok(None);
    }

    let alternation = alternatives(names)
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");

    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| CoreError::Internal(format!("highlight pattern failed to compile: {e}")))
}

/// Distinct names, longest first; equal lengths keep their input order.
fn alternatives(names: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| seen.insert(*n))
        .collect();
    ordered.sort_by_key(|n| std::cmp::Reverse(n.chars().count()));
    ordered
}

fn wrap_matches(text: &str, pattern: &Regex, role: HighlightRole) -> String {
    let class = role.css_class();
    pattern
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!("<span class=\"{class}\">{}</span>", &caps[0])
        })
        .into_owned()
}
