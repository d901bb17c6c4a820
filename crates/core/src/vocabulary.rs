//! Suggestion vocabulary for the entity editors.
//!
//! Suggestions are the union of the uploaded vocabulary lists and the entity
//! names already present in the corpus. They are computed per request from
//! the store; nothing here holds state.

use std::collections::BTreeSet;

use serde::Serialize;

/// Suggestion lists returned to the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitySuggestions {
    pub drugs: Vec<String>,
    pub adverse_events: Vec<String>,
}

/// Parse an uploaded vocabulary file.
///
/// Accepts either a JSON array of strings or plain text with one name per
/// line. Names are trimmed; blank lines and repeats are dropped, first
/// occurrence wins.
pub fn parse_vocabulary_upload(input: &str) -> Vec<String> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let raw: Vec<String> = match serde_json::from_str::<Vec<String>>(input) {
        Ok(names) => names,
        Err(_) => input.lines().map(str::to_string).collect(),
    };

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for name in raw {
        let name = name.trim();
        if !name.is_empty() && !name.contains('\0') && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

/// Merge vocabulary and observed names into one sorted suggestion list.
///
/// Sorting is case-insensitive; names differing only in case are all kept.
pub fn merge_suggestions<I, J>(vocabulary: I, observed: J) -> Vec<String>
where
    I: IntoIterator<Item = String>,
    J: IntoIterator<Item = String>,
{
    let mut merged: BTreeSet<(String, String)> = BTreeSet::new();
    for name in vocabulary.into_iter().chain(observed) {
        let name = name.trim().to_string();
        if name.is_empty() {
            continue;
        }
        merged.insert((name.to_lowercase(), name));
    }
    merged.into_iter().map(|(_, name)| name).collect()
}
