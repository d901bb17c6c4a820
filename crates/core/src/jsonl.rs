//! JSON-lines record formats for corpus import and export.
//!
//! Two record shapes exist:
//!
//! - **Flat**: `{text, drugs, adverse_events, is_validated?, created_at?, updated_at?}`
//! - **Entity-span**: `{text, entities: [{start, end, label, text}], is_validated?}`
//!
//! Import accepts either shape, one JSON object per line. A line that fails to
//! parse is reported as a [`SkippedLine`] and the rest of the input is still
//! processed.

use serde::{Deserialize, Serialize};

use crate::change::{ChangeStatistics, ChangeSummary, ChangeType};
use crate::entities::{check_storable, normalize_entity_list, EntityKind};
use crate::error::CoreError;
use crate::locator::EntityLocator;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Record shapes
// ---------------------------------------------------------------------------

/// Flat record: the two entity lists as plain string arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub drugs: Vec<String>,
    #[serde(default)]
    pub adverse_events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_validated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// Label of an entity mention in the entity-span format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Drug,
    #[serde(alias = "ADE")]
    AdverseEvent,
}

impl From<EntityKind> for EntityLabel {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Drug => Self::Drug,
            EntityKind::AdverseEvent => Self::AdverseEvent,
        }
    }
}

impl From<EntityLabel> for EntityKind {
    fn from(label: EntityLabel) -> Self {
        match label {
            EntityLabel::Drug => Self::Drug,
            EntityLabel::AdverseEvent => Self::AdverseEvent,
        }
    }
}

/// One located occurrence of an entity, in character offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    pub start: usize,
    pub end: usize,
    pub label: EntityLabel,
    /// Matched text as it appears in the record. May be omitted on import, in
    /// which case it is recovered from the offsets.
    #[serde(default)]
    pub text: String,
}

/// Entity-span record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpanRecord {
    pub text: String,
    pub entities: Vec<EntityMention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_validated: Option<bool>,
}

/// Locate every drug and adverse-event occurrence in `text`.
///
/// Mentions are emitted drugs first, then adverse events, each list in its own
/// order; with `sort_by_start` they are then stably sorted by `start`. Blank
/// entity names are skipped.
pub fn locate_mentions(
    text: &str,
    drugs: &[String],
    adverse_events: &[String],
    sort_by_start: bool,
) -> Result<Vec<EntityMention>, CoreError> {
    let mut mentions = Vec::new();
    for (kind, names) in [
        (EntityKind::Drug, drugs),
        (EntityKind::AdverseEvent, adverse_events),
    ] {
        for name in names.iter().filter(|n| !n.trim().is_empty()) {
            let locator = EntityLocator::new(text, name)?;
            mentions.extend(locator.spans().map(|span| EntityMention {
                start: span.start,
                end: span.end,
                label: kind.into(),
                text: span.slice(text).to_string(),
            }));
        }
    }
    if sort_by_start {
        mentions.sort_by_key(|m| m.start);
    }
    Ok(mentions)
}

impl EntitySpanRecord {
    /// Build the entity-span view of an annotation.
    pub fn build(
        text: &str,
        drugs: &[String],
        adverse_events: &[String],
        is_validated: Option<bool>,
        sort_by_start: bool,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            text: text.to_string(),
            entities: locate_mentions(text, drugs, adverse_events, sort_by_start)?,
            is_validated,
        })
    }

    /// Collapse mentions back into flat entity lists (distinct names, first
    /// occurrence order).
    pub fn into_flat(self) -> FlatRecord {
        let mut drugs: Vec<String> = Vec::new();
        let mut adverse_events: Vec<String> = Vec::new();
        for mention in &self.entities {
            let name = if mention.text.is_empty() {
                char_slice(&self.text, mention.start, mention.end)
            } else {
                mention.text.clone()
            };
            let target = match EntityKind::from(mention.label) {
                EntityKind::Drug => &mut drugs,
                EntityKind::AdverseEvent => &mut adverse_events,
            };
            if !target.contains(&name) {
                target.push(name);
            }
        }
        FlatRecord {
            text: self.text,
            drugs,
            adverse_events,
            is_validated: self.is_validated,
            created_at: None,
            updated_at: None,
        }
    }
}

fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

// ---------------------------------------------------------------------------
// Change-history enrichment
// ---------------------------------------------------------------------------

/// One change event as it appears in an enriched export line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedChange {
    pub change_type: ChangeType,
    pub field_name: String,
    pub entity_name: Option<String>,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub timestamp: Timestamp,
    pub session_id: Option<String>,
}

/// Change-history block appended to an export line on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeHistory {
    pub change_summary: ChangeSummary,
    pub changes: Vec<ExportedChange>,
    pub change_statistics: ChangeStatistics,
}

impl ChangeHistory {
    pub fn new(summary: ChangeSummary, changes: Vec<ExportedChange>) -> Self {
        let change_statistics = summary.statistics();
        Self {
            change_summary: summary,
            changes,
            change_statistics,
        }
    }
}

/// A record plus optional change history, serialized as one flat object.
#[derive(Debug, Clone, Serialize)]
pub struct ExportLine<R: Serialize> {
    #[serde(flatten)]
    pub record: R,
    #[serde(flatten)]
    pub history: Option<ChangeHistory>,
}

/// Serialize one export line, newline-terminated. Non-ASCII text is written
/// as UTF-8, not escaped.
pub fn to_jsonl_line<T: Serialize>(value: &T) -> Result<String, CoreError> {
    let mut line = serde_json::to_string(value)
        .map_err(|e| CoreError::Internal(format!("failed to serialize export line: {e}")))?;
    line.push('\n');
    Ok(line)
}

// ---------------------------------------------------------------------------
// Import parsing
// ---------------------------------------------------------------------------

/// A line that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLine {
    /// 1-based line number (element number for JSON-array uploads).
    pub line_number: usize,
    pub reason: String,
}

/// Outcome of parsing an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedImport {
    pub records: Vec<FlatRecord>,
    pub skipped: Vec<SkippedLine>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingRecord {
    Spans(EntitySpanRecord),
    Flat(FlatRecord),
}

/// Parse a JSONL upload (or a single top-level JSON array of records).
///
/// Blank lines are ignored. Entity lists are trimmed and blank entries
/// dropped.
pub fn parse_import(input: &str) -> ParsedImport {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    if input.trim_start().starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(input) {
            let mut parsed = ParsedImport::default();
            for (i, item) in items.into_iter().enumerate() {
                parsed.push(i + 1, decode_value(item));
            }
            return parsed;
        }
    }

    let mut parsed = ParsedImport::default();
    for (i, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let result = serde_json::from_str::<serde_json::Value>(line)
            .map_err(|e| format!("invalid JSON: {e}"))
            .and_then(decode_value);
        parsed.push(i + 1, result);
    }
    parsed
}

impl ParsedImport {
    fn push(&mut self, line_number: usize, result: Result<FlatRecord, String>) {
        match result {
            Ok(record) => self.records.push(record),
            Err(reason) => self.skipped.push(SkippedLine {
                line_number,
                reason,
            }),
        }
    }
}

fn decode_value(value: serde_json::Value) -> Result<FlatRecord, String> {
    if !value.is_object() {
        return Err("record must be a JSON object".to_string());
    }
    let record = match serde_json::from_value::<IncomingRecord>(value) {
        Ok(IncomingRecord::Spans(spans)) => spans.into_flat(),
        Ok(IncomingRecord::Flat(flat)) => flat,
        Err(_) => {
            return Err(
                "record does not match the flat or entity-span format".to_string(),
            )
        }
    };
    check_storable("text", &record.text).map_err(|e| e.to_string())?;
    let drugs = normalize_entity_list(&record.drugs);
    let adverse_events = normalize_entity_list(&record.adverse_events);
    for (kind, names) in [
        (EntityKind::Drug, &drugs),
        (EntityKind::AdverseEvent, &adverse_events),
    ] {
        for name in names.iter() {
            check_storable(kind.field_name(), name).map_err(|e| e.to_string())?;
        }
    }
    Ok(FlatRecord {
        drugs,
        adverse_events,
        ..record
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nul_characters_skip_the_line() {
        let input = concat!(
            "{\"text\": \"a\", \"drugs\": [\"x\"], \"adverse_events\": []}\n",
            "{\"text\": \"bad \\u0000 text\", \"drugs\": [], \"adverse_events\": []}\n",
            "{\"text\": \"c\", \"drugs\": [\"as\\u0000pirin\"], \"adverse_events\": []}\n",
            "{\"text\": \"d\", \"drugs\": [], \"adverse_events\": [\"y\"]}\n",
        );
        let parsed = parse_import(input);
        assert_eq!(parsed.records.len(), 2);
        let lines: Vec<usize> = parsed.skipped.iter().map(|s| s.line_number).collect();
        assert_eq!(lines, vec![2, 3]);
        assert!(parsed.skipped[0].reason.contains("text must not contain NUL"));
        assert!(parsed.skipped[1].reason.contains("drugs must not contain NUL"));
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let input = concat!(
            "{\"text\": \"a\", \"drugs\": [\"x\"], \"adverse_events\": []}\n",
            "{not json}\n",
            "{\"text\": \"b\", \"drugs\": [], \"adverse_events\": [\"y\"]}\n",
        );
        let parsed = parse_import(input);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line_number, 2);
        assert!(parsed.skipped[0].reason.starts_with("invalid JSON"));
    }

    #[test]
    fn blank_lines_ignored_but_counted_in_line_numbers() {
        let parsed = parse_import("\n\n42\n");
        assert!(parsed.records.is_empty());
        assert_eq!(
            parsed.skipped,
            vec![SkippedLine {
                line_number: 3,
                reason: "record must be a JSON object".to_string()
            }]
        );
    }

    #[test]
    fn flat_record_defaults_and_normalises_entities() {
        let parsed = parse_import("{\"text\": \"t\", \"drugs\": [\" aspirin \", \"\"]}");
        let record = &parsed.records[0];
        assert_eq!(record.drugs, list(&["aspirin"]));
        assert!(record.adverse_events.is_empty());
        assert_eq!(record.is_validated, None);
    }

    #[test]
    fn entity_span_records_are_flattened() {
        let line = r#"{"text": "Aspirin gave me a rash", "entities": [
            {"start": 0, "end": 7, "label": "DRUG", "text": "Aspirin"},
            {"start": 18, "end": 22, "label": "ADE"}
        ], "is_validated": true}"#
            .replace('\n', " ");
        let parsed = parse_import(&line);
        assert!(parsed.skipped.is_empty());
        let record = &parsed.records[0];
        assert_eq!(record.drugs, list(&["Aspirin"]));
        assert_eq!(record.adverse_events, list(&["rash"]));
        assert_eq!(record.is_validated, Some(true));
    }

    #[test]
    fn json_array_upload_is_accepted() {
        let parsed = parse_import(r#"[{"text": "a"}, "oops", {"text": "b"}]"#);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped[0].line_number, 2);
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let parsed = parse_import("\u{feff}{\"text\": \"a\"}");
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn mentions_sorted_by_start_and_overlaps_kept() {
        let text = "nausea after aspirin; aspirin again";
        let mentions =
            locate_mentions(text, &list(&["aspirin"]), &list(&["nausea"]), true).unwrap();
        let starts: Vec<(usize, EntityLabel)> = mentions.iter().map(|m| (m.start, m.label)).collect();
        assert_eq!(
            starts,
            vec![
                (0, EntityLabel::AdverseEvent),
                (13, EntityLabel::Drug),
                (22, EntityLabel::Drug)
            ]
        );
        assert_eq!(mentions[1].text, "aspirin");
    }

    #[test]
    fn unsorted_mentions_keep_drugs_first() {
        let mentions =
            locate_mentions("rash then aspirin", &list(&["aspirin"]), &list(&["rash"]), false).unwrap();
        assert_eq!(mentions[0].label, EntityLabel::Drug);
        assert_eq!(mentions[1].label, EntityLabel::AdverseEvent);
    }

    #[test]
    fn entity_span_record_serializes_labels() {
        let record = EntitySpanRecord::build("took ASA", &list(&["asa"]), &[], None, true).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "took ASA",
                "entities": [{"start": 5, "end": 8, "label": "DRUG", "text": "ASA"}]
            })
        );
    }

    #[test]
    fn export_line_flattens_history() {
        let summary = ChangeSummary::from_counts([(ChangeType::DrugAdded, 1)], None);
        let line = ExportLine {
            record: FlatRecord {
                text: "t".into(),
                drugs: list(&["x"]),
                adverse_events: vec![],
                is_validated: Some(false),
                created_at: None,
                updated_at: None,
            },
            history: Some(ChangeHistory::new(summary, vec![])),
        };
        let json: serde_json::Value =
            serde_json::from_str(to_jsonl_line(&line).unwrap().trim_end()).unwrap();
        assert_eq!(json["text"], "t");
        assert_eq!(json["change_summary"]["drug_additions"], 1);
        assert_eq!(json["change_statistics"]["additions"], 1);
        assert!(json["changes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn export_line_without_history_has_no_extra_keys() {
        let line = ExportLine {
            record: FlatRecord {
                text: "é".into(),
                drugs: vec![],
                adverse_events: vec![],
                is_validated: None,
                created_at: None,
                updated_at: None,
            },
            history: None,
        };
        let out = to_jsonl_line(&line).unwrap();
        assert_eq!(out, "{\"text\":\"é\",\"drugs\":[],\"adverse_events\":[]}\n");
    }
}
