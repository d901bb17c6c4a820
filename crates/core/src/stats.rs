//! Corpus-level annotation statistics.

use std::collections::HashMap;

use serde::Serialize;

/// Number of entries in the top-drugs / top-events rankings.
pub const TOP_ENTITY_LIMIT: usize = 10;

/// How often one entity name appears across the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFrequency {
    pub name: String,
    pub count: i64,
}

/// Aggregate statistics over every annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total_annotations: i64,
    pub validated_annotations: i64,
    pub validation_percentage: f64,
    pub top_drugs: Vec<EntityFrequency>,
    pub top_events: Vec<EntityFrequency>,
    pub total_unique_drugs: usize,
    pub total_unique_events: usize,
}

/// The parts of an annotation the statistics look at.
#[derive(Debug, Clone, Copy)]
pub struct AnnotationFacts<'a> {
    pub drugs: &'a [String],
    pub adverse_events: &'a [String],
    pub is_validated: bool,
}

impl CorpusStats {
    /// Compute statistics over a corpus.
    ///
    /// Every list entry counts once, so a name repeated inside one list is
    /// counted twice.
    pub fn compute<'a, I>(annotations: I) -> Self
    where
        I: IntoIterator<Item = AnnotationFacts<'a>>,
    {
        let mut total: i64 = 0;
        let mut validated: i64 = 0;
        let mut drugs: HashMap<&str, i64> = HashMap::new();
        let mut events: HashMap<&str, i64> = HashMap::new();

        for facts in annotations {
            total += 1;
            if facts.is_validated {
                validated += 1;
            }
            for drug in facts.drugs {
                *drugs.entry(drug.as_str()).or_default() += 1;
            }
            for event in facts.adverse_events {
                *events.entry(event.as_str()).or_default() += 1;
            }
        }

        let validation_percentage = if total > 0 {
            validated as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_annotations: total,
            validated_annotations: validated,
            validation_percentage,
            total_unique_drugs: drugs.len(),
            total_unique_events: events.len(),
            top_drugs: top_entities(drugs),
            top_events: top_entities(events),
        }
    }
}

/// Most frequent names first; ties broken alphabetically.
fn top_entities(counts: HashMap<&str, i64>) -> Vec<EntityFrequency> {
    let mut ranked: Vec<EntityFrequency> = counts
        .into_iter()
        .map(|(name, count)| EntityFrequency {
            name: name.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_ENTITY_LIMIT);
    ranked
}
