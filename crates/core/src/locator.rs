//! Entity occurrence lookup for position export.
//!
//! [`EntityLocator`] reports every case-insensitive occurrence of an entity
//! string inside a text as half-open character spans. The scan is
//! overlap-permissive: after a match at `p` the search resumes at `p + 1`, so
//! `"aa"` is found twice in `"aaa"`. There is no word-boundary requirement.
//!
//! This is deliberately a different behaviour from the regex replacement in
//! [`crate::highlight`], which wraps non-overlapping matches only.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A half-open `[start, end)` span, in characters, within an annotation text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitySpan {
    pub start: usize,
    pub end: usize,
}

impl EntitySpan {
    /// Return the covered substring of `text`.
    pub fn slice<'t>(&self, text: &'t str) -> &'t str {
        let byte_at = |char_idx: usize| {
            text.char_indices()
                .nth(char_idx)
                .map_or(text.len(), |(b, _)| b)
        };
        &text[byte_at(self.start)..byte_at(self.end)]
    }
}

/// Case-fold a single character while keeping a one-to-one char mapping.
///
/// Characters whose lowercase form expands to several characters are kept
/// as-is so that span offsets always index the original text.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Prepared lookup of one entity inside one text.
///
/// Construction folds both strings once; [`EntityLocator::spans`] can then be
/// called any number of times, each call starting a fresh scan.
#[derive(Debug, Clone)]
pub struct EntityLocator {
    haystack: Vec<char>,
    needle: Vec<char>,
}

impl EntityLocator {
    /// Prepare a lookup. Fails if `entity` is empty or whitespace-only.
    pub fn new(text: &str, entity: &str) -> Result<Self, CoreError> {
        if entity.trim().is_empty() {
            return Err(CoreError::Validation(
                "entity name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            haystack: text.chars().map(fold_char).collect(),
            needle: entity.chars().map(fold_char).collect(),
        })
    }

    /// Lazily iterate over every occurrence, in position order.
    pub fn spans(&self) -> Spans<'_> {
        Spans {
            haystack: &self.haystack,
            needle: &self.needle,
            next_start: 0,
        }
    }
}

impl<'a> IntoIterator for &'a EntityLocator {
    type Item = EntitySpan;
    type IntoIter = Spans<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans()
    }
}

/// Iterator over the occurrences found by an [`EntityLocator`].
#[derive(Debug, Clone)]
pub struct Spans<'a> {
    haystack: &'a [char],
    needle: &'a [char],
    next_start: usize,
}

impl Iterator for Spans<'_> {
    type Item = EntitySpan;

    fn next(&mut self) -> Option<EntitySpan> {
        let width = self.needle.len();
        while self.next_start + width <= self.haystack.len() {
            let start = self.next_start;
            self.next_start += 1;
            if self.haystack[start..start + width] == *self.needle {
                return Some(EntitySpan {
                    start,
                    end: start + width,
                });
            }
        }
        self.next_start = self.haystack.len() + 1;
        None
    }
}

/// Collect every occurrence of `entity` in `text`.
pub fn find_entity_spans(text: &str, entity: &str) -> Result<Vec<EntitySpan>, CoreError> {
    Ok(EntityLocator::new(text, entity)?.spans().collect())
}
