//! Repository for the `annotations` table.

use annotator_core::change::{plan_annotation_changes, EntitySnapshots, PendingChange};
use annotator_core::entities::EntityKind;
use annotator_core::export::ExportFilter;
use annotator_core::jsonl::FlatRecord;
use annotator_core::types::DbId;
use sqlx::PgPool;

use crate::models::annotation::{
    Annotation, AnnotationCounts, AnnotationFilter, AnnotationNeighbors, CreateAnnotation,
    ImportOutcome, SavedAnnotation, UpdateAnnotation,
};
use crate::repositories::AnnotationChangeRepo;

/// Column list for `annotations` queries.
const COLUMNS: &str = "id, text, drugs, adverse_events, is_validated, created_at, updated_at";

/// Rows per INSERT statement during import (6 parameters per row).
const IMPORT_BATCH_SIZE: usize = 1000;

/// Provides CRUD, listing, and edit-tracking operations for annotations.
pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Insert a new annotation, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateAnnotation) -> Result<Annotation, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotations (text, drugs, adverse_events, is_validated)
             VALUES ($1, $2, $3, COALESCE($4, false))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .bind(&input.text)
            .bind(&input.drugs)
            .bind(&input.adverse_events)
            .bind(input.is_validated)
            .fetch_one(pool)
            .await
    }

    /// Find an annotation by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotations WHERE id = $1");
        sqlx::query_as::<_, Annotation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lowest-id annotation.
    pub async fn first(pool: &PgPool) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotations ORDER BY id LIMIT 1");
        sqlx::query_as::<_, Annotation>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Lowest-id annotation that has not been validated yet.
    pub async fn first_unvalidated(pool: &PgPool) -> Result<Option<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations WHERE is_validated = false ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Annotation>(&query)
            .fetch_optional(pool)
            .await
    }

    /// Annotations immediately before and after `id` in id order.
    ///
    /// `id` itself need not exist.
    pub async fn neighbors(pool: &PgPool, id: DbId) -> Result<AnnotationNeighbors, sqlx::Error> {
        let prev_query =
            format!("SELECT {COLUMNS} FROM annotations WHERE id < $1 ORDER BY id DESC LIMIT 1");
        let next_query =
            format!("SELECT {COLUMNS} FROM annotations WHERE id > $1 ORDER BY id ASC LIMIT 1");

        let previous = sqlx::query_as::<_, Annotation>(&prev_query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        let next = sqlx::query_as::<_, Annotation>(&next_query)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(AnnotationNeighbors { previous, next })
    }

    /// Save an annotation and record its entity changes atomically.
    ///
    /// The row is locked for the duration of the transaction. One change event
    /// is written per added or removed drug/adverse event, plus a bulk update
    /// when the text itself changed. Returns `None` if the annotation does not
    /// exist. Entity lists are expected to be normalised by the caller.
    pub async fn save_with_changes(
        pool: &PgPool,
        id: DbId,
        input: &UpdateAnnotation,
        session_id: Option<&str>,
    ) -> Result<Option<SavedAnnotation>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let lock_query = format!("SELECT {COLUMNS} FROM annotations WHERE id = $1 FOR UPDATE");
        let Some(current) = sqlx::query_as::<_, Annotation>(&lock_query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let text = input.text.as_ref().unwrap_or(&current.text);
        let drugs = input.drugs.as_ref().unwrap_or(&current.drugs);
        let adverse_events = input
            .adverse_events
            .as_ref()
            .unwrap_or(&current.adverse_events);
        let is_validated = input.is_validated.unwrap_or(current.is_validated);

        let mut planned = plan_annotation_changes(EntitySnapshots {
            old_drugs: &current.drugs,
            new_drugs: drugs,
            old_events: &current.adverse_events,
            new_events: adverse_events,
        });
        if *text != current.text {
            planned.push(PendingChange::bulk_update(
                "text",
                serde_json::json!(current.text),
                serde_json::json!(text),
            ));
        }

        let update_query = format!(
            "UPDATE annotations SET text = $2, drugs = $3, adverse_events = $4, is_validated = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let annotation = sqlx::query_as::<_, Annotation>(&update_query)
            .bind(id)
            .bind(text)
            .bind(drugs)
            .bind(adverse_events)
            .bind(is_validated)
            .fetch_one(&mut *tx)
            .await?;

        let changes = AnnotationChangeRepo::insert_many(&mut *tx, id, &planned, session_id).await?;

        tx.commit().await?;

        tracing::debug!(annotation_id = id, changes = changes.len(), "Annotation saved");
        Ok(Some(SavedAnnotation {
            annotation,
            changes,
        }))
    }

    /// Delete an annotation. Its change events go with it (cascade).
    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM annotations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One page of annotations matching the filter, in id order.
    pub async fn list_page(
        pool: &PgPool,
        filter: &AnnotationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_annotation_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM annotations {where_clause} ORDER BY id \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let mut q = sqlx::query_as::<_, Annotation>(&query);
        for val in &bind_values {
            match val {
                BindValue::Text(v) => q = q.bind(v.as_str()),
                BindValue::Bool(v) => q = q.bind(*v),
            }
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count annotations matching the filter.
    pub async fn count(pool: &PgPool, filter: &AnnotationFilter) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_annotation_filter(filter);

        let query = format!("SELECT COUNT(*)::BIGINT FROM annotations {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for val in &bind_values {
            match val {
                BindValue::Text(v) => q = q.bind(v.as_str()),
                BindValue::Bool(v) => q = q.bind(*v),
            }
        }
        q.fetch_one(pool).await
    }

    /// Total, validated, and unvalidated counts in one pass.
    pub async fn counts(pool: &PgPool) -> Result<AnnotationCounts, sqlx::Error> {
        sqlx::query_as::<_, AnnotationCounts>(
            "SELECT COUNT(*)::BIGINT AS total, \
                    COUNT(*) FILTER (WHERE is_validated)::BIGINT AS validated, \
                    COUNT(*) FILTER (WHERE NOT is_validated)::BIGINT AS unvalidated \
             FROM annotations",
        )
        .fetch_one(pool)
        .await
    }

    /// Every annotation in id order.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM annotations ORDER BY id");
        sqlx::query_as::<_, Annotation>(&query)
            .fetch_all(pool)
            .await
    }

    /// Annotations selected by an export filter, in id order.
    pub async fn list_for_export(
        pool: &PgPool,
        filter: ExportFilter,
    ) -> Result<Vec<Annotation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotations {} ORDER BY id",
            export_condition(filter)
        );
        sqlx::query_as::<_, Annotation>(&query)
            .fetch_all(pool)
            .await
    }

    /// Mark a set of annotations validated or unvalidated.
    /// Unknown ids are ignored; returns the number of rows updated.
    pub async fn set_validated_bulk(
        pool: &PgPool,
        ids: &[DbId],
        is_validated: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE annotations SET is_validated = $1 WHERE id = ANY($2)")
            .bind(is_validated)
            .bind(ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Distinct entity names of one kind present anywhere in the corpus.
    pub async fn observed_entity_names(
        pool: &PgPool,
        kind: EntityKind,
    ) -> Result<Vec<String>, sqlx::Error> {
        // The column name comes from a closed enum, never from input.
        let query = format!(
            "SELECT DISTINCT name FROM (SELECT unnest({}) AS name FROM annotations) n ORDER BY name",
            kind.field_name()
        );
        sqlx::query_scalar::<_, String>(&query).fetch_all(pool).await
    }

    /// Import parsed records in one transaction.
    ///
    /// With `clear_existing`, every annotation (and by cascade every change
    /// event) is deleted first. Missing `is_validated` defaults to false and
    /// missing timestamps to now.
    pub async fn import(
        pool: &PgPool,
        records: &[FlatRecord],
        clear_existing: bool,
    ) -> Result<ImportOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let cleared = if clear_existing {
            sqlx::query("DELETE FROM annotations")
                .execute(&mut *tx)
                .await?
                .rows_affected()
        } else {
            0
        };

        let mut imported = 0u64;
        for chunk in records.chunks(IMPORT_BATCH_SIZE) {
            let mut query = String::from(
                "INSERT INTO annotations \
                 (text, drugs, adverse_events, is_validated, created_at, updated_at) VALUES ",
            );
            for (row, _) in chunk.iter().enumerate() {
                if row > 0 {
                    query.push_str(", ");
                }
                let p = row * 6;
                query.push_str(&format!(
                    "(${}, ${}, ${}, COALESCE(${}, false), COALESCE(${}, NOW()), COALESCE(${}, NOW()))",
                    p + 1,
                    p + 2,
                    p + 3,
                    p + 4,
                    p + 5,
                    p + 6
                ));
            }

            let mut q = sqlx::query(&query);
            for record in chunk {
                q = q
                    .bind(&record.text)
                    .bind(&record.drugs)
                    .bind(&record.adverse_events)
                    .bind(record.is_validated)
                    .bind(record.created_at)
                    .bind(record.updated_at);
            }
            imported += q.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(ImportOutcome { imported, cleared })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built annotation queries.
enum BindValue {
    Text(String),
    Bool(bool),
}

/// Build a WHERE clause and bind values from an `AnnotationFilter`.
///
/// Returns `(where_clause, bind_values, next_bind_index)`.
fn build_annotation_filter(filter: &AnnotationFilter) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push(format!("text ILIKE ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(format!("%{}%", escape_like(search))));
    }

    if let Some(status) = filter.status {
        conditions.push(format!("is_validated = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Bool(status.as_bool()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Escape LIKE wildcards so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn export_condition(filter: ExportFilter) -> &'static str {
    match filter {
        ExportFilter::All => "",
        ExportFilter::Annotated => {
            "WHERE (cardinality(drugs) > 0 OR cardinality(adverse_events) > 0)"
        }
        ExportFilter::Validated => "WHERE is_validated",
        ExportFilter::AnnotatedValidated => {
            "WHERE is_validated AND (cardinality(drugs) > 0 OR cardinality(adverse_events) > 0)"
        }
        ExportFilter::Modified => {
            "WHERE EXISTS (SELECT 1 FROM annotation_changes c WHERE c.annotation_id = annotations.id)"
        }
    }
}
