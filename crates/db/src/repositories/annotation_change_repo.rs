//! Repository for the append-only `annotation_changes` table.

use std::collections::HashMap;

use annotator_core::change::{ChangeSummary, ChangeType, PendingChange};
use annotator_core::paging::{clamp_limit, clamp_offset, DEFAULT_CHANGE_LIMIT, MAX_CHANGE_LIMIT};
use annotator_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::change::{
    AnnotationActivity, AnnotationChange, ChangeQuery, ChangeReport, ChangeTypeCount,
    SessionActivity,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for `annotation_changes` SELECT queries.
const COLUMNS: &str = "\
    id, annotation_id, change_type, field_name, entity_name, \
    old_value, new_value, timestamp, session_id";

/// Column list for INSERT (excludes auto-generated `id` and `timestamp`).
const INSERT_COLUMNS: &str = "\
    annotation_id, change_type, field_name, entity_name, old_value, new_value, session_id";

/// Newest first; id breaks ties between events of the same save.
const NEWEST_FIRST: &str = "ORDER BY timestamp DESC, id DESC";

/// Most recent changes listed in a report.
pub const REPORT_RECENT_LIMIT: i64 = 10;

/// Busiest sessions listed in a report.
pub const REPORT_SESSION_LIMIT: i64 = 5;

/// Busiest annotations listed in a report.
pub const REPORT_ANNOTATION_LIMIT: i64 = 10;

// ---------------------------------------------------------------------------
// AnnotationChangeRepo
// ---------------------------------------------------------------------------

/// Append and query operations for annotation change events.
pub struct AnnotationChangeRepo;

impl AnnotationChangeRepo {
    /// Insert planned changes for one annotation in a single statement.
    ///
    /// Accepts any executor so the annotation save can run it inside its own
    /// transaction. Rows come back in insertion order.
    pub async fn insert_many<'e, E>(
        executor: E,
        annotation_id: DbId,
        changes: &[PendingChange],
        session_id: Option<&str>,
    ) -> Result<Vec<AnnotationChange>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = format!("INSERT INTO annotation_changes ({INSERT_COLUMNS}) VALUES ");
        let mut param_idx = 1u32;
        for (row, _) in changes.iter().enumerate() {
            if row > 0 {
                query.push_str(", ");
            }
            query.push('(');
            for i in 0..7 {
                if i > 0 {
                    query.push_str(", ");
                }
                query.push_str(&format!("${param_idx}"));
                param_idx += 1;
            }
            query.push(')');
        }
        query.push_str(&format!(" RETURNING {COLUMNS}"));

        let mut q = sqlx::query_as::<_, AnnotationChange>(&query);
        for change in changes {
            q = q
                .bind(annotation_id)
                .bind(change.change_type.as_str())
                .bind(&change.field_name)
                .bind(&change.entity_name)
                .bind(&change.old_value)
                .bind(&change.new_value)
                .bind(session_id);
        }

        let mut rows = q.fetch_all(executor).await?;
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    /// Record one entity addition or removal built with
    /// [`PendingChange::entity`].
    pub async fn log_entity_change(
        pool: &PgPool,
        annotation_id: DbId,
        change: &PendingChange,
        session_id: Option<&str>,
    ) -> Result<AnnotationChange, sqlx::Error> {
        Self::insert_one(pool, annotation_id, change, session_id).await
    }

    /// Record a whole-field update with no single entity attached.
    pub async fn log_bulk_update(
        pool: &PgPool,
        annotation_id: DbId,
        field_name: &str,
        old_value: serde_json::Value,
        new_value: serde_json::Value,
        session_id: Option<&str>,
    ) -> Result<AnnotationChange, sqlx::Error> {
        let change = PendingChange::bulk_update(field_name, old_value, new_value);
        Self::insert_one(pool, annotation_id, &change, session_id).await
    }

    async fn insert_one(
        pool: &PgPool,
        annotation_id: DbId,
        change: &PendingChange,
        session_id: Option<&str>,
    ) -> Result<AnnotationChange, sqlx::Error> {
        Self::insert_many(pool, annotation_id, std::slice::from_ref(change), session_id)
            .await?
            .into_iter()
            .next()
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// All changes of one annotation, newest first.
    pub async fn list_by_annotation(
        pool: &PgPool,
        annotation_id: DbId,
    ) -> Result<Vec<AnnotationChange>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotation_changes WHERE annotation_id = $1 {NEWEST_FIRST}"
        );
        sqlx::query_as::<_, AnnotationChange>(&query)
            .bind(annotation_id)
            .fetch_all(pool)
            .await
    }

    /// Changes for several annotations, oldest first within each annotation.
    pub async fn list_chronological_for(
        pool: &PgPool,
        annotation_ids: &[DbId],
    ) -> Result<Vec<AnnotationChange>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotation_changes WHERE annotation_id = ANY($1) \
             ORDER BY annotation_id, timestamp ASC, id ASC"
        );
        sqlx::query_as::<_, AnnotationChange>(&query)
            .bind(annotation_ids)
            .fetch_all(pool)
            .await
    }

    /// At most `limit` most recent changes of one annotation, newest first.
    ///
    /// The limit is taken as given; `limit <= 0` yields nothing. Callers
    /// exposing this over HTTP clamp the value themselves.
    pub async fn recent(
        pool: &PgPool,
        annotation_id: DbId,
        limit: i64,
    ) -> Result<Vec<AnnotationChange>, sqlx::Error> {
        if limit <= 0 {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM annotation_changes WHERE annotation_id = $1 {NEWEST_FIRST} \
             LIMIT $2"
        );
        sqlx::query_as::<_, AnnotationChange>(&query)
            .bind(annotation_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Query changes with filtering and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        params: &ChangeQuery,
    ) -> Result<Vec<AnnotationChange>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_CHANGE_LIMIT, MAX_CHANGE_LIMIT);
        let offset = clamp_offset(params.offset);

        let (where_clause, bind_values, bind_idx) = build_change_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM annotation_changes {where_clause} {NEWEST_FIRST} \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let q = bind_change_values(sqlx::query_as::<_, AnnotationChange>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count changes matching the filter. Limit and offset are ignored.
    pub async fn count(pool: &PgPool, params: &ChangeQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_change_filter(params);

        let query =
            format!("SELECT COUNT(*)::BIGINT AS count FROM annotation_changes {where_clause}");

        let q = bind_change_values_scalar(sqlx::query_scalar::<_, i64>(&query), &bind_values);
        q.fetch_one(pool).await
    }

    /// Per-type counts for changes matching the filter, most frequent first.
    pub async fn type_counts(
        pool: &PgPool,
        params: &ChangeQuery,
    ) -> Result<Vec<ChangeTypeCount>, sqlx::Error> {
        let (where_clause, bind_values, _) = build_change_filter(params);

        let query = format!(
            "SELECT change_type, COUNT(*)::BIGINT FROM annotation_changes {where_clause} \
             GROUP BY change_type ORDER BY 2 DESC, 1"
        );

        let rows = bind_change_values(sqlx::query_as::<_, (String, i64)>(&query), &bind_values)
            .fetch_all(pool)
            .await?;

        rows.into_iter()
            .map(|(change_type, count)| {
                Ok(ChangeTypeCount {
                    change_type: decode_change_type(change_type)?,
                    count,
                })
            })
            .collect()
    }

    /// Per-type tallies and latest timestamp for one annotation.
    pub async fn summary(pool: &PgPool, annotation_id: DbId) -> Result<ChangeSummary, sqlx::Error> {
        let params = ChangeQuery {
            annotation_id: Some(annotation_id),
            ..ChangeQuery::default()
        };
        let counts = Self::type_counts(pool, &params).await?;

        let last_change = sqlx::query_scalar::<_, Option<Timestamp>>(
            "SELECT MAX(timestamp) FROM annotation_changes WHERE annotation_id = $1",
        )
        .bind(annotation_id)
        .fetch_one(pool)
        .await?;

        Ok(ChangeSummary::from_counts(
            counts.into_iter().map(|c| (c.change_type, c.count)),
            last_change,
        ))
    }

    /// Summaries for several annotations in one query.
    ///
    /// Annotations without changes are absent from the map.
    pub async fn summaries_for(
        pool: &PgPool,
        annotation_ids: &[DbId],
    ) -> Result<HashMap<DbId, ChangeSummary>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (DbId, String, i64, Timestamp)>(
            "SELECT annotation_id, change_type, COUNT(*)::BIGINT, MAX(timestamp) \
             FROM annotation_changes WHERE annotation_id = ANY($1) \
             GROUP BY annotation_id, change_type",
        )
        .bind(annotation_ids)
        .fetch_all(pool)
        .await?;

        let mut grouped: HashMap<DbId, (Vec<(ChangeType, i64)>, Option<Timestamp>)> =
            HashMap::new();
        for (annotation_id, change_type, count, last) in rows {
            let entry = grouped.entry(annotation_id).or_default();
            entry.0.push((decode_change_type(change_type)?, count));
            entry.1 = entry.1.max(Some(last));
        }

        Ok(grouped
            .into_iter()
            .map(|(id, (counts, last))| (id, ChangeSummary::from_counts(counts, last)))
            .collect())
    }

    /// Sessions with the most changes matching the filter.
    /// Changes without a session are not counted.
    pub async fn top_sessions(
        pool: &PgPool,
        params: &ChangeQuery,
        limit: i64,
    ) -> Result<Vec<SessionActivity>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_change_filter(params);
        let where_clause = and_condition(where_clause, "session_id IS NOT NULL");

        let query = format!(
            "SELECT session_id, COUNT(*)::BIGINT AS change_count \
             FROM annotation_changes {where_clause} \
             GROUP BY session_id ORDER BY change_count DESC, session_id \
             LIMIT ${bind_idx}"
        );

        bind_change_values(sqlx::query_as::<_, SessionActivity>(&query), &bind_values)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Annotations with the most changes matching the filter.
    pub async fn most_active_annotations(
        pool: &PgPool,
        params: &ChangeQuery,
        limit: i64,
    ) -> Result<Vec<AnnotationActivity>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_change_filter(params);

        let query = format!(
            "SELECT annotation_id, COUNT(*)::BIGINT AS change_count, MAX(timestamp) AS last_change \
             FROM annotation_changes {where_clause} \
             GROUP BY annotation_id ORDER BY change_count DESC, annotation_id \
             LIMIT ${bind_idx}"
        );

        bind_change_values(sqlx::query_as::<_, AnnotationActivity>(&query), &bind_values)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Assemble the activity report for changes matching `params`.
    ///
    /// `limit` and `offset` on `params` are ignored; each section has its own
    /// fixed size.
    pub async fn report(pool: &PgPool, params: &ChangeQuery) -> Result<ChangeReport, sqlx::Error> {
        let params = ChangeQuery {
            limit: None,
            offset: None,
            ..params.clone()
        };

        let total_changes = Self::count(pool, &params).await?;
        let counts = Self::type_counts(pool, &params).await?;
        let by_type = ChangeType::ALL
            .into_iter()
            .map(|change_type| ChangeTypeCount {
                change_type,
                count: counts
                    .iter()
                    .find(|c| c.change_type == change_type)
                    .map_or(0, |c| c.count),
            })
            .collect();

        let recent = Self::query(
            pool,
            &ChangeQuery {
                limit: Some(REPORT_RECENT_LIMIT),
                ..params.clone()
            },
        )
        .await?;

        let top_sessions = if params.annotation_id.is_none() && params.session_id.is_none() {
            Self::top_sessions(pool, &params, REPORT_SESSION_LIMIT).await?
        } else {
            Vec::new()
        };

        let most_active_annotations = if params.annotation_id.is_none() {
            Self::most_active_annotations(pool, &params, REPORT_ANNOTATION_LIMIT).await?
        } else {
            Vec::new()
        };

        Ok(ChangeReport {
            total_changes,
            by_type,
            recent,
            top_sessions,
            most_active_annotations,
        })
    }

    /// Delete change events, for one annotation or all of them.
    /// Returns the number of rows removed.
    pub async fn purge(pool: &PgPool, annotation_id: Option<DbId>) -> Result<u64, sqlx::Error> {
        let result = match annotation_id {
            Some(id) => {
                sqlx::query("DELETE FROM annotation_changes WHERE annotation_id = $1")
                    .bind(id)
                    .execute(pool)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM annotation_changes")
                    .execute(pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built change queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}

/// Build a WHERE clause and bind values from `ChangeQuery` filter parameters.
///
/// Returns `(where_clause, bind_values, next_bind_index)`.
/// The `where_clause` is empty if no filters are active, or starts with `WHERE `.
fn build_change_filter(params: &ChangeQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(annotation_id) = params.annotation_id {
        conditions.push(format!("annotation_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(annotation_id));
    }

    if let Some(change_type) = params.change_type {
        conditions.push(format!("change_type = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(change_type.as_str().to_string()));
    }

    if let Some(since) = params.since {
        conditions.push(format!("timestamp >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(since));
    }

    if let Some(ref session_id) = params.session_id {
        conditions.push(format!("session_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(session_id.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Append one more condition to a clause produced by [`build_change_filter`].
fn and_condition(where_clause: String, condition: &str) -> String {
    if where_clause.is_empty() {
        format!("WHERE {condition}")
    } else {
        format!("{where_clause} AND {condition}")
    }
}

fn decode_change_type(value: String) -> Result<ChangeType, sqlx::Error> {
    ChangeType::try_from(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_change_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_change_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
