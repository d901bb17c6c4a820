//! Repository for the `drug_list_entries` and `ade_list_entries` tables.

use annotator_core::entities::EntityKind;
use sqlx::PgPool;

use crate::models::vocabulary::VocabularyEntry;

/// Column list shared by both vocabulary tables.
const COLUMNS: &str = "id, name, created_at";

/// Operations on uploaded vocabulary lists. The table is chosen by entity kind.
pub struct VocabularyRepo;

impl VocabularyRepo {
    /// Add names to a vocabulary, skipping ones already present.
    /// Returns the number of names actually inserted.
    pub async fn insert_names(
        pool: &PgPool,
        kind: EntityKind,
        names: &[String],
    ) -> Result<u64, sqlx::Error> {
        if names.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {} (name) SELECT UNNEST($1::text[]) \
             ON CONFLICT (name) DO NOTHING",
            kind.vocabulary_table()
        );
        let result = sqlx::query(&query).bind(names).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// All entries of a vocabulary, alphabetically.
    pub async fn list(pool: &PgPool, kind: EntityKind) -> Result<Vec<VocabularyEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} ORDER BY name",
            kind.vocabulary_table()
        );
        sqlx::query_as::<_, VocabularyEntry>(&query)
            .fetch_all(pool)
            .await
    }

    /// Names only, alphabetically.
    pub async fn list_names(pool: &PgPool, kind: EntityKind) -> Result<Vec<String>, sqlx::Error> {
        let query = format!("SELECT name FROM {} ORDER BY name", kind.vocabulary_table());
        sqlx::query_scalar::<_, String>(&query).fetch_all(pool).await
    }
}
