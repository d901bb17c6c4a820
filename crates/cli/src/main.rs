//! Maintenance commands for the annotation database.
//!
//! ```text
//! annotator show-changes [--annotation-id N] [--recent HOURS] [--type TYPE]
//! annotator check-tracking [--write-sample]
//! ```

mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use annotator_core::change::{ChangeType, PendingChange};
use annotator_core::types::DbId;
use annotator_db::models::change::ChangeQuery;
use annotator_db::repositories::{AnnotationChangeRepo, AnnotationRepo};
use annotator_db::DbPool;

use render::ReportScope;

/// Entity name written by `check-tracking --write-sample`.
const SAMPLE_DRUG: &str = "Test Drug";
const SAMPLE_SESSION: &str = "test_session";

#[derive(Parser)]
#[command(name = "annotator", version, about = "Annotation database maintenance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the change-tracking report
    ShowChanges {
        /// Only changes to this annotation
        #[arg(long)]
        annotation_id: Option<DbId>,
        /// Time window in hours; 0 disables it
        #[arg(long, default_value_t = 24)]
        recent: i64,
        /// Only changes of this type, e.g. drug_added
        #[arg(long = "type")]
        change_type: Option<ChangeType>,
    },
    /// Check that change tracking is recording edits
    CheckTracking {
        /// Log a sample drug addition on the first annotation
        #[arg(long)]
        write_sample: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annotator_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = annotator_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::debug!("Database connection pool created");

    match cli.command {
        Commands::ShowChanges {
            annotation_id,
            recent,
            change_type,
        } => {
            let scope = ReportScope {
                annotation_id,
                change_type,
                recent_hours: (recent > 0).then_some(recent),
            };
            show_changes(&pool, &scope).await
        }
        Commands::CheckTracking { write_sample } => check_tracking(&pool, write_sample).await,
    }
}

async fn show_changes(pool: &DbPool, scope: &ReportScope) -> anyhow::Result<()> {
    let since = match scope.recent_hours {
        Some(hours) => {
            let since = chrono::TimeDelta::try_hours(hours)
                .and_then(|window| chrono::Utc::now().checked_sub_signed(window))
                .with_context(|| format!("--recent {hours} is out of range"))?;
            Some(since)
        }
        None => None,
    };
    let query = ChangeQuery {
        annotation_id: scope.annotation_id,
        change_type: scope.change_type,
        since,
        ..ChangeQuery::default()
    };

    let report = AnnotationChangeRepo::report(pool, &query).await?;
    print!("{}", render::render_show_changes(scope, &report));
    Ok(())
}

async fn check_tracking(pool: &DbPool, write_sample: bool) -> anyhow::Result<()> {
    let counts = AnnotationRepo::counts(pool).await?;
    if counts.total == 0 {
        println!("No annotations found. Import data first.");
        return Ok(());
    }

    let report = AnnotationChangeRepo::report(pool, &ChangeQuery::default()).await?;
    print!("{}", render::render_tracking_check(counts.total, &report));

    if write_sample {
        let Some(annotation) = AnnotationRepo::first(pool).await? else {
            return Ok(());
        };
        write_sample_change(pool, annotation.id, &annotation.drugs).await?;
    }
    Ok(())
}

/// Record a sample addition without touching the annotation itself.
async fn write_sample_change(pool: &DbPool, id: DbId, drugs: &[String]) -> anyhow::Result<()> {
    let mut with_sample = drugs.to_vec();
    with_sample.push(SAMPLE_DRUG.to_string());
    let change = PendingChange::entity(ChangeType::DrugAdded, SAMPLE_DRUG, drugs, &with_sample)?;

    let logged = AnnotationChangeRepo::log_entity_change(pool, id, &change, Some(SAMPLE_SESSION))
        .await
        .context("Failed to record sample change")?;
    tracing::info!(annotation_id = id, change_id = logged.id, "Recorded sample change");

    let summary = AnnotationChangeRepo::summary(pool, id).await?;
    println!();
    print!("{}", render::render_summary(id, &summary));
    Ok(())
}
