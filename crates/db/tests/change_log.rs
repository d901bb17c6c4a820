//! Integration tests for `AnnotationChangeRepo`.

use annotator_core::change::{ChangeType, PendingChange};
use annotator_core::paging::MAX_CHANGE_LIMIT;
use annotator_db::models::annotation::CreateAnnotation;
use annotator_db::models::change::ChangeQuery;
use annotator_db::repositories::{AnnotationChangeRepo, AnnotationRepo};
use sqlx::PgPool;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn seed_annotation(pool: &PgPool, text: &str) -> i64 {
    AnnotationRepo::create(
        pool,
        &CreateAnnotation {
            text: text.to_string(),
            drugs: Vec::new(),
            adverse_events: Vec::new(),
            is_validated: None,
        },
    )
    .await
    .unwrap()
    .id
}

async fn log(pool: &PgPool, annotation_id: i64, change_type: ChangeType, name: &str, session: Option<&str>) {
    let change = PendingChange::entity(change_type, name, &[], &strings(&[name])).unwrap();
    AnnotationChangeRepo::log_entity_change(pool, annotation_id, &change, session)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_summary_counts_per_type(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    for name in ["a", "b", "c"] {
        log(&pool, id, ChangeType::DrugAdded, name, None).await;
    }
    log(&pool, id, ChangeType::DrugRemoved, "d", None).await;
    log(&pool, id, ChangeType::EventAdded, "e", None).await;
    log(&pool, id, ChangeType::EventAdded, "f", None).await;

    let summary = AnnotationChangeRepo::summary(&pool, id).await.unwrap();
    assert_eq!(summary.drug_additions, 3);
    assert_eq!(summary.drug_removals, 1);
    assert_eq!(summary.event_additions, 2);
    assert_eq!(summary.event_removals, 0);
    assert_eq!(summary.total_changes, 6);
    assert!(summary.last_change.is_some());

    let stats = summary.statistics();
    assert_eq!((stats.additions, stats.removals), (5, 1));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_summary_of_untouched_annotation(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    let summary = AnnotationChangeRepo::summary(&pool, id).await.unwrap();
    assert_eq!(summary.total_changes, 0);
    assert!(summary.last_change.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bulk_update_has_null_entity(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    let change = AnnotationChangeRepo::log_bulk_update(
        &pool,
        id,
        "drugs",
        serde_json::json!(["a"]),
        serde_json::json!(["b", "c"]),
        Some("s"),
    )
    .await
    .unwrap();

    assert_eq!(change.change_type, ChangeType::BulkUpdate);
    assert!(change.entity_name.is_none());
    assert_eq!(change.new_value, Some(serde_json::json!(["b", "c"])));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_query_filters_compose(pool: PgPool) {
    let first = seed_annotation(&pool, "one").await;
    let second = seed_annotation(&pool, "two").await;

    log(&pool, first, ChangeType::DrugAdded, "a", Some("s1")).await;
    log(&pool, first, ChangeType::EventAdded, "b", Some("s2")).await;
    log(&pool, second, ChangeType::DrugAdded, "c", Some("s1")).await;
    log(&pool, second, ChangeType::DrugRemoved, "d", None).await;

    let all = ChangeQuery::default();
    assert_eq!(AnnotationChangeRepo::count(&pool, &all).await.unwrap(), 4);

    let drug_added_s1 = ChangeQuery {
        change_type: Some(ChangeType::DrugAdded),
        session_id: Some("s1".into()),
        ..ChangeQuery::default()
    };
    assert_eq!(AnnotationChangeRepo::count(&pool, &drug_added_s1).await.unwrap(), 2);

    let scoped = ChangeQuery {
        annotation_id: Some(second),
        change_type: Some(ChangeType::DrugAdded),
        ..ChangeQuery::default()
    };
    let rows = AnnotationChangeRepo::query(&pool, &scoped).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].entity_name.as_deref(), Some("c"));

    let future = ChangeQuery {
        since: Some(chrono::Utc::now() + chrono::Duration::hours(1)),
        ..ChangeQuery::default()
    };
    assert_eq!(AnnotationChangeRepo::count(&pool, &future).await.unwrap(), 0);

    let paged = ChangeQuery {
        limit: Some(3),
        offset: Some(2),
        ..ChangeQuery::default()
    };
    assert_eq!(AnnotationChangeRepo::query(&pool, &paged).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_recent_is_newest_first_and_capped(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    for name in ["a", "b", "c"] {
        log(&pool, id, ChangeType::DrugAdded, name, None).await;
    }

    let recent = AnnotationChangeRepo::recent(&pool, id, 2).await.unwrap();
    let names: Vec<_> = recent.iter().filter_map(|c| c.entity_name.clone()).collect();
    assert_eq!(names, strings(&["c", "b"]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_recent_honors_zero_limit(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    for name in ["a", "b", "c"] {
        log(&pool, id, ChangeType::DrugAdded, name, None).await;
    }

    assert!(AnnotationChangeRepo::recent(&pool, id, 0).await.unwrap().is_empty());
    assert!(AnnotationChangeRepo::recent(&pool, id, -1).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_recent_limit_is_not_capped(pool: PgPool) {
    let id = seed_annotation(&pool, "t").await;
    let total = MAX_CHANGE_LIMIT + 1;
    let planned: Vec<PendingChange> = (0..total)
        .map(|i| {
            let name = format!("drug-{i}");
            PendingChange::entity(ChangeType::DrugAdded, &name, &[], &[name.clone()]).unwrap()
        })
        .collect();
    AnnotationChangeRepo::insert_many(&pool, id, &planned, None)
        .await
        .unwrap();

    let recent = AnnotationChangeRepo::recent(&pool, id, 1000).await.unwrap();
    assert_eq!(recent.len() as i64, total);
    assert_eq!(recent[0].entity_name.as_deref(), Some("drug-500"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_report_aggregates(pool: PgPool) {
    let first = seed_annotation(&pool, "one").await;
    let second = seed_annotation(&pool, "two").await;

    log(&pool, first, ChangeType::DrugAdded, "a", Some("s1")).await;
    log(&pool, first, ChangeType::DrugAdded, "b", Some("s1")).await;
    log(&pool, first, ChangeType::EventRemoved, "c", Some("s2")).await;
    log(&pool, second, ChangeType::DrugAdded, "d", None).await;

    let all = ChangeQuery::default();

    let counts = AnnotationChangeRepo::type_counts(&pool, &all).await.unwrap();
    assert_eq!(counts[0].change_type, ChangeType::DrugAdded);
    assert_eq!(counts[0].count, 3);
    assert_eq!(counts.len(), 2);

    let sessions = AnnotationChangeRepo::top_sessions(&pool, &all, 5).await.unwrap();
    let sessions: Vec<_> = sessions
        .into_iter()
        .map(|s| (s.session_id, s.change_count))
        .collect();
    assert_eq!(sessions, vec![("s1".to_string(), 2), ("s2".to_string(), 1)]);

    let active = AnnotationChangeRepo::most_active_annotations(&pool, &all, 1)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!((active[0].annotation_id, active[0].change_count), (first, 3));

    let summaries = AnnotationChangeRepo::summaries_for(&pool, &[first, second])
        .await
        .unwrap();
    assert_eq!(summaries[&first].total_changes, 3);
    assert_eq!(summaries[&second].drug_additions, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_report_zero_fills_types_and_scopes_sections(pool: PgPool) {
    let first = seed_annotation(&pool, "one").await;
    let second = seed_annotation(&pool, "two").await;
    log(&pool, first, ChangeType::DrugAdded, "a", Some("s1")).await;
    log(&pool, second, ChangeType::EventAdded, "b", Some("s2")).await;

    let report = AnnotationChangeRepo::report(&pool, &ChangeQuery::default())
        .await
        .unwrap();
    assert_eq!(report.total_changes, 2);
    assert_eq!(report.by_type.len(), ChangeType::ALL.len());
    let bulk = report
        .by_type
        .iter()
        .find(|c| c.change_type == ChangeType::BulkUpdate)
        .unwrap();
    assert_eq!(bulk.count, 0);
    assert_eq!(report.recent.len(), 2);
    assert_eq!(report.top_sessions.len(), 2);
    assert_eq!(report.most_active_annotations.len(), 2);

    let scoped = ChangeQuery {
        annotation_id: Some(first),
        ..ChangeQuery::default()
    };
    let report = AnnotationChangeRepo::report(&pool, &scoped).await.unwrap();
    assert_eq!(report.total_changes, 1);
    assert_eq!(report.recent[0].annotation_id, first);
    assert!(report.top_sessions.is_empty());
    assert!(report.most_active_annotations.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_purge_scoped_and_global(pool: PgPool) {
    let first = seed_annotation(&pool, "one").await;
    let second = seed_annotation(&pool, "two").await;
    log(&pool, first, ChangeType::DrugAdded, "a", None).await;
    log(&pool, second, ChangeType::DrugAdded, "b", None).await;
    log(&pool, second, ChangeType::DrugAdded, "c", None).await;

    assert_eq!(AnnotationChangeRepo::purge(&pool, Some(first)).await.unwrap(), 1);
    assert_eq!(AnnotationChangeRepo::purge(&pool, None).await.unwrap(), 2);
    assert_eq!(
        AnnotationChangeRepo::count(&pool, &ChangeQuery::default()).await.unwrap(),
        0
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_chronological_listing_for_export(pool: PgPool) {
    let first = seed_annotation(&pool, "one").await;
    let second = seed_annotation(&pool, "two").await;
    log(&pool, second, ChangeType::DrugAdded, "x", None).await;
    log(&pool, first, ChangeType::DrugAdded, "a", None).await;
    log(&pool, first, ChangeType::DrugRemoved, "b", None).await;

    let rows = AnnotationChangeRepo::list_chronological_for(&pool, &[first, second])
        .await
        .unwrap();
    let order: Vec<_> = rows
        .iter()
        .map(|c| (c.annotation_id, c.entity_name.clone().unwrap_or_default()))
        .collect();
    assert_eq!(
        order,
        vec![
            (first, "a".to_string()),
            (first, "b".to_string()),
            (second, "x".to_string()),
        ]
    );
}
