use annotator_core::entities::EntityKind;
use annotator_db::repositories::VocabularyRepo;
use sqlx::PgPool;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_insert_skips_existing_names(pool: PgPool) {
    let added = VocabularyRepo::insert_names(&pool, EntityKind::Drug, &strings(&["warfarin", "aspirin"]))
        .await
        .unwrap();
    assert_eq!(added, 2);

    let added = VocabularyRepo::insert_names(&pool, EntityKind::Drug, &strings(&["aspirin", "heparin"]))
        .await
        .unwrap();
    assert_eq!(added, 1);

    let names = VocabularyRepo::list_names(&pool, EntityKind::Drug).await.unwrap();
    assert_eq!(names, strings(&["aspirin", "heparin", "warfarin"]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_vocabularies_are_separate(pool: PgPool) {
    VocabularyRepo::insert_names(&pool, EntityKind::AdverseEvent, &strings(&["rash"]))
        .await
        .unwrap();

    assert!(VocabularyRepo::list(&pool, EntityKind::Drug).await.unwrap().is_empty());
    let events = VocabularyRepo::list(&pool, EntityKind::AdverseEvent).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "rash");

    assert_eq!(
        VocabularyRepo::insert_names(&pool, EntityKind::AdverseEvent, &[]).await.unwrap(),
        0
    );
}
