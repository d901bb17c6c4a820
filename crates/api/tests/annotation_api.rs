//! HTTP-level integration tests for the annotation review endpoints.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, create_annotation, delete, get, post_json, put_json, put_json_with_session,
};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Create / get
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_annotation_returns_201(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(
        app,
        "/api/v1/annotations",
        json!({"text": "Took aspirin, felt nausea.", "drugs": " aspirin , ", "adverse_events": ["nausea"]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["drugs"], json!(["aspirin"]));
    assert_eq!(json["data"]["adverse_events"], json!(["nausea"]));
    assert_eq!(json["data"]["is_validated"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_rejects_blank_text(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/annotations", json!({"text": "   "})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_annotation_with_neighbors_and_highlighting(pool: PgPool) {
    let first = create_annotation(&pool, "first", &[], &[]).await;
    let second = create_annotation(&pool, "Took Aspirin daily", &["aspirin"], &[]).await;
    let third = create_annotation(&pool, "third", &[], &[]).await;

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/annotations/{second}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["id"], second);
    assert_eq!(data["previous_id"], first);
    assert_eq!(data["next_id"], third);
    assert_eq!(
        data["highlighted_text"],
        "Took <span class=\"drug\">Aspirin</span> daily"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_nonexistent_annotation_returns_404(pool: PgPool) {
    let response = get(common::build_test_app(pool), "/api/v1/annotations/999999").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_start_prefers_first_unvalidated(pool: PgPool) {
    let response = get(common::build_test_app(pool.clone()), "/api/v1/annotations/start").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"].is_null());

    let first = create_annotation(&pool, "one", &[], &[]).await;
    let second = create_annotation(&pool, "two", &[], &[]).await;
    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/annotations/validation",
        json!({"ids": [first], "is_validated": true}),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["updated"], 1);

    let response = get(common::build_test_app(pool.clone()), "/api/v1/annotations/start").await;
    assert_eq!(body_json(response).await["data"]["id"], second);

    post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/annotations/validation",
        json!({"ids": [second], "is_validated": true}),
    )
    .await;
    let response = get(common::build_test_app(pool), "/api/v1/annotations/start").await;
    assert_eq!(body_json(response).await["data"]["id"], first);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_paginates_with_default_page_size(pool: PgPool) {
    for i in 0..12 {
        create_annotation(&pool, &format!("note {i}"), &[], &[]).await;
    }

    let response = get(common::build_test_app(pool.clone()), "/api/v1/annotations").await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["items"].as_array().unwrap().len(), 10);
    assert_eq!(data["page"]["total"], 12);
    assert_eq!(data["page"]["total_pages"], 2);
    assert_eq!(data["counts"]["unvalidated"], 12);

    let response = get(common::build_test_app(pool), "/api/v1/annotations?page=2").await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["items"].as_array().unwrap().len(), 2);
    assert_eq!(data["page"]["page"], 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_filters_by_search_and_status(pool: PgPool) {
    let hit = create_annotation(&pool, "Severe HEADACHE after dose", &[], &[]).await;
    create_annotation(&pool, "no complaints", &[], &[]).await;

    let response = get(
        common::build_test_app(pool.clone()),
        "/api/v1/annotations?search=headache&status=",
    )
    .await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["items"][0]["id"], hit);

    let response = get(
        common::build_test_app(pool.clone()),
        "/api/v1/annotations?status=validated",
    )
    .await;
    let data = body_json(response).await["data"].clone();
    assert!(data["items"].as_array().unwrap().is_empty());
    assert_eq!(data["counts"]["total"], 2);

    let response = get(common::build_test_app(pool), "/api/v1/annotations?status=done").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_logs_one_event_per_entity(pool: PgPool) {
    let id = create_annotation(&pool, "aspirin and ibuprofen", &["ibuprofen"], &[]).await;
    let next = create_annotation(&pool, "next", &[], &[]).await;

    let response = put_json_with_session(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/annotations/{id}"),
        "session-1",
        json!({"drugs": "aspirin", "is_validated": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["annotation"]["drugs"], json!(["aspirin"]));
    assert_eq!(data["annotation"]["is_validated"], true);
    assert_eq!(data["annotation"]["text"], "aspirin and ibuprofen");
    assert_eq!(data["next_id"], next);

    let changes = data["changes"].as_array().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["change_type"], "drug_added");
    assert_eq!(changes[0]["entity_name"], "aspirin");
    assert_eq!(changes[1]["change_type"], "drug_removed");
    assert_eq!(changes[1]["entity_name"], "ibuprofen");
    for change in changes {
        assert_eq!(change["old_value"], json!(["ibuprofen"]));
        assert_eq!(change["new_value"], json!(["aspirin"]));
        assert_eq!(change["session_id"], "session-1");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_without_entity_changes_logs_nothing(pool: PgPool) {
    let id = create_annotation(&pool, "text", &["aspirin"], &["rash"]).await;

    let response = put_json(
        common::build_test_app(pool),
        &format!("/api/v1/annotations/{id}"),
        json!({"text": "", "drugs": ["aspirin"], "adverse_events": "rash"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert!(data["changes"].as_array().unwrap().is_empty());
    assert_eq!(data["annotation"]["text"], "text");
    assert!(data["next_id"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_rejects_blank_entity(pool: PgPool) {
    let id = create_annotation(&pool, "text", &["aspirin"], &[]).await;

    let response = put_json(
        common::build_test_app(pool.clone()),
        &format!("/api/v1/annotations/{id}"),
        json!({"drugs": ["aspirin", " "]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    // Nothing was written.
    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/annotations/{id}/changes"),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["summary"]["total_changes"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_rejects_nul_characters(pool: PgPool) {
    let id = create_annotation(&pool, "text", &["aspirin"], &[]).await;

    for body in [
        json!({"drugs": ["aspirin", "war\u{0}farin"]}),
        json!({"adverse_events": "rash, nau\u{0}sea"}),
        json!({"text": "new \u{0} text"}),
    ] {
        let response = put_json(
            common::build_test_app(pool.clone()),
            &format!("/api/v1/annotations/{id}"),
            body,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    let response = post_json(
        common::build_test_app(pool.clone()),
        "/api/v1/annotations",
        json!({"text": "bad \u{0} text"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(
        common::build_test_app(pool),
        &format!("/api/v1/annotations/{id}/changes"),
    )
    .await;
    assert_eq!(body_json(response).await["data"]["summary"]["total_changes"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_save_unknown_annotation_returns_404(pool: PgPool) {
    let response = put_json(
        common::build_test_app(pool),
        "/api/v1/annotations/424242",
        json!({"drugs": ["aspirin"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_oversized_session_header_is_rejected(pool: PgPool) {
    let id = create_annotation(&pool, "text", &[], &[]).await;

    let response = put_json_with_session(
        common::build_test_app(pool),
        &format!("/api/v1/annotations/{id}"),
        &"s".repeat(200),
        json!({"drugs": ["aspirin"]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Delete / bulk validation
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_annotation(pool: PgPool) {
    let id = create_annotation(&pool, "doomed", &[], &[]).await;
    let uri = format!("/api/v1/annotations/{id}");

    let response = delete(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = delete(common::build_test_app(pool.clone()), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(common::build_test_app(pool), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_bulk_validation_requires_ids(pool: PgPool) {
    let response = post_json(
        common::build_test_app(pool),
        "/api/v1/annotations/validation",
        json!({"ids": [], "is_validated": true}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
