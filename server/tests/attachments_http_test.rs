//! HTTP Integration Tests for Attachment Batches
//!
//! Run with: `cargo test --test attachments_http_test -- --nocapture`

mod helpers;

use axum::body::Body;
use axum::http::Method;
use helpers::{
    body_json, caller_with, fresh_test_app, multipart_body, multipart_content_type, Part, TestApp,
};
use mm_server::permissions::Capability;
use uuid::Uuid;

fn batch_request(parent_kind: &str, parent_id: Uuid, parts: &[Part<'_>]) -> axum::http::Request<Body> {
    TestApp::request(
        Method::POST,
        &format!("/api/attachments/{parent_kind}/{parent_id}"),
    )
    .header("Content-Type", multipart_content_type())
    .body(Body::from(multipart_body(parts)))
    .unwrap()
}

#[tokio::test]
async fn test_batch_stores_all_files() {
    let app = fresh_test_app().await;
    let caller = caller_with(
        Capability::VIEW_MEDIA | Capability::MANAGE_ATTACHMENTS,
        Some(Uuid::now_v7()),
    );
    let note_id = Uuid::now_v7();

    let resp = app
        .oneshot_as(
            batch_request(
                "note",
                note_id,
                &[
                    Part::file("files", "a.txt", "text/plain", b"alpha".to_vec()),
                    Part::file("files", "b.txt", "text/plain", b"beta".to_vec()),
                    Part::file("files", "c.txt", "text/plain", b"gamma".to_vec()),
                ],
            ),
            &caller,
        )
        .await;
    assert_eq!(resp.status(), 201);
    let json = body_json(resp).await;
    assert_eq!(json.as_array().unwrap().len(), 3);
    for record in json.as_array().unwrap() {
        assert_eq!(record["parent_kind"], "note");
        assert_eq!(record["sha256"].as_str().unwrap().len(), 64);
    }

    let resp = app
        .oneshot_as(
            TestApp::request(Method::GET, &format!("/api/attachments/note/{note_id}"))
                .body(Body::empty())
                .unwrap(),
            &caller,
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_json(resp).await.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_batch_with_bad_member_stores_nothing() {
    let app = fresh_test_app().await;
    let caller = caller_with(
        Capability::VIEW_MEDIA | Capability::MANAGE_ATTACHMENTS,
        None,
    );
    let note_id = Uuid::now_v7();

    // Third member is binary data claiming to be plain text
    let resp = app
        .oneshot_as(
            batch_request(
                "note",
                note_id,
                &[
                    Part::file("files", "a.txt", "text/plain", b"alpha".to_vec()),
                    Part::file("files", "b.txt", "text/plain", b"beta".to_vec()),
                    Part::file("files", "evil.txt", "text/plain", vec![0x00, 0x01, 0x02]),
                ],
            ),
            &caller,
        )
        .await;
    assert_eq!(resp.status(), 415);

    // All-or-nothing: the two valid members must not survive
    let resp = app
        .oneshot_as(
            TestApp::request(Method::GET, &format!("/api/attachments/note/{note_id}"))
                .body(Body::empty())
                .unwrap(),
            &caller,
        )
        .await;
    assert!(body_json(resp).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_requires_capability() {
    let app = fresh_test_app().await;
    let caller = caller_with(Capability::VIEW_MEDIA | Capability::UPLOAD_MEDIA, None);

    let resp = app
        .oneshot_as(
            batch_request(
                "note",
                Uuid::now_v7(),
                &[Part::file("files", "a.txt", "text/plain", b"alpha".to_vec())],
            ),
            &caller,
        )
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_empty_batch_rejected() {
    let app = fresh_test_app().await;
    let caller = caller_with(Capability::MANAGE_ATTACHMENTS, None);

    let resp = app
        .oneshot_as(batch_request("note", Uuid::now_v7(), &[]), &caller)
        .await;
    assert_eq!(resp.status(), 400);
}
