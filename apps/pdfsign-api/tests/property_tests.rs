//! Property-based tests for pdfsign-api
//!
//! Drives the router with generated field payloads and checks the models
//! keep what the editor sent.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http_body_util::BodyExt;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdfsign_api::models::{MatteSignatureRequest, SignPdfRequest};
use pdfsign_api::{app, AppState, Config};
use proptest::prelude::*;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower::ServiceExt;

fn two_page_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..2)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            }))
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 2,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", "alice")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Upload a fresh two-page PDF and sign it with a single field
async fn sign_one(field: Value) -> (StatusCode, Value) {
    let uploads = tempfile::tempdir().unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let config = Config::for_tests(uploads.path().to_path_buf());
    let router = app(Arc::new(AppState::with_pool(config, pool).await.unwrap()));

    let (status, uploaded) = post(
        &router,
        "/api/pdf/upload",
        json!({ "fileName": "form.pdf", "pdfBase64": BASE64.encode(two_page_pdf()) }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    post(
        &router,
        "/api/pdf/sign",
        json!({ "pdfId": uploaded["id"], "fields": [field] }),
    )
    .await
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn field_kind() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[A-Za-z ]{1,20}".prop_map(|v| json!({ "type": "text", "value": format!("x{}", v) })),
        Just(json!({ "type": "date", "value": "" })),
        any::<bool>().prop_map(|checked| json!({ "type": "radio", "checked": checked })),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_geometry_signs_and_reports_the_field(
        kind in field_kind(),
        page in -1i64..5,
        x in -0.5f64..1.5,
        y in -0.5f64..1.5,
        w in -0.2f64..1.5,
        h in -0.2f64..1.5,
    ) {
        let mut field = json!({
            "id": "generated",
            "page": page,
            "xPercent": x,
            "yPercent": y,
            "widthPercent": w,
            "heightPercent": h,
        });
        for (key, value) in kind.as_object().unwrap() {
            field[key] = value.clone();
        }

        let (status, body) = block_on(sign_one(field));
        prop_assert_eq!(status, StatusCode::OK);

        let outcomes = body["fields"].as_array().unwrap();
        prop_assert_eq!(outcomes.len(), 1);
        prop_assert_eq!(&outcomes[0]["id"], "generated");
        if (1..=2).contains(&page) {
            prop_assert!(outcomes[0].get("skipped").is_none());
        } else {
            prop_assert_eq!(&outcomes[0]["skipped"]["reason"], "invalidPage");
        }
    }

    #[test]
    fn sign_request_keeps_fields_verbatim(extra in "[a-z]{1,12}", n in 0usize..5) {
        let fields: Vec<Value> = (0..n)
            .map(|i| json!({ "id": i.to_string(), "type": "text", "note": extra }))
            .collect();
        let raw = json!({ "pdfId": "p1", "fields": fields.clone() });
        let req: SignPdfRequest = serde_json::from_value(raw).unwrap();
        prop_assert_eq!(req.fields, fields);
    }

    #[test]
    fn matte_strength_is_preserved(strength in 0.1f32..5.0) {
        let raw = json!({ "imageBase64": "AAAA", "strength": strength });
        let req: MatteSignatureRequest = serde_json::from_value(raw).unwrap();
        prop_assert_eq!(req.strength, strength);
    }
}

#[test]
fn matte_strength_defaults_to_one() {
    let req: MatteSignatureRequest =
        serde_json::from_value(json!({ "imageBase64": "AAAA" })).unwrap();
    assert_eq!(req.strength, 1.0);
}
