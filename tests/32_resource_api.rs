mod common;

use anyhow::Result;
use reqwest::{header, Method, StatusCode};
use serde_json::{json, Value};

use common::{employee, hr_manager, TestServer};

#[tokio::test]
async fn get_returns_record() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.get("/api/leaves/abc123", &employee()).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["id"], "abc123");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["tenant_id"], "t1");
    Ok(())
}

#[tokio::test]
async fn get_missing_record_is_null() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.get("/api/leaves/does-not-exist", &employee()).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, Value::Null);
    Ok(())
}

#[tokio::test]
async fn put_updates_only_named_fields() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put("/api/leaves/abc123", &hr_manager(), &json!({ "status": "approved" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["reason"], "family trip");
    assert_eq!(body["start_date"], "2024-03-04");
    assert_ne!(body["updated_at"], "2024-02-01T09:00:00Z");

    let stored = server.store.get("leave", "abc123").await.unwrap();
    assert_eq!(stored["status"], "approved");
    Ok(())
}

#[tokio::test]
async fn put_invalid_date_is_unprocessable() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put("/api/attendances/xyz", &hr_manager(), &json!({ "date": "not-a-date" }))
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "UNPROCESSABLE_ENTITY");
    assert!(body["field_errors"]["date"].is_string(), "date not named: {}", body);

    let stored = server.store.get("attendance", "xyz").await.unwrap();
    assert_eq!(stored["date"], "2024-03-01");
    Ok(())
}

#[tokio::test]
async fn put_missing_required_field_applies_nothing() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put("/api/leaves/abc123", &hr_manager(), &json!({ "reason": "changed plans" }))
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = res.json::<Value>().await?;
    assert!(body["field_errors"]["status"].is_string(), "status not named: {}", body);

    let stored = server.store.get("leave", "abc123").await.unwrap();
    assert_eq!(stored["reason"], "family trip");
    Ok(())
}

#[tokio::test]
async fn put_rejects_malformed_and_non_object_bodies() -> Result<()> {
    let server = TestServer::start().await?;
    let token = hr_manager();

    for raw in [r#"{"status":"#, r#"["approved"]"#, ""] {
        let res = server
            .request(Method::PUT, "/api/leaves/abc123", Some(&token), Some(raw))
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {:?}", raw);
        assert_eq!(res.json::<Value>().await?["code"], "INVALID_JSON");
    }
    Ok(())
}

#[tokio::test]
async fn put_rejects_system_fields() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put(
            "/api/leaves/abc123",
            &hr_manager(),
            &json!({ "status": "approved", "tenant_id": "t2" }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let stored = server.store.get("leave", "abc123").await.unwrap();
    assert_eq!(stored["tenant_id"], "t1");
    assert_eq!(stored["status"], "pending");
    Ok(())
}

#[tokio::test]
async fn put_missing_record_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put("/api/leaves/nope", &hr_manager(), &json!({ "status": "approved" }))
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn delete_returns_record_then_not_found() -> Result<()> {
    let server = TestServer::start().await?;
    let token = hr_manager();

    let res = server.delete("/api/leaves/abc123", &token).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["id"], "abc123");
    assert!(server.store.get("leave", "abc123").await.is_none());

    let res = server.delete("/api/leaves/abc123", &token).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn other_methods_are_not_allowed() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .request(Method::PATCH, "/api/leaves/abc123", Some(&hr_manager()), Some(r#"{"status":"approved"}"#))
        .await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "GET, PUT, DELETE");
    assert_eq!(res.json::<Value>().await?["message"], "Method PATCH not allowed");

    let stored = server.store.get("leave", "abc123").await.unwrap();
    assert_eq!(stored["status"], "pending");
    Ok(())
}

#[tokio::test]
async fn post_is_not_allowed_for_granted_roles() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .request(Method::POST, "/api/leaves/new1", Some(&hr_manager()), Some(r#"{"status":"pending"}"#))
        .await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(server.store.get("leave", "new1").await.is_none());
    Ok(())
}

#[tokio::test]
async fn unknown_resource_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.get("/api/payslips/abc123", &hr_manager()).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn fail_fast_reports_a_single_violation() -> Result<()> {
    let mut config = common::test_config();
    config.validation.abort_early = true;
    let server = TestServer::start_with(config).await?;

    let res = server
        .put("/api/attendances/xyz", &hr_manager(), &json!({ "hours_worked": 7.5, "date": "nope" }))
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = res.json::<Value>().await?;
    let errors = body["field_errors"].as_object().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors.contains_key("hours_worked"));
    Ok(())
}

#[tokio::test]
async fn put_persists_cast_values() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put(
            "/api/attendances/xyz",
            &hr_manager(),
            &json!({ "hours_worked": "8", "date": 1_709_280_000_000_i64 }),
        )
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["hours_worked"], json!(8));
    assert_eq!(body["date"], json!("2024-03-01T08:00:00.000Z"));

    let body = server
        .get("/api/attendances/xyz", &hr_manager())
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["hours_worked"], json!(8));
    assert!(body["hours_worked"].is_i64());
    assert_eq!(body["date"], json!("2024-03-01T08:00:00.000Z"));

    let stored = server.store.get("attendance", "xyz").await.unwrap();
    assert_eq!(stored["hours_worked"], json!(8));
    Ok(())
}

#[tokio::test]
async fn put_integral_float_is_stored_as_integer() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .put("/api/attendances/xyz", &hr_manager(), &json!({ "hours_worked": 6.0, "date": "2024-03-02" }))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let stored = server.store.get("attendance", "xyz").await.unwrap();
    assert!(stored["hours_worked"].is_i64());
    assert_eq!(stored["hours_worked"], json!(6));
    Ok(())
}
