mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::NaiveTime;
use common::{bearer, send, setup_app, StubGateway};
use serde_json::{json, Value};
use uuid::Uuid;

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

async fn wait_for_status(app: &axum::Router, auth: &str, id: &str, want: &str) -> Value {
    let uri = format!("/api/campaigns/{}", id);
    for _ in 0..50 {
        let (_, body) = send(app, "GET", &uri, Some(auth), None).await;
        if body["status"] == want {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("campaign {} never reached {}", id, want);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn campaign_routes_require_a_manager_token() {
    let (app, _pool) = setup_app(Arc::new(StubGateway::default()), noon()).await;
    let body = json!({ "name": "Promo", "message_template": "Oi {nome}" });

    let (status, _) = send(&app, "POST", "/api/campaigns", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let viewer = bearer("viewer", None);
    let (status, _) = send(&app, "POST", "/api/campaigns", Some(&viewer), Some(body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn started_campaign_sends_rendered_messages_and_completes() {
    let gateway = Arc::new(StubGateway {
        failing: vec!["5521999990000".into()],
        ..Default::default()
    });
    let (app, pool) = setup_app(gateway.clone(), noon()).await;
    let auth = bearer("manager", None);

    let (status, created) = send(
        &app,
        "POST",
        "/api/campaigns",
        Some(&auth),
        Some(json!({
            "name": "Cobrança",
            "message_template": "Olá {nome}, seu boleto de {valor} vence amanhã",
            "delay_min": 0,
            "delay_max": 0,
            "contacts": [
                { "phone": "(11) 98765-4321", "name": "Ana", "variables": { "valor": "R$50" } },
                { "phone": "21 99999-0000", "name": "Bruno", "variables": { "valor": "R$75" } },
                { "phone": "5511987654321", "name": "Ana de novo" },
                { "phone": "12" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    assert_eq!(created["total_contacts"], 2);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/campaigns/{}/pause", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, started) = send(
        &app,
        "POST",
        &format!("/api/campaigns/{}/start", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(started["status"], "running");

    let done = wait_for_status(&app, &auth, &id, "completed").await;
    assert_eq!(done["sent_count"], 1);
    assert_eq!(done["failed_count"], 1);
    assert_eq!(done["pending_count"], 0);

    let sent = gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "default-instance");
    assert_eq!(sent[0].1, "5511987654321");
    assert_eq!(sent[0].2, "Olá Ana, seu boleto de R$50 vence amanhã");

    let campaign_id: Uuid = id.parse().unwrap();
    let failed: (String, Option<String>) = sqlx::query_as(
        "SELECT status, error_message FROM whatsapp_campaign_contacts WHERE campaign_id = $1 AND phone = $2",
    )
    .bind(campaign_id)
    .bind("5521999990000")
    .fetch_one(&pool)
    .await
    .expect("failed contact");
    assert_eq!(failed.0, "failed");
    assert!(failed.1.unwrap_or_default().contains("not on WhatsApp"));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/campaigns/{}/contacts", id),
        Some(&auth),
        Some(json!({ "contacts": [{ "phone": "11911112222" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn campaign_outside_window_stays_running() {
    let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
    let gateway = Arc::new(StubGateway::default());
    let (app, _pool) = setup_app(gateway.clone(), late).await;
    let auth = bearer("admin", None);

    let (_, created) = send(
        &app,
        "POST",
        "/api/campaigns",
        Some(&auth),
        Some(json!({
            "name": "Noturna",
            "message_template": "Oi {nome}",
            "start_time": "08:00:00",
            "end_time": "20:00:00",
            "contacts": [{ "phone": "11987654321", "name": "Ana" }]
        })),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/campaigns/{}/start", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (_, body) = send(&app, "GET", &format!("/api/campaigns/{}", id), Some(&auth), None).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["sent_count"], 0);
    assert!(gateway.sent().is_empty());

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/campaigns/{}/cancel", id),
        Some(&auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn tenant_users_cannot_read_other_companies_campaigns() {
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon()).await;
    let company_id: Uuid =
        sqlx::query_scalar("INSERT INTO companies (name) VALUES ('Acme') RETURNING id")
            .fetch_one(&pool)
            .await
            .expect("company");

    let own = bearer("manager", Some(company_id));
    let (status, created) = send(
        &app,
        "POST",
        "/api/campaigns",
        Some(&own),
        Some(json!({ "name": "Acme promo", "message_template": "Oi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["company_id"], company_id.to_string());

    let other = bearer("manager", Some(Uuid::new_v4()));
    let uri = format!("/api/campaigns/{}", created["id"].as_str().unwrap());
    let (status, _) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
