mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveTime;
use common::{create_company, send, setup_app, upsert_event, StubGateway};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

async fn conversation_count(pool: &sqlx::PgPool, instance: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM whatsapp_conversations WHERE instance = $1")
        .bind(instance)
        .fetch_one(pool)
        .await
        .expect("count conversations")
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn inbound_then_outbound_share_one_conversation() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let jid = "5511987654321@s.whatsapp.net";

    let (status, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, jid, false, "IN-1", "Oi, tudo bem?")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stored");

    let (status, unread, phone, name): (String, i32, String, Option<String>) = sqlx::query_as(
        "SELECT status, unread_count, phone, contact_name FROM whatsapp_conversations WHERE instance = $1",
    )
    .bind(&instance)
    .fetch_one(&pool)
    .await
    .expect("conversation row");
    assert_eq!(status, "pending");
    assert_eq!(unread, 1);
    assert_eq!(phone, "5511987654321");
    assert_eq!(name.as_deref(), Some("Maria"));

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, jid, true, "OUT-1", "Tudo sim!")),
    )
    .await;
    assert_eq!(body["status"], "stored");
    assert_eq!(conversation_count(&pool, &instance).await, 1);

    let (status, unread, last): (String, i32, Option<String>) = sqlx::query_as(
        "SELECT status, unread_count, last_message FROM whatsapp_conversations WHERE instance = $1",
    )
    .bind(&instance)
    .fetch_one(&pool)
    .await
    .expect("conversation row");
    assert_eq!(status, "open");
    assert_eq!(unread, 1);
    assert_eq!(last.as_deref(), Some("Tudo sim!"));

    let directions: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT m.direction FROM whatsapp_messages m
        JOIN whatsapp_conversations c ON c.id = m.conversation_id
        WHERE c.instance = $1 ORDER BY m.sent_at, m.created_at
        "#,
    )
    .bind(&instance)
    .fetch_all(&pool)
    .await
    .expect("messages");
    assert_eq!(directions, vec!["inbound", "outbound"]);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn replayed_delivery_is_stored_once() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let payload = upsert_event(&instance, "5521999990000@s.whatsapp.net", false, "DUP-1", "Olá");

    let (_, first) = send(&app, "POST", "/api/webhook/whatsapp", None, Some(payload.clone())).await;
    let (_, second) = send(&app, "POST", "/api/webhook/whatsapp", None, Some(payload)).await;
    assert_eq!(first["status"], "stored");
    assert_eq!(second["status"], "duplicate");

    let unread: i32 =
        sqlx::query_scalar("SELECT unread_count FROM whatsapp_conversations WHERE instance = $1")
            .bind(&instance)
            .fetch_one(&pool)
            .await
            .expect("unread");
    assert_eq!(unread, 1);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn groups_and_unknown_payloads_are_acknowledged_without_rows() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());

    let (status, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, "120363000000000000@g.us", false, "G-1", "grupo")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (status, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(json!({ "instance": instance, "hello": "world" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(json!({ "event": "connection.update", "instance": instance, "data": {} })),
    )
    .await;
    assert_eq!(body["status"], "ignored");

    let req = Request::builder()
        .method("POST")
        .uri("/api/webhook/whatsapp")
        .header("content-type", "application/json")
        .body(Body::from("definitely not json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(conversation_count(&pool, &instance).await, 0);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn per_event_path_supplies_the_event_name() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp/messages-upsert",
        None,
        Some(json!({
            "instance": instance,
            "data": {
                "key": { "remoteJid": "5531988887777@s.whatsapp.net", "fromMe": false, "id": "EV-1" },
                "message": { "extendedTextMessage": { "text": "link aqui" } }
            }
        })),
    )
    .await;
    assert_eq!(body["status"], "stored");
    assert_eq!(conversation_count(&pool, &instance).await, 1);
}

async fn leads_for(pool: &sqlx::PgPool, company_id: Uuid) -> Vec<(String, String, chrono::DateTime<chrono::Utc>)> {
    sqlx::query_as(
        r#"
        SELECT l.name, s.name, l.updated_at
        FROM crm_leads l JOIN crm_stages s ON s.id = l.stage_id
        WHERE l.company_id = $1
        "#,
    )
    .bind(company_id)
    .fetch_all(pool)
    .await
    .expect("leads")
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn inbound_contact_becomes_lead_in_first_stage_once() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let company_id = create_company(&pool, &instance, &[("Qualified", 2), ("New", 1), ("Won", 3)]).await;
    let jid = "5511987650001@s.whatsapp.net";

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, jid, false, "L-1", "Quero um orçamento")),
    )
    .await;
    assert_eq!(body["status"], "stored");

    let leads = leads_for(&pool, company_id).await;
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].0, "Maria");
    assert_eq!(leads[0].1, "New");
    let first_touch = leads[0].2;

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, jid, false, "L-2", "Alguém aí?")),
    )
    .await;
    assert_eq!(body["status"], "stored");

    let leads = leads_for(&pool, company_id).await;
    assert_eq!(leads.len(), 1);
    assert!(leads[0].2 > first_touch);

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, "5511987650002@s.whatsapp.net", true, "L-3", "Oferta")),
    )
    .await;
    assert_eq!(body["status"], "stored");
    assert_eq!(leads_for(&pool, company_id).await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a Postgres database"]
async fn burst_of_first_messages_creates_one_lead() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let company_id = create_company(&pool, &instance, &[("New", 1)]).await;
    let jid = "5511987650003@s.whatsapp.net";

    let mut handles = Vec::new();
    for i in 0..8 {
        let app = app.clone();
        let payload = upsert_event(&instance, jid, false, &format!("BURST-{}", i), "oi");
        handles.push(tokio::spawn(async move {
            send(&app, "POST", "/api/webhook/whatsapp", None, Some(payload)).await
        }));
    }
    for handle in handles {
        let (status, body) = handle.await.expect("webhook task");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "stored");
    }

    assert_eq!(leads_for(&pool, company_id).await.len(), 1);
    let messages: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM whatsapp_messages m
        JOIN whatsapp_conversations c ON c.id = m.conversation_id
        WHERE c.instance = $1
        "#,
    )
    .bind(&instance)
    .fetch_one(&pool)
    .await
    .expect("messages");
    assert_eq!(messages, 8);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn tenant_without_stages_still_stores_the_message() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let company_id = create_company(&pool, &instance, &[]).await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/webhook/whatsapp",
        None,
        Some(upsert_event(&instance, "5511987650004@s.whatsapp.net", false, "NS-1", "oi")),
    )
    .await;
    assert_eq!(body["status"], "stored");
    assert_eq!(conversation_count(&pool, &instance).await, 1);

    let leads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crm_leads WHERE company_id = $1")
        .bind(company_id)
        .fetch_one(&pool)
        .await
        .expect("leads");
    assert_eq!(leads, 0);
}

#[tokio::test]
#[ignore = "requires a Postgres database"]
async fn lead_insert_failure_does_not_fail_the_webhook() {
    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
    let (app, pool) = setup_app(Arc::new(StubGateway::default()), noon).await;
    let instance = format!("inst-{}", Uuid::new_v4());
    let company_id = create_company(&pool, &instance, &[("New", 1)]).await;

    sqlx::query(
        r#"
        CREATE OR REPLACE FUNCTION reject_marked_leads() RETURNS trigger AS $$
        BEGIN
            IF NEW.name = 'Rejected Lead' THEN
                RAISE EXCEPTION 'lead insert rejected';
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql
        "#,
    )
    .execute(&pool)
    .await
    .expect("trigger function");
    sqlx::query("DROP TRIGGER IF EXISTS reject_marked_leads ON crm_leads")
        .execute(&pool)
        .await
        .expect("drop trigger");
    sqlx::query(
        "CREATE TRIGGER reject_marked_leads BEFORE INSERT ON crm_leads FOR EACH ROW EXECUTE FUNCTION reject_marked_leads()",
    )
    .execute(&pool)
    .await
    .expect("create trigger");

    let mut payload = upsert_event(&instance, "5511987650005@s.whatsapp.net", false, "RJ-1", "oi");
    payload["data"]["pushName"] = json!("Rejected Lead");
    let (status, body) = send(&app, "POST", "/api/webhook/whatsapp", None, Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "stored");
    assert_eq!(conversation_count(&pool, &instance).await, 1);
    assert!(leads_for(&pool, company_id).await.is_empty());
}
