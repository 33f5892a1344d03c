//! `RestProvider` against a mocked HTTP backend.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::{TimeZone, Utc};
use fieldops_core::ProviderError;
use fieldops_core::ids::{NotificationId, TicketId, TicketNumber, UserId};
use fieldops_core::notification::{NewNotification, NotificationType};
use fieldops_core::provider::{DataProvider, NewTicket, TicketFilter};
use fieldops_core::ticket::{Ticket, TicketDraft, TicketStatus, TicketType};
use fieldops_core::user::Role;
use fieldops_rest::RestProvider;
use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-key";

fn provider(server: &MockServer) -> RestProvider {
    RestProvider::new(server.uri(), KEY, Duration::from_secs(2)).unwrap()
}

fn new_ticket(created_by: UserId) -> NewTicket {
    let draft = TicketDraft::new("AC repair", "Warm air", TicketType::Fault, "Building A");
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    NewTicket::from_draft(TicketId::new(), draft, created_by, now)
}

fn stored(ticket: NewTicket, number: u64) -> Ticket {
    ticket.into_ticket(TicketNumber::new(number))
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn list_sends_credentials_filters_and_order() {
    let server = MockServer::start().await;
    let engineer = UserId::new();
    let ticket = stored(new_ticket(engineer), 1);

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("apikey", KEY))
        .and(header("authorization", format!("Bearer {KEY}").as_str()))
        .and(query_param("status", "eq.open"))
        .and(query_param(
            "or",
            format!("(created_by.eq.{engineer},assigned_to.eq.{engineer})").as_str(),
        ))
        .and(query_param("order", "created_at.desc,ticket_number.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([ticket])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = TicketFilter::default()
        .involving(engineer)
        .status(TicketStatus::Open);
    let tickets = assert_ok!(provider(&server).list_tickets(filter).await);

    assert_eq!(tickets, vec![ticket]);
}

#[tokio::test]
async fn get_returns_none_for_empty_result() {
    let server = MockServer::start().await;
    let id = TicketId::new();

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(query_param("id", format!("eq.{id}").as_str()))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_eq!(provider(&server).get_ticket(id).await.unwrap(), None);
}

#[tokio::test]
async fn list_users_filters_by_role() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profiles"))
        .and(query_param("role", "eq.supervisor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let users = provider(&server).list_users(Some(Role::Supervisor)).await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn user_stats_are_computed_from_assigned_tickets() {
    let server = MockServer::start().await;
    let engineer = UserId::new();
    let mut ticket = stored(new_ticket(UserId::new()), 4);
    ticket.assigned_to = Some(engineer);
    ticket.status = TicketStatus::InProgress;

    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(query_param("assigned_to", format!("eq.{engineer}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([ticket])))
        .mount(&server)
        .await;

    let stats = provider(&server).user_stats(engineer, Utc::now()).await.unwrap();
    assert_eq!(stats.total_assigned, 1);
    assert_eq!(stats.in_progress, 1);
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn create_returns_the_stored_row() {
    let server = MockServer::start().await;
    let ticket = new_ticket(UserId::new());
    let row = stored(ticket.clone(), 42);

    Mock::given(method("POST"))
        .and(path("/tickets"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "title": "AC repair", "location": "Building A" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let created = provider(&server).create_ticket(ticket).await.unwrap();
    assert_eq!(created.ticket_number.to_string(), "TKT-000042");
}

#[tokio::test]
async fn update_of_missing_row_is_not_found() {
    let server = MockServer::start().await;
    let ticket = stored(new_ticket(UserId::new()), 1);

    Mock::given(method("PATCH"))
        .and(path("/tickets"))
        .and(query_param("id", format!("eq.{}", ticket.id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = assert_err!(provider(&server).update_ticket(ticket).await);
    assert!(matches!(err, ProviderError::Api { status: 404, .. }));
}

#[tokio::test]
async fn mark_read_patches_only_the_flag() {
    let server = MockServer::start().await;
    let id = NotificationId::new();
    let unread = NewNotification {
        user_id: UserId::new(),
        ticket_id: None,
        notification_type: NotificationType::Overdue,
        title: "Ticket overdue".to_string(),
        message: "TKT-000001 is past its due date".to_string(),
        email_sent: false,
        push_sent: false,
        created_at: Utc::now(),
    }
    .into_notification(id);
    let mut read = unread.clone();
    read.is_read = true;

    Mock::given(method("PATCH"))
        .and(path("/notifications"))
        .and(body_partial_json(json!({ "is_read": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([read])))
        .mount(&server)
        .await;

    let updated = provider(&server).mark_notification_read(id).await.unwrap();
    assert!(updated.unwrap().is_read);
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn duplicate_insert_is_a_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/tickets"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
        .mount(&server)
        .await;

    let err = provider(&server)
        .create_ticket(new_ticket(UserId::new()))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Conflict("duplicate key value".to_string()));
}

#[tokio::test]
async fn server_errors_carry_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/equipment"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = provider(&server).list_equipment().await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::Api {
            status: 500,
            message: "boom".to_string()
        }
    );
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/equipment"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = provider(&server).list_equipment().await.unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn unreachable_backend_is_unavailable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let provider = RestProvider::new(uri, KEY, Duration::from_millis(500)).unwrap();
    let err = provider.list_equipment().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
}
