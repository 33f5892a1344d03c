//! Fieldops Demo
//!
//! Walks one ticket through its whole lifecycle against the configured
//! backend (the in-memory provider when none is configured):
//! - a field engineer reports a fault
//! - a supervisor assigns it back to the engineer
//! - the engineer starts, logs work and resolves it
//! - the supervisor verifies and closes it
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info,fieldops_runtime=debug cargo run --bin fieldops-demo
//! ```

use anyhow::Context;
use chrono::Duration;
use fieldops_core::ids::UserId;
use fieldops_core::ticket::{TicketDraft, TicketPatch, TicketStatus, TicketType};
use fieldops_core::user::UserProfile;
use fieldops_runtime::mock::fixtures;
use fieldops_runtime::session::IdentityHandle;
use fieldops_runtime::telemetry::init_tracing;
use fieldops_runtime::{AppBuilder, Config, WorkLog};
use std::sync::Arc;

fn profile(users: &[UserProfile], id: UserId) -> anyhow::Result<UserProfile> {
    users
        .iter()
        .find(|u| u.id == id)
        .cloned()
        .with_context(|| format!("demo user {id} is missing from the mock data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.telemetry.log_filter)?;

    println!("\n============================================");
    println!("   Fieldops - Ticket Lifecycle Demo");
    println!("============================================\n");

    let app = AppBuilder::new(config).build()?;
    let store = app.store();

    let users = app.mock().all_users()?;
    let engineer = profile(&users, fixtures::ENGINEER_ANA)?;
    let supervisor = profile(&users, fixtures::SUPERVISOR)?;

    let engineer_session = app.session(Arc::new(IdentityHandle::signed_in(engineer.clone())));
    let supervisor_session = app.session(Arc::new(IdentityHandle::signed_in(supervisor.clone())));

    // ========== Report ==========

    println!("{} reports a fault", engineer.full_name);
    let draft = TicketDraft::new(
        "AC repair",
        "Unit on floor 3 blowing warm air",
        TicketType::Fault,
        "Building A",
    );
    let ticket = store.create(&engineer_session, draft).await?;
    println!("  {} [{}] {}", ticket.ticket_number, ticket.status, ticket.title);

    // ========== Assign ==========

    println!("\n{} assigns it to {}", supervisor.full_name, engineer.full_name);
    let ticket = store
        .assign(&supervisor_session, ticket.id, Some(engineer.id))
        .await?;
    println!(
        "  status={} assigned_to={:?} assigned_at={:?}",
        ticket.status, ticket.assigned_to, ticket.assigned_at
    );

    // ========== Work ==========

    println!("\n{} starts work and logs time", engineer.full_name);
    store
        .update(
            &engineer_session,
            ticket.id,
            TicketPatch::status(TicketStatus::InProgress),
        )
        .await?;
    let ended_at = chrono::Utc::now();
    let work = store
        .log_work(
            &engineer_session,
            ticket.id,
            WorkLog {
                started_at: ended_at - Duration::minutes(90),
                ended_at,
                notes: Some("Replaced capacitor".to_string()),
            },
        )
        .await?;
    println!("  logged {:.2} hours", work.hours());

    store
        .comment(&engineer_session, ticket.id, "Unit cooling again, monitoring")
        .await?;
    let ticket = store
        .update(
            &engineer_session,
            ticket.id,
            TicketPatch::status(TicketStatus::Resolved),
        )
        .await?;
    println!("  status={} resolved_at={:?}", ticket.status, ticket.resolved_at);

    // ========== Verify and close ==========

    println!("\n{} verifies and closes", supervisor.full_name);
    for status in [TicketStatus::Verified, TicketStatus::Closed] {
        let ticket = store
            .update(
                &supervisor_session,
                ticket.id,
                TicketPatch::status(status),
            )
            .await?;
        println!("  status={}", ticket.status);
    }

    match store
        .update(
            &supervisor_session,
            ticket.id,
            TicketPatch::status(TicketStatus::Open),
        )
        .await
    {
        Ok(_) => println!("  unexpected: closed ticket reopened"),
        Err(error) => println!("  reopen rejected: {error}"),
    }

    // ========== Results ==========

    store.notifier().flush().await;

    let detail = store.detail(&supervisor_session, ticket.id).await?;
    println!("\nActivity log for {} (newest first):", detail.ticket.ticket_number);
    for activity in &detail.activities {
        println!(
            "  {} {:<14} {}",
            activity.created_at.format("%H:%M:%S"),
            activity.activity_type,
            activity.description
        );
    }

    println!("\nNotifications for {}:", engineer.full_name);
    for notification in store.notifications(&engineer_session).await? {
        println!("  [{}] {}", notification.notification_type, notification.title);
    }

    let overdue = store.overdue(&supervisor_session).await?;
    println!("\nOverdue tickets: {}", overdue.len());
    for ticket in &overdue {
        println!("  {} {} ({})", ticket.ticket_number, ticket.title, ticket.priority);
    }

    let health = supervisor_session.health().snapshot();
    println!(
        "\nProvider: live_available={} live_calls={} mock_calls={} reason={:?}",
        health.available, health.live_calls, health.fallback_calls, health.trip_reason
    );

    app.shutdown().await;
    println!("\nDemo complete");
    Ok(())
}
