//! Demo data for the in-memory provider.
//!
//! Ids are fixed so demos and tests can refer to the seeded records.

use chrono::{DateTime, Duration, Utc};
use fieldops_core::equipment::{Equipment, EquipmentStatus};
use fieldops_core::ids::{EquipmentId, TicketId, TicketNumber, UserId};
use fieldops_core::provider::NewTicket;
use fieldops_core::ticket::{GeoPoint, Money, Priority, Ticket, TicketDraft, TicketStatus, TicketType};
use fieldops_core::user::{Role, UserProfile};
use uuid::Uuid;

/// Seeded admin.
pub const ADMIN: UserId = UserId::from_uuid(Uuid::from_u128(0x0001_0000_0000_0000_0000_0000_0000_0001));
/// Seeded supervisor.
pub const SUPERVISOR: UserId = UserId::from_uuid(Uuid::from_u128(0x0001_0000_0000_0000_0000_0000_0000_0002));
/// First seeded field engineer.
pub const ENGINEER_ANA: UserId = UserId::from_uuid(Uuid::from_u128(0x0001_0000_0000_0000_0000_0000_0000_0003));
/// Second seeded field engineer.
pub const ENGINEER_BEN: UserId = UserId::from_uuid(Uuid::from_u128(0x0001_0000_0000_0000_0000_0000_0000_0004));

/// Seeded HVAC unit.
pub const HVAC_UNIT: EquipmentId = EquipmentId::from_uuid(Uuid::from_u128(0x0002_0000_0000_0000_0000_0000_0000_0001));
/// Seeded generator.
pub const GENERATOR: EquipmentId = EquipmentId::from_uuid(Uuid::from_u128(0x0002_0000_0000_0000_0000_0000_0000_0002));
/// Seeded elevator.
pub const ELEVATOR: EquipmentId = EquipmentId::from_uuid(Uuid::from_u128(0x0002_0000_0000_0000_0000_0000_0000_0003));

/// Records loaded into a fresh in-memory provider.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    /// User profiles
    pub users: Vec<UserProfile>,
    /// Equipment
    pub equipment: Vec<Equipment>,
    /// Tickets, already numbered
    pub tickets: Vec<Ticket>,
}

fn user(id: UserId, email: &str, name: &str, role: Role, created_at: DateTime<Utc>) -> UserProfile {
    UserProfile {
        id,
        email: email.to_string(),
        full_name: name.to_string(),
        role,
        phone: None,
        is_active: true,
        created_at,
    }
}

fn ticket(
    seq: u128,
    number: u64,
    draft: TicketDraft,
    created_by: UserId,
    created_at: DateTime<Utc>,
) -> Ticket {
    let id = TicketId::from_uuid(Uuid::from_u128(0x0003_0000_0000_0000_0000_0000_0000_0000 | seq));
    NewTicket::from_draft(id, draft, created_by, created_at).into_ticket(TicketNumber::new(number))
}

/// The demo data set, with timestamps relative to `now`.
#[must_use]
pub fn demo(now: DateTime<Utc>) -> Fixtures {
    let onboarded = now - Duration::days(90);
    let users = vec![
        user(ADMIN, "admin@fieldops.example", "Alex Admin", Role::Admin, onboarded),
        user(SUPERVISOR, "sam@fieldops.example", "Sam Ortiz", Role::Supervisor, onboarded),
        user(ENGINEER_ANA, "ana@fieldops.example", "Ana Lima", Role::FieldEngineer, onboarded),
        user(ENGINEER_BEN, "ben@fieldops.example", "Ben Okafor", Role::FieldEngineer, onboarded),
    ];

    let equipment = vec![
        Equipment {
            id: HVAC_UNIT,
            name: "Rooftop AC unit 1".to_string(),
            equipment_type: "HVAC".to_string(),
            serial_number: Some("HV-2231-A".to_string()),
            location: "Building A".to_string(),
            status: EquipmentStatus::Faulty,
        },
        Equipment {
            id: GENERATOR,
            name: "Backup generator".to_string(),
            equipment_type: "Generator".to_string(),
            serial_number: Some("GN-7780".to_string()),
            location: "Plant room".to_string(),
            status: EquipmentStatus::Operational,
        },
        Equipment {
            id: ELEVATOR,
            name: "Lift 2".to_string(),
            equipment_type: "Elevator".to_string(),
            serial_number: None,
            location: "Building B".to_string(),
            status: EquipmentStatus::Maintenance,
        },
    ];

    let mut open = ticket(
        1,
        1,
        TicketDraft::new(
            "Generator load test",
            "Quarterly load test of the backup generator",
            TicketType::Maintenance,
            "Plant room",
        )
        .with_equipment(GENERATOR)
        .with_due_date(now + Duration::days(7)),
        SUPERVISOR,
        now - Duration::days(2),
    );
    open.estimated_hours = Some(3.0);
    open.estimated_cost = Some(Money::from_cents(45_000));

    let mut in_progress = ticket(
        2,
        2,
        TicketDraft::new(
            "AC blowing warm air",
            "Tenants on floor 3 report no cooling",
            TicketType::Fault,
            "Building A",
        )
        .with_priority(Priority::Critical)
        .with_equipment(HVAC_UNIT)
        .with_due_date(now - Duration::hours(6)),
        ENGINEER_ANA,
        now - Duration::days(1),
    );
    in_progress.coordinates = GeoPoint::new(51.5074, -0.1278).ok();
    in_progress.status = TicketStatus::InProgress;
    in_progress.assigned_to = Some(ENGINEER_ANA);
    in_progress.assigned_at = Some(now - Duration::hours(20));
    in_progress.updated_at = now - Duration::hours(18);

    let mut resolved = ticket(
        3,
        3,
        TicketDraft::new(
            "Lift door sensor",
            "Door reopens repeatedly on level 2",
            TicketType::Inspection,
            "Building B",
        )
        .with_priority(Priority::High)
        .with_equipment(ELEVATOR),
        SUPERVISOR,
        now - Duration::days(5),
    );
    resolved.status = TicketStatus::Resolved;
    resolved.assigned_to = Some(ENGINEER_BEN);
    resolved.assigned_at = Some(now - Duration::days(4));
    resolved.resolved_at = Some(now - Duration::days(3));
    resolved.updated_at = now - Duration::days(3);
    resolved.actual_hours = Some(2.5);

    Fixtures {
        users,
        equipment,
        tickets: vec![open, in_progress, resolved],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_data_is_consistent() {
        let now = Utc::now();
        let fixtures = demo(now);

        assert_eq!(fixtures.users.len(), 4);
        for ticket in &fixtures.tickets {
            assert!(ticket.updated_at >= ticket.created_at);
            if let (Some(assigned), Some(resolved)) = (ticket.assigned_at, ticket.resolved_at) {
                assert!(resolved >= assigned);
            }
            if ticket.status != TicketStatus::Open {
                assert!(ticket.assigned_to.is_some());
            }
        }
        assert!(fixtures.tickets.iter().any(|t| t.is_overdue(now)));
    }
}
