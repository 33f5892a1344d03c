#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use super::*;
use crate::ids::{TicketId, TicketNumber};
use crate::provider::NewTicket;
use crate::ticket::{TicketDraft, TicketType};
use crate::user::Role;
use chrono::{Duration, TimeZone};
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

fn open_ticket(created_by: UserId) -> Ticket {
    let draft = TicketDraft::new("Pump failure", "No pressure", TicketType::Fault, "Site 4");
    NewTicket::from_draft(TicketId::new(), draft, created_by, t0()).into_ticket(TicketNumber::new(1))
}

struct Cast {
    admin: Actor,
    supervisor: Actor,
    engineer: Actor,
    other_engineer: Actor,
}

fn cast() -> Cast {
    Cast {
        admin: Actor::new(UserId::new(), Role::Admin),
        supervisor: Actor::new(UserId::new(), Role::Supervisor),
        engineer: Actor::new(UserId::new(), Role::FieldEngineer),
        other_engineer: Actor::new(UserId::new(), Role::FieldEngineer),
    }
}

fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

/// Drive a fresh ticket to `status` with the engineer as assignee.
fn ticket_in(status: TicketStatus, c: &Cast) -> Ticket {
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.supervisor.id);
    let path: &[LifecycleCommand] = match status {
        TicketStatus::Open => &[],
        TicketStatus::Assigned => &[LifecycleCommand::Assign {
            assignee: c.engineer.id,
        }],
        TicketStatus::InProgress => &[
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            LifecycleCommand::Start,
        ],
        TicketStatus::Resolved => &[
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            LifecycleCommand::Start,
            LifecycleCommand::Resolve,
        ],
        TicketStatus::Verified => &[
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            LifecycleCommand::Start,
            LifecycleCommand::Resolve,
            LifecycleCommand::Verify,
        ],
        TicketStatus::Closed => &[
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            LifecycleCommand::Start,
            LifecycleCommand::Resolve,
            LifecycleCommand::Verify,
            LifecycleCommand::Close,
        ],
    };
    for (i, command) in path.iter().enumerate() {
        let minutes = i64::try_from(i).unwrap() * 10 + 10;
        engine
            .apply(&mut ticket, &c.supervisor, *command, at(minutes))
            .unwrap();
    }
    ticket
}

// ============================================================================
// Edges
// ============================================================================

#[test]
fn assign_open_ticket_sets_assignee_and_stamp() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.supervisor.id);

    let transition = engine
        .apply(
            &mut ticket,
            &c.supervisor,
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            at(5),
        )
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Assigned);
    assert_eq!(ticket.assigned_to, Some(c.engineer.id));
    assert_eq!(ticket.assigned_at, Some(at(5)));
    assert_eq!(ticket.updated_at, at(5));
    assert_eq!(transition.from, TicketStatus::Open);
    assert_eq!(transition.to, TicketStatus::Assigned);
    assert_eq!(
        transition.kind,
        TransitionKind::Assigned {
            assignee: c.engineer.id,
            previous: None,
            first_assignment: true,
        }
    );
}

#[test]
fn reassign_keeps_first_assigned_at() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::InProgress, &c);
    let first = ticket.assigned_at;

    let transition = engine
        .apply(
            &mut ticket,
            &c.admin,
            LifecycleCommand::Assign {
                assignee: c.other_engineer.id,
            },
            at(100),
        )
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Assigned);
    assert_eq!(ticket.assigned_to, Some(c.other_engineer.id));
    assert_eq!(ticket.assigned_at, first);
    assert_eq!(
        transition.kind,
        TransitionKind::Assigned {
            assignee: c.other_engineer.id,
            previous: Some(c.engineer.id),
            first_assignment: false,
        }
    );
}

#[test]
fn unassign_reopens_and_keeps_assigned_at() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::Assigned, &c);
    let stamped = ticket.assigned_at;

    let transition = engine
        .apply(&mut ticket, &c.supervisor, LifecycleCommand::Unassign, at(50))
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.assigned_to, None);
    assert_eq!(ticket.assigned_at, stamped);
    assert_eq!(
        transition.kind,
        TransitionKind::Unassigned {
            previous: c.engineer.id
        }
    );
}

#[test]
fn full_path_stamps_each_timestamp_once() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.supervisor.id);

    engine
        .apply(
            &mut ticket,
            &c.supervisor,
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            at(1),
        )
        .unwrap();
    engine
        .apply(&mut ticket, &c.engineer, LifecycleCommand::Start, at(2))
        .unwrap();
    engine
        .apply(&mut ticket, &c.engineer, LifecycleCommand::Resolve, at(3))
        .unwrap();
    engine
        .apply(&mut ticket, &c.supervisor, LifecycleCommand::Verify, at(4))
        .unwrap();
    let closed = engine
        .apply(&mut ticket, &c.engineer, LifecycleCommand::Close, at(5))
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Closed);
    assert_eq!(ticket.assigned_at, Some(at(1)));
    assert_eq!(ticket.resolved_at, Some(at(3)));
    assert_eq!(ticket.verified_at, Some(at(4)));
    assert_eq!(ticket.verified_by, Some(c.supervisor.id));
    assert_eq!(ticket.updated_at, at(5));
    assert_eq!(closed.kind, TransitionKind::Closed);
}

#[test]
fn closed_ticket_rejects_everything() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let commands = [
        LifecycleCommand::Assign {
            assignee: c.engineer.id,
        },
        LifecycleCommand::Unassign,
        LifecycleCommand::Start,
        LifecycleCommand::Resolve,
        LifecycleCommand::Verify,
        LifecycleCommand::Close,
    ];
    for command in commands {
        let mut ticket = ticket_in(TicketStatus::Closed, &c);
        let before = ticket.clone();
        let err = engine
            .apply(&mut ticket, &c.admin, command, at(500))
            .unwrap_err();
        assert!(
            matches!(err, TicketError::InvalidTransition { from: TicketStatus::Closed, .. }),
            "{command:?} gave {err}"
        );
        assert_eq!(ticket, before);
    }
}

#[test]
fn open_cannot_jump_to_resolved() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.supervisor.id);
    let before = ticket.clone();

    let err = engine
        .apply(&mut ticket, &c.admin, LifecycleCommand::Resolve, at(1))
        .unwrap_err();

    assert!(matches!(
        err,
        TicketError::InvalidTransition {
            from: TicketStatus::Open,
            to: TicketStatus::Resolved,
            ..
        }
    ));
    assert_eq!(ticket, before);
}

#[test]
fn resolved_cannot_go_back_to_in_progress() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::Resolved, &c);

    let err = engine
        .apply(&mut ticket, &c.admin, LifecycleCommand::Start, at(100))
        .unwrap_err();

    assert!(matches!(err, TicketError::InvalidTransition { .. }));
    assert_eq!(ticket.status, TicketStatus::Resolved);
}

#[test]
fn edge_table_matches_documented_graph() {
    use TicketStatus::{Assigned, Closed, InProgress, Open, Resolved, Verified};
    let allowed = [
        (Open, Assigned),
        (Assigned, Assigned),
        (InProgress, Assigned),
        (Assigned, InProgress),
        (Assigned, Open),
        (InProgress, Open),
        (Assigned, Resolved),
        (InProgress, Resolved),
        (Resolved, Verified),
        (Verified, Closed),
    ];
    for from in TicketStatus::ALL {
        for to in TicketStatus::ALL {
            assert_eq!(
                is_edge(from, to),
                allowed.contains(&(from, to)),
                "{from} -> {to}"
            );
        }
    }
}

// ============================================================================
// Permissions
// ============================================================================

#[test]
fn engineer_cannot_assign_to_someone_else() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.engineer.id);

    let err = engine
        .apply(
            &mut ticket,
            &c.engineer,
            LifecycleCommand::Assign {
                assignee: c.other_engineer.id,
            },
            at(1),
        )
        .unwrap_err();

    assert!(matches!(err, TicketError::Auth(_)));
    assert_eq!(ticket.status, TicketStatus::Open);
}

#[test]
fn engineer_can_claim_unassigned_ticket() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.engineer.id);

    engine
        .apply(
            &mut ticket,
            &c.engineer,
            LifecycleCommand::Assign {
                assignee: c.engineer.id,
            },
            at(1),
        )
        .unwrap();

    assert_eq!(ticket.assigned_to, Some(c.engineer.id));
}

#[test]
fn engineer_cannot_take_over_assigned_ticket() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::Assigned, &c);

    let err = engine
        .apply(
            &mut ticket,
            &c.other_engineer,
            LifecycleCommand::Assign {
                assignee: c.other_engineer.id,
            },
            at(100),
        )
        .unwrap_err();

    assert!(matches!(err, TicketError::Auth(_)));
    assert_eq!(ticket.assigned_to, Some(c.engineer.id));
}

#[test]
fn only_assignee_or_elevated_can_start_and_resolve() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::Assigned, &c);

    let err = engine
        .apply(&mut ticket, &c.other_engineer, LifecycleCommand::Start, at(100))
        .unwrap_err();
    assert!(matches!(err, TicketError::Auth(_)));

    engine
        .apply(&mut ticket, &c.engineer, LifecycleCommand::Start, at(101))
        .unwrap();
    let err = engine
        .apply(&mut ticket, &c.other_engineer, LifecycleCommand::Resolve, at(102))
        .unwrap_err();
    assert!(matches!(err, TicketError::Auth(_)));

    engine
        .apply(&mut ticket, &c.supervisor, LifecycleCommand::Resolve, at(103))
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Resolved);
}

#[test]
fn engineer_cannot_verify() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::Resolved, &c);

    let err = engine
        .apply(&mut ticket, &c.other_engineer, LifecycleCommand::Verify, at(100))
        .unwrap_err();

    assert!(matches!(err, TicketError::Auth(_)));
    assert!(ticket.verified_at.is_none());
    assert!(ticket.verified_by.is_none());
}

#[test]
fn self_verification_follows_policy() {
    let c = cast();
    let mut ticket = open_ticket(c.admin.id);
    let engine = LifecycleEngine::default();
    for command in [
        LifecycleCommand::Assign {
            assignee: c.supervisor.id,
        },
        LifecycleCommand::Start,
        LifecycleCommand::Resolve,
    ] {
        engine.apply(&mut ticket, &c.supervisor, command, at(1)).unwrap();
    }

    let mut denied = ticket.clone();
    let err = engine
        .apply(&mut denied, &c.supervisor, LifecycleCommand::Verify, at(2))
        .unwrap_err();
    assert!(matches!(err, TicketError::Auth(_)));

    let permissive = LifecycleEngine::new(LifecyclePolicy {
        allow_self_verification: true,
    });
    permissive
        .apply(&mut ticket, &c.supervisor, LifecycleCommand::Verify, at(2))
        .unwrap();
    assert_eq!(ticket.verified_by, Some(c.supervisor.id));
}

#[test]
fn unassign_requires_an_assignee() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = open_ticket(c.supervisor.id);
    ticket.status = TicketStatus::Assigned;

    let err = engine
        .check(&ticket, &c.supervisor, LifecycleCommand::Unassign)
        .unwrap_err();

    assert!(matches!(err, TicketError::InvalidTransition { .. }));
}

// ============================================================================
// Timestamps
// ============================================================================

#[test]
fn stamps_never_precede_earlier_stamps_when_clock_steps_back() {
    let c = cast();
    let engine = LifecycleEngine::default();
    let mut ticket = ticket_in(TicketStatus::InProgress, &c);
    let assigned = ticket.assigned_at.unwrap();

    engine
        .apply(
            &mut ticket,
            &c.engineer,
            LifecycleCommand::Resolve,
            assigned - Duration::hours(2),
        )
        .unwrap();

    assert!(ticket.resolved_at.unwrap() >= assigned);
    assert!(ticket.updated_at >= ticket.created_at);
}

// ============================================================================
// Patch translation
// ============================================================================

#[test]
fn command_for_maps_status_requests() {
    let c = cast();
    let ticket = ticket_in(TicketStatus::Assigned, &c);

    assert_eq!(
        LifecycleEngine::command_for(&ticket, &TicketPatch::status(TicketStatus::InProgress))
            .unwrap(),
        Some(LifecycleCommand::Start)
    );
    assert_eq!(
        LifecycleEngine::command_for(&ticket, &TicketPatch::status(TicketStatus::Open)).unwrap(),
        Some(LifecycleCommand::Unassign)
    );
    assert_eq!(
        LifecycleEngine::command_for(&ticket, &TicketPatch::status(TicketStatus::Assigned))
            .unwrap(),
        None
    );
    assert_eq!(
        LifecycleEngine::command_for(&ticket, &TicketPatch::default()).unwrap(),
        None
    );
}

#[test]
fn command_for_assignment() {
    let c = cast();
    let open = open_ticket(c.supervisor.id);

    assert_eq!(
        LifecycleEngine::command_for(&open, &TicketPatch::assignment(Assignment::To(c.engineer.id)))
            .unwrap(),
        Some(LifecycleCommand::Assign {
            assignee: c.engineer.id
        })
    );
    assert_eq!(
        LifecycleEngine::command_for(&open, &TicketPatch::assignment(Assignment::Clear)).unwrap(),
        None
    );

    let assigned = ticket_in(TicketStatus::Assigned, &c);
    assert_eq!(
        LifecycleEngine::command_for(
            &assigned,
            &TicketPatch::assignment(Assignment::To(c.engineer.id))
        )
        .unwrap(),
        None
    );
}

#[test]
fn command_for_rejects_contradictions() {
    let c = cast();
    let open = open_ticket(c.supervisor.id);

    let patch = TicketPatch {
        status: Some(TicketStatus::Resolved),
        assignment: Some(Assignment::To(c.engineer.id)),
        ..TicketPatch::default()
    };
    assert!(matches!(
        LifecycleEngine::command_for(&open, &patch),
        Err(TicketError::Validation(_))
    ));

    let err =
        LifecycleEngine::command_for(&open, &TicketPatch::status(TicketStatus::Assigned))
            .unwrap_err();
    assert!(matches!(err, TicketError::InvalidTransition { .. }));
}

// ============================================================================
// Properties
// ============================================================================

fn any_status() -> impl Strategy<Value = TicketStatus> {
    prop::sample::select(TicketStatus::ALL.to_vec())
}

fn any_command() -> impl Strategy<Value = u8> {
    0u8..6
}

proptest! {
    #[test]
    fn only_table_edges_succeed(status in any_status(), pick in any_command()) {
        let c = cast();
        let engine = LifecycleEngine::default();
        let mut ticket = open_ticket(c.supervisor.id);
        ticket.status = status;
        ticket.assigned_to = Some(c.engineer.id);
        let command = match pick {
            0 => LifecycleCommand::Assign { assignee: c.other_engineer.id },
            1 => LifecycleCommand::Unassign,
            2 => LifecycleCommand::Start,
            3 => LifecycleCommand::Resolve,
            4 => LifecycleCommand::Verify,
            _ => LifecycleCommand::Close,
        };
        let before = ticket.clone();

        match engine.apply(&mut ticket, &c.admin, command, at(30)) {
            Ok(transition) => {
                prop_assert!(is_edge(before.status, transition.to));
                prop_assert_eq!(ticket.status, command.target());
            }
            Err(_) => prop_assert_eq!(ticket, before),
        }
    }

    #[test]
    fn lifecycle_stamps_are_set_once(picks in prop::collection::vec(any_command(), 1..20)) {
        let c = cast();
        let engine = LifecycleEngine::default();
        let mut ticket = open_ticket(c.supervisor.id);

        for (i, pick) in picks.into_iter().enumerate() {
            let command = match pick {
                0 => LifecycleCommand::Assign { assignee: c.engineer.id },
                1 => LifecycleCommand::Unassign,
                2 => LifecycleCommand::Start,
                3 => LifecycleCommand::Resolve,
                4 => LifecycleCommand::Verify,
                _ => LifecycleCommand::Close,
            };
            let before = ticket.clone();
            let minutes = i64::try_from(i).unwrap() + 1;
            let _ = engine.apply(&mut ticket, &c.admin, command, at(minutes));

            for (old, new) in [
                (before.assigned_at, ticket.assigned_at),
                (before.resolved_at, ticket.resolved_at),
                (before.verified_at, ticket.verified_at),
            ] {
                if old.is_some() {
                    prop_assert_eq!(old, new);
                }
            }
            if before.verified_by.is_some() {
                prop_assert_eq!(before.verified_by, ticket.verified_by);
            }
            prop_assert!(ticket.updated_at >= before.updated_at);
        }
    }
}
