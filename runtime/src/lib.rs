//! # Fieldops Runtime
//!
//! The imperative shell of the Fieldops ticketing service.
//!
//! This crate wires the pure rules of `fieldops-core` to a data backend and
//! runs the side effects of every ticket operation.
//!
//! ## Core Components
//!
//! - **Ticket Store** ([`store::TicketStore`]): role-scoped reads and
//!   mutations; persistence, then Activity Log, then notifications
//! - **Provider routing** ([`router::ProviderRouter`], [`health::ProviderHealth`]):
//!   live backend first, one-directional fallback to the in-memory mock,
//!   scoped to a [`session::Session`]
//! - **Activity Log** ([`activity_log::ActivityLog`]): append-only audit trail
//! - **Notification Dispatcher** ([`notify::NotificationDispatcher`]): bounded
//!   outbound queue drained by a worker task, at-most-once delivery
//! - **Live feed** ([`feed::TicketFeed`]): full reload of the visible
//!   tickets on every backend change
//!
//! ## Example
//!
//! ```rust,no_run
//! use fieldops_runtime::app::AppBuilder;
//! use fieldops_runtime::config::Config;
//! use fieldops_runtime::mock::fixtures;
//! use fieldops_runtime::session::IdentityHandle;
//! use fieldops_core::ticket::{TicketDraft, TicketType};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = AppBuilder::new(Config::from_env()).build()?;
//! let store = app.store();
//!
//! let identity = IdentityHandle::new();
//! let session = app.session(Arc::new(identity.clone()));
//! let profile = app.mock().all_users()?.into_iter().find(|u| u.id == fixtures::ENGINEER_ANA);
//! if let Some(profile) = profile {
//!     identity.sign_in(profile);
//! }
//!
//! let draft = TicketDraft::new("AC repair", "Warm air on floor 3", TicketType::Fault, "Building A");
//! let ticket = store.create(&session, draft).await?;
//! let visible = store.list(&session).await?;
//! assert!(visible.iter().any(|t| t.id == ticket.id));
//! # Ok(())
//! # }
//! ```

pub mod activity_log;
pub mod app;
pub mod config;
pub mod feed;
pub mod health;
pub mod metrics;
pub mod mock;
pub mod notify;
pub mod router;
pub mod session;
pub mod store;
pub mod telemetry;

pub use activity_log::ActivityLog;
pub use app::{App, AppBuilder, AppError};
pub use config::Config;
pub use feed::TicketFeed;
pub use health::{HealthSnapshot, ProviderHealth};
pub use mock::InMemoryProvider;
pub use notify::{DeliveryChannel, LoggingChannel, Notice, NotificationDispatcher};
pub use router::ProviderRouter;
pub use session::{IdentityHandle, Session};
pub use store::{MediaUpload, TicketDetail, TicketStore, WorkLog};
