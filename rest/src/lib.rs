//! HTTP data provider for the Fieldops ticketing service.
//!
//! [`RestProvider`] implements [`DataProvider`](fieldops_core::provider::DataProvider)
//! against a PostgREST-style API: one resource per table, `eq.` filters in
//! the query string and JSON bodies. It is the "live" provider the Ticket
//! Store falls back from.
//!
//! # Example
//!
//! ```no_run
//! use fieldops_rest::RestProvider;
//! use fieldops_core::provider::{DataProvider, TicketFilter};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), fieldops_core::ProviderError> {
//! let provider = RestProvider::new(
//!     "https://backend.example.com/rest/v1",
//!     "service-key",
//!     Duration::from_secs(10),
//! )?;
//! let tickets = provider.list_tickets(TicketFilter::default()).await?;
//! # let _ = tickets;
//! # Ok(())
//! # }
//! ```

mod client;
mod query;

pub use client::RestProvider;
