//! Booking orchestration core for the flight seat reservation service.
//!
//! The durable state machine lives in [`workflow`]; everything side-effectful
//! (Postgres rows, Redis seat locks, the simulated payment gateway) happens in
//! [`activities`]. The HTTP layer talks to the system exclusively through
//! [`client::BookingClient`].

pub mod activities;
pub mod client;
pub mod config;
pub mod domain;
pub mod reconciliation;
pub mod signals;
pub mod store;
pub mod workflow;
