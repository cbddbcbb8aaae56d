//! # presence-core
//!
//! Core types and collaborator contracts for the presence client.
//!
//! This crate provides the building blocks the client is assembled from:
//!
//! - **Events** - The wire and public event name taxonomy
//! - **Envelope** - Classification of raw push events into normalized envelopes
//! - **Record** - Presence records derived from user-state events
//! - **Host** - Traits for the transport, event bus, request and feature-flag collaborators
//! - **Batch** - Helpers for chunking request payloads
//! - **Metrics** - Metric names and recording helpers
//!
//! The library records metrics through the `metrics` facade but never
//! installs a recorder. A host that exports metrics installs one and then
//! calls [`metrics::describe_metrics`] once at startup.
//!
//! ## Event flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│  Envelope   │────▶│  Event bus  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │   Record    │
//!                                         └─────────────┘
//! ```

pub mod batch;
pub mod envelope;
pub mod error;
pub mod events;
pub mod host;
pub mod metrics;
pub mod record;

pub use batch::{batch_array, ensure_array, OneOrMany};
pub use envelope::{Envelope, WireEvent};
pub use error::{HostError, PresenceError};
pub use events::{EventTaxonomy, EVENTS};
pub use host::{
    EventBus, EventHandler, FeatureFlags, FeatureResponse, HandlerId, Host, Method, Requester,
    ServiceRequest, Transport,
};
pub use record::{PresenceRecord, UserState};
