//! # presence-client
//!
//! Presence subscriptions over a host-provided push channel.
//!
//! The client is glue between four collaborators owned by the host (see
//! [`presence_core::Host`]): it binds transport events, normalizes them
//! into envelopes on the public bus, and keeps a cache of presence records
//! fed by `usersub.userstate` events.
//!
//! ```rust,ignore
//! use presence_client::{local::LocalHost, Presence};
//!
//! let local = LocalHost::new();
//! let presence = Presence::new(local.host());
//! presence.initialize().await?;
//! presence.subscribe(vec!["person-a", "person-b"], None).await?;
//! ```

pub mod config;
pub mod local;
pub mod presence;
pub mod stream;

pub use config::{ClientConfig, ConfigError};
pub use presence::Presence;
pub use stream::Stream;
