//! Collaborator contracts supplied by the host environment.
//!
//! The client never owns the push connection, the event bus, the HTTP
//! stack, or feature flag storage. It borrows implementations of these
//! traits, bundled in a [`Host`], and forwards to them.

use crate::error::HostError;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifies a handler registered on an [`EventBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler_{}", self.0)
    }
}

/// A handler invoked with each payload triggered under its name.
pub type EventHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// The push messaging connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Make sure the connection is established.
    ///
    /// Must be idempotent.
    async fn connect(&self) -> Result<(), HostError>;

    /// Get the transport name.
    fn name(&self) -> &'static str;
}

/// Named publish/subscribe.
///
/// Raw transport events are delivered under `event:<wire name>`; the
/// client publishes normalized envelopes under public names.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Register a handler for `name`.
    fn on(&self, name: &str, handler: EventHandler) -> HandlerId;

    /// Remove a handler. Returns `false` if it was not registered.
    fn off(&self, name: &str, id: HandlerId) -> bool;

    /// Deliver `payload` to every handler registered for `name`.
    async fn trigger(&self, name: &str, payload: Value) -> Result<(), HostError>;
}

/// HTTP method of a [`ServiceRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// A request descriptor handed to the host's request function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub method: Method,
    /// Logical service name, resolved to a base URL by the host.
    pub api: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    pub body: Value,
}

impl ServiceRequest {
    /// Create a `POST` request with an empty body.
    #[must_use]
    pub fn post(api: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            api: api.into(),
            resource: resource.into(),
            headers: BTreeMap::new(),
            body: Value::Null,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// Generic request function.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Issue a request and return the response body.
    async fn request(&self, request: ServiceRequest) -> Result<Value, HostError>;
}

/// Result of writing a feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureResponse {
    pub value: bool,
}

/// Feature flag storage.
#[async_trait]
pub trait FeatureFlags: Send + Sync {
    async fn set_feature(
        &self,
        scope: &str,
        name: &str,
        value: bool,
    ) -> Result<FeatureResponse, HostError>;

    async fn get_feature(&self, scope: &str, name: &str) -> Result<bool, HostError>;
}

/// The host environment the client is constructed with.
#[derive(Clone)]
pub struct Host {
    pub transport: Arc<dyn Transport>,
    pub bus: Arc<dyn EventBus>,
    pub requester: Arc<dyn Requester>,
    pub features: Arc<dyn FeatureFlags>,
}

impl Host {
    /// Bundle the four collaborators.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        bus: Arc<dyn EventBus>,
        requester: Arc<dyn Requester>,
        features: Arc<dyn FeatureFlags>,
    ) -> Self {
        Self {
            transport,
            bus,
            requester,
            features,
        }
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}
