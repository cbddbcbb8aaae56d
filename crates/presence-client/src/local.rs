//! In-process host collaborators.
//!
//! These implement the host traits without any network: the bus delivers
//! to handlers in the same process, the transport only counts connects, and
//! requests are recorded and answered with a canned response. They back the
//! test suite and are usable by embedders that wire raw events in by hand.
//! Only a bus built with [`LocalBus::recording`] keeps a log of publishes.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use presence_core::{
    EventBus, EventHandler, EventTaxonomy, FeatureFlags, FeatureResponse, HandlerId, Host,
    HostError, Requester, ServiceRequest, Transport,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// Named handler registry with in-process delivery.
#[derive(Default)]
pub struct LocalBus {
    handlers: DashMap<String, Vec<(HandlerId, EventHandler)>>,
    next_id: AtomicU64,
    /// Publish log; `None` unless built with [`LocalBus::recording`].
    published: Option<Mutex<Vec<(String, Value)>>>,
    fail_publish: AtomicBool,
}

impl LocalBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty bus that logs every publish.
    ///
    /// The log grows until [`LocalBus::clear_published`] is called.
    #[must_use]
    pub fn recording() -> Self {
        Self {
            published: Some(Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    /// Number of handlers registered for `name`.
    #[must_use]
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers.get(name).map(|h| h.len()).unwrap_or(0)
    }

    /// Every `(name, payload)` triggered so far, in order.
    ///
    /// Always empty for a bus that is not recording.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Value)> {
        self.published
            .as_ref()
            .map(|log| log.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default()
    }

    /// Forget recorded publishes.
    pub fn clear_published(&self) {
        if let Some(log) = &self.published {
            log.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Make subsequent triggers fail.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Deliver a raw transport event for the wire name `internal`.
    ///
    /// # Errors
    ///
    /// Returns an error if publishing fails.
    pub async fn inject(&self, internal: &str, raw: Value) -> Result<(), HostError> {
        self.trigger(&EventTaxonomy::transport_event(internal), raw)
            .await
    }
}

#[async_trait]
impl EventBus for LocalBus {
    fn on(&self, name: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .entry(name.to_string())
            .or_default()
            .push((id, handler));
        debug!(event = %name, handler = %id, "Handler registered");
        id
    }

    fn off(&self, name: &str, id: HandlerId) -> bool {
        let Some(mut handlers) = self.handlers.get_mut(name) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        let removed = handlers.len() != before;
        let empty = handlers.is_empty();
        drop(handlers);

        if empty {
            self.handlers.remove_if(name, |_, h| h.is_empty());
        }
        if removed {
            debug!(event = %name, handler = %id, "Handler removed");
        }
        removed
    }

    async fn trigger(&self, name: &str, payload: Value) -> Result<(), HostError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(HostError::Publish(format!("bus rejected {name}")));
        }

        if let Some(log) = &self.published {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((name.to_string(), payload.clone()));
        }

        // Release the map guard before running handlers; they may re-enter the bus
        let handlers: Vec<EventHandler> = self
            .handlers
            .get(name)
            .map(|h| h.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        trace!(event = %name, recipients = handlers.len(), "Triggering");
        join_all(handlers.into_iter().map(|handler| handler(payload.clone()))).await;

        Ok(())
    }
}

/// A transport that is always local.
#[derive(Default)]
pub struct LoopbackTransport {
    connects: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl LoopbackTransport {
    /// Create a transport that connects successfully.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Make subsequent connects fail with `reason`, or succeed with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self) -> Result<(), HostError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match failure {
            Some(reason) => Err(HostError::Connect(reason)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}

/// A requester that records requests and returns a fixed response.
pub struct RecordingRequester {
    requests: Mutex<Vec<ServiceRequest>>,
    response: Mutex<Value>,
    failure: Mutex<Option<String>>,
}

impl Default for RecordingRequester {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl RecordingRequester {
    /// Create a requester answering every request with `response`.
    #[must_use]
    pub fn new(response: Value) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response: Mutex::new(response),
            failure: Mutex::new(None),
        }
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the canned response.
    pub fn set_response(&self, response: Value) {
        *self.response.lock().unwrap_or_else(PoisonError::into_inner) = response;
    }

    /// Make subsequent requests fail with `reason`, or succeed with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }
}

#[async_trait]
impl Requester for RecordingRequester {
    async fn request(&self, request: ServiceRequest) -> Result<Value, HostError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(reason) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(HostError::Request(reason));
        }

        Ok(self
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Feature flags held in memory. Unset flags read as `false`.
#[derive(Default)]
pub struct MemoryFeatureFlags {
    flags: DashMap<(String, String), bool>,
}

impl MemoryFeatureFlags {
    /// Create an empty flag store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeatureFlags for MemoryFeatureFlags {
    async fn set_feature(
        &self,
        scope: &str,
        name: &str,
        value: bool,
    ) -> Result<FeatureResponse, HostError> {
        self.flags
            .insert((scope.to_string(), name.to_string()), value);
        Ok(FeatureResponse { value })
    }

    async fn get_feature(&self, scope: &str, name: &str) -> Result<bool, HostError> {
        Ok(self
            .flags
            .get(&(scope.to_string(), name.to_string()))
            .map(|v| *v)
            .unwrap_or(false))
    }
}

/// A [`Host`] assembled from the local collaborators, keeping typed handles.
#[derive(Clone, Default)]
pub struct LocalHost {
    pub transport: Arc<LoopbackTransport>,
    pub bus: Arc<LocalBus>,
    pub requester: Arc<RecordingRequester>,
    pub features: Arc<MemoryFeatureFlags>,
}

impl LocalHost {
    /// Create a fresh local host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh local host whose bus logs every publish.
    #[must_use]
    pub fn recording() -> Self {
        Self {
            bus: Arc::new(LocalBus::recording()),
            ..Self::default()
        }
    }

    /// The trait-object view handed to the client.
    #[must_use]
    pub fn host(&self) -> Host {
        Host::new(
            self.transport.clone(),
            self.bus.clone(),
            self.requester.clone(),
            self.features.clone(),
        )
    }
}
