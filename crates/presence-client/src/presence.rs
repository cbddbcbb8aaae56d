//! Presence subscriptions and the record cache.
//!
//! [`Presence`] is the client surface. Subscribing and status changes are
//! plain requests through the host; their effects come back later as
//! user-state events, which the client turns into [`PresenceRecord`]s.

use crate::config::ClientConfig;
use crate::stream::Stream;
use futures_util::future::{try_join_all, BoxFuture};
use futures_util::FutureExt;
use presence_core::metrics;
use presence_core::{
    batch_array, ensure_array, EventHandler, EventTaxonomy, HandlerId, Host, OneOrMany,
    PresenceError, PresenceRecord, ServiceRequest, EVENTS,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Cached presence records, in arrival order.
type RecordCache = Arc<RwLock<Vec<PresenceRecord>>>;

const PERSON_ID_REQUIRED: &str = "A person id is required";

/// Presence client.
pub struct Presence {
    host: Host,
    stream: Stream,
    config: ClientConfig,
    presences: RecordCache,
    userstate_handler: Mutex<Option<HandlerId>>,
}

impl Presence {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new(host: Host) -> Self {
        Self::with_config(host, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    #[must_use]
    pub fn with_config(host: Host, config: ClientConfig) -> Self {
        debug!(transport = host.transport.name(), ?config, "Creating presence client");
        Self {
            stream: Stream::new(&host),
            host,
            config,
            presences: Arc::new(RwLock::new(Vec::new())),
            userstate_handler: Mutex::new(None),
        }
    }

    /// A detached copy of the event table.
    #[must_use]
    pub fn constants(&self) -> EventTaxonomy {
        EventTaxonomy::snapshot()
    }

    /// The underlying event stream.
    #[must_use]
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the record cache.
    #[must_use]
    pub fn presences(&self) -> Vec<PresenceRecord> {
        self.presences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bind the transport listeners, then start caching user-state events.
    ///
    /// Events delivered between the two steps are broadcast but not cached.
    /// Calling this again does not register a second cache handler.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails; no cache handler is registered then.
    pub async fn initialize(&self) -> Result<(), PresenceError> {
        self.stream.listen().await?;

        let mut slot = self
            .userstate_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            let handler = userstate_handler(Arc::clone(&self.presences));
            *slot = Some(self.stream.on(EVENTS.external.userstate, handler));
        }

        info!("Presence initialized");
        Ok(())
    }

    /// Remove the cache handler and unbind every transport listener.
    ///
    /// Returns the unbound listener names.
    ///
    /// # Errors
    ///
    /// Returns an error if unbinding fails.
    pub async fn shutdown(&self) -> Result<Vec<String>, PresenceError> {
        let handler = self
            .userstate_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = handler {
            self.stream.off(EVENTS.external.userstate, id);
        }

        let unbound = self.stream.stop_listening().await?;
        info!(listeners = ?unbound, "Presence shut down");
        Ok(unbound)
    }

    /// Derive a record from a user-state envelope and append it to the cache.
    ///
    /// Records are not deduplicated by subject.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::MalformedEvent`] if the event lacks the
    /// expected compositions; the cache is left unchanged.
    pub fn handle_userstate_event(&self, event: &Value) -> Result<(), PresenceError> {
        append_record(&self.presences, event)
    }

    /// Publish `payload` under `name` if it carries both `type` and `payload`.
    ///
    /// # Errors
    ///
    /// Returns the bus error if publishing fails.
    pub async fn emit_event(&self, name: &str, payload: Value) -> Result<(), PresenceError> {
        let present = |key: &str| payload.get(key).is_some_and(|v| !v.is_null());
        if present("type") && present("payload") {
            self.host.bus.trigger(name, payload).await?;
        }
        Ok(())
    }

    /// Turn the presence feature on. Resolves to the flag's new value.
    ///
    /// # Errors
    ///
    /// Returns the feature flag error, if any.
    pub async fn enable(&self) -> Result<bool, PresenceError> {
        self.set_enabled(true).await
    }

    /// Turn the presence feature off. Resolves to the flag's new value.
    ///
    /// # Errors
    ///
    /// Returns the feature flag error, if any.
    pub async fn disable(&self) -> Result<bool, PresenceError> {
        self.set_enabled(false).await
    }

    /// Whether the presence feature is on.
    ///
    /// # Errors
    ///
    /// Returns the feature flag error, if any.
    pub async fn is_enabled(&self) -> Result<bool, PresenceError> {
        let enabled = self
            .host
            .features
            .get_feature(&self.config.feature_scope, &self.config.feature_name)
            .await?;
        Ok(enabled)
    }

    async fn set_enabled(&self, value: bool) -> Result<bool, PresenceError> {
        let response = self
            .host
            .features
            .set_feature(&self.config.feature_scope, &self.config.feature_name, value)
            .await?;
        debug!(requested = value, value = response.value, "Presence feature set");
        Ok(response.value)
    }

    /// The most recent cached record for `person_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Validation`] if `person_id` is empty.
    pub fn get(&self, person_id: &str) -> Result<Option<PresenceRecord>, PresenceError> {
        if person_id.is_empty() {
            return Err(PresenceError::Validation(PERSON_ID_REQUIRED));
        }

        Ok(self
            .presences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|record| record.subject == person_id)
            .cloned())
    }

    /// Subscribe to the presence of one or more people in a single request.
    ///
    /// The response is returned as-is. Subscription state arrives later as
    /// user-state events.
    ///
    /// # Errors
    ///
    /// Returns the request error, if any.
    pub async fn subscribe(
        &self,
        person_ids: impl Into<OneOrMany<String>>,
        ttl: Option<u32>,
    ) -> Result<Value, PresenceError> {
        let all_ids = ensure_array::<String>(person_ids);
        let users: Vec<Value> = all_ids
            .iter()
            .map(|user| json!({"user": user, "refresh": true}))
            .collect();

        debug!(subjects = all_ids.len(), "Subscribing");

        let request = ServiceRequest::post(&self.config.usersub_api, "subscribe")
            .with_header("Cisco-Usersub-Device-Caps", self.config.device_caps.as_str())
            .with_header("refresh", true)
            .with_body(json!({
                "users": users,
                "ttl": ttl.unwrap_or(self.config.default_ttl),
            }));

        self.request(request).await
    }

    /// Subscribe in batches of at most `batch_limit` people, concurrently.
    ///
    /// Array responses are spliced into the result; other responses are
    /// appended whole.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Validation`] when no id is given, or the
    /// first request error.
    pub async fn subscribe_batched(
        &self,
        person_ids: impl Into<OneOrMany<String>>,
        ttl: Option<u32>,
    ) -> Result<Vec<Value>, PresenceError> {
        let subjects = required_ids(person_ids)?;
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let batches = batch_array(&subjects, self.config.batch_limit);

        debug!(
            subjects = subjects.len(),
            batches = batches.len(),
            "Subscribing in batches"
        );

        let requests = batches.into_iter().map(|ids| {
            let users: Vec<Value> = ids.iter().map(|user| json!({"user": user})).collect();
            let request = ServiceRequest::post(&self.config.usersub_api, "subscribe")
                .with_body(json!({"users": users, "ttl": ttl}));
            self.request(request)
        });

        let responses = try_join_all(requests).await?;

        let mut flattened = Vec::new();
        for response in responses {
            match response {
                Value::Array(items) => flattened.extend(items),
                other => flattened.push(other),
            }
        }
        Ok(flattened)
    }

    /// Unsubscribe from one or more people and drop their cached records.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Validation`] when no id is given, or the
    /// request error; the cache is untouched on error.
    pub async fn unsubscribe(
        &self,
        person_ids: impl Into<OneOrMany<String>>,
    ) -> Result<(), PresenceError> {
        let users = required_ids(person_ids)?;

        debug!(subjects = users.len(), "Unsubscribing");

        let request = ServiceRequest::post(&self.config.usersub_api, "unsubscribe")
            .with_body(json!({"users": users}));
        self.request(request).await?;

        let mut presences = self
            .presences
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        presences.retain(|record| !users.contains(&record.subject));
        metrics::set_cached_records(presences.len());

        Ok(())
    }

    /// Set or clear the local status override.
    ///
    /// A positive `ttl_secs` sets `status` for that long; anything else
    /// clears the override. `status` is forwarded without validation.
    ///
    /// # Errors
    ///
    /// Returns the request error, if any.
    pub async fn set_status(&self, status: &str, ttl_secs: i64) -> Result<Value, PresenceError> {
        let body = if ttl_secs > 0 {
            json!({"operation": "set", "type": status, "ttlSecs": ttl_secs})
        } else {
            json!({"operation": "clear"})
        };

        let request =
            ServiceRequest::post(&self.config.status_api, "availabilityOverride").with_body(body);
        self.request(request).await
    }

    async fn request(&self, request: ServiceRequest) -> Result<Value, PresenceError> {
        metrics::record_request(&request.resource);
        debug!(api = %request.api, resource = %request.resource, "Issuing request");
        let response = self.host.requester.request(request).await?;
        Ok(response)
    }
}

/// Ids for operations that need at least one non-empty id.
fn required_ids(person_ids: impl Into<OneOrMany<String>>) -> Result<Vec<String>, PresenceError> {
    let ids = ensure_array::<String>(person_ids);
    if ids.is_empty() || ids.iter().all(String::is_empty) {
        return Err(PresenceError::Validation(PERSON_ID_REQUIRED));
    }
    Ok(ids)
}

fn append_record(cache: &RwLock<Vec<PresenceRecord>>, event: &Value) -> Result<(), PresenceError> {
    let record = PresenceRecord::from_event(event)?;
    debug!(subject = %record.subject, status = %record.status, "Presence update");

    let mut presences = cache.write().unwrap_or_else(PoisonError::into_inner);
    presences.push(record);
    metrics::set_cached_records(presences.len());
    Ok(())
}

fn userstate_handler(cache: RecordCache) -> EventHandler {
    Arc::new(move |event: Value| -> BoxFuture<'static, ()> {
        let cache = Arc::clone(&cache);
        async move {
            if let Err(e) = append_record(&cache, &event) {
                metrics::record_rejected(e.kind());
                warn!(error = %e, "Dropped user-state event");
            }
        }
        .boxed()
    })
}
