//! Routing of raw push events onto the public event bus.
//!
//! The stream binds one bus handler per internal wire event. Each raw event
//! it receives is classified, turned into an [`Envelope`] and published
//! twice: under the wildcard name and under the envelope's own name.

use futures_util::future::{try_join_all, BoxFuture};
use futures_util::{try_join, FutureExt};
use presence_core::metrics;
use presence_core::{
    Envelope, EventBus, EventHandler, EventTaxonomy, HandlerId, Host, PresenceError, Transport,
    EVENTS,
};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

/// A transport listener bound by the stream.
#[derive(Debug, Clone)]
struct ActiveListener {
    name: String,
    handler: HandlerId,
}

/// Event router between the transport and the public bus.
pub struct Stream {
    transport: Arc<dyn Transport>,
    bus: Arc<dyn EventBus>,
    /// Bound listeners in bind order. A name appears at most once.
    active: Mutex<Vec<ActiveListener>>,
}

impl Stream {
    /// Create a stream over the host's transport and bus.
    #[must_use]
    pub fn new(host: &Host) -> Self {
        Self {
            transport: Arc::clone(&host.transport),
            bus: Arc::clone(&host.bus),
            active: Mutex::new(Vec::new()),
        }
    }

    /// A detached copy of the event table.
    #[must_use]
    pub fn constants(&self) -> EventTaxonomy {
        EventTaxonomy::snapshot()
    }

    /// Names of the currently bound listeners, in bind order.
    pub async fn active_listeners(&self) -> Vec<String> {
        self.active
            .lock()
            .await
            .iter()
            .map(|l| l.name.clone())
            .collect()
    }

    /// Whether `internal` is currently bound.
    pub async fn is_listening(&self, internal: &str) -> bool {
        self.active.lock().await.iter().any(|l| l.name == internal)
    }

    /// Make sure the transport is connected.
    ///
    /// # Errors
    ///
    /// Returns whatever error the transport reports.
    pub async fn connect(&self) -> Result<(), PresenceError> {
        self.transport.connect().await?;
        Ok(())
    }

    /// Bind every internal event.
    ///
    /// # Errors
    ///
    /// Fails if any single bind fails.
    pub async fn listen(&self) -> Result<(), PresenceError> {
        try_join_all(
            EVENTS
                .internal
                .all()
                .into_iter()
                .map(|internal| self.listen_to(internal)),
        )
        .await?;
        Ok(())
    }

    /// Unbind every active listener.
    ///
    /// Returns the names that were unbound.
    ///
    /// # Errors
    ///
    /// Fails if any single unbind fails.
    pub async fn stop_listening(&self) -> Result<Vec<String>, PresenceError> {
        let names = self.active_listeners().await;
        try_join_all(names.iter().map(|name| self.stop_listening_to(name))).await
    }

    /// Bind a handler for the internal event `internal`.
    ///
    /// Binding an already bound name does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot connect; nothing is bound then.
    pub async fn listen_to(&self, internal: &str) -> Result<(), PresenceError> {
        debug!(event = %internal, "Listening");

        let mut active = self.active.lock().await;
        if active.iter().any(|l| l.name == internal) {
            return Ok(());
        }

        self.connect().await?;

        let handler = raw_event_handler(Arc::downgrade(&self.bus));
        let id = self
            .bus
            .on(&EventTaxonomy::transport_event(internal), handler);

        active.push(ActiveListener {
            name: internal.to_string(),
            handler: id,
        });
        metrics::set_active_listeners(active.len());

        info!(event = %internal, listeners = active.len(), "Bound transport listener");
        Ok(())
    }

    /// Unbind the listener for `internal`.
    ///
    /// Returns the name that was unbound.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::NotActive`] if `internal` is not bound.
    pub async fn stop_listening_to(&self, internal: &str) -> Result<String, PresenceError> {
        let mut active = self.active.lock().await;
        let Some(index) = active.iter().position(|l| l.name == internal) else {
            return Err(PresenceError::NotActive(internal.to_string()));
        };

        let listener = active.remove(index);
        self.bus
            .off(&EventTaxonomy::transport_event(internal), listener.handler);
        metrics::set_active_listeners(active.len());

        info!(event = %internal, listeners = active.len(), "Unbound transport listener");
        Ok(listener.name)
    }

    /// Classify a raw event and broadcast its envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is not recognized (nothing is
    /// broadcast) or a publish fails.
    pub async fn handle_event(&self, raw: Value) -> Result<(), PresenceError> {
        route(self.bus.as_ref(), raw).await
    }

    /// Build the envelope for a raw event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event type is missing or unrecognized.
    pub fn process(&self, raw: &Value) -> Result<Envelope, PresenceError> {
        process(raw)
    }

    /// Publish an envelope under the wildcard name and its own name.
    ///
    /// # Errors
    ///
    /// Returns the first publish error.
    pub async fn fire(&self, envelope: Envelope) -> Result<(), PresenceError> {
        fire(self.bus.as_ref(), envelope).await
    }

    /// Register a handler for a public event name.
    pub fn on(&self, name: &str, handler: EventHandler) -> HandlerId {
        self.bus.on(name, handler)
    }

    /// Register a handler for every envelope.
    pub fn on_all(&self, handler: EventHandler) -> HandlerId {
        self.bus.on(EVENTS.external.all, handler)
    }

    /// Remove a handler registered with [`Stream::on`].
    pub fn off(&self, name: &str, id: HandlerId) -> bool {
        self.bus.off(name, id)
    }

    /// Remove a handler registered with [`Stream::on_all`].
    pub fn off_all(&self, id: HandlerId) -> bool {
        self.bus.off(EVENTS.external.all, id)
    }
}

fn process(raw: &Value) -> Result<Envelope, PresenceError> {
    let envelope = Envelope::from_raw(raw).map_err(|e| {
        metrics::record_rejected(e.kind());
        e
    })?;
    trace!(event = envelope.event(), "Processed raw event");
    Ok(envelope)
}

async fn fire(bus: &dyn EventBus, envelope: Envelope) -> Result<(), PresenceError> {
    let name = envelope.event();
    let value = envelope.into_value();

    try_join!(
        bus.trigger(EVENTS.external.all, value.clone()),
        bus.trigger(name, value)
    )?;

    metrics::record_routed(name);
    Ok(())
}

async fn route(bus: &dyn EventBus, raw: Value) -> Result<(), PresenceError> {
    let envelope = process(&raw)?;
    fire(bus, envelope).await
}

/// The bus handler bound for each internal event.
///
/// Holds the bus weakly so a bound listener does not keep it alive.
fn raw_event_handler(bus: Weak<dyn EventBus>) -> EventHandler {
    Arc::new(move |raw: Value| -> BoxFuture<'static, ()> {
        let bus = bus.clone();
        async move {
            let Some(bus) = bus.upgrade() else {
                debug!("Event bus dropped, ignoring raw event");
                return;
            };
            if let Err(e) = route(bus.as_ref(), raw).await {
                warn!(error = %e, "Dropped raw event");
            }
        }
        .boxed()
    })
}
