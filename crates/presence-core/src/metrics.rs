//! Metric instrumentation for the presence client.
//!
//! Uses the `metrics` facade; installing an exporter is left to the host.
//! Hosts call [`describe_metrics`] once at startup, after installing their
//! recorder and before creating a client.

use metrics::{counter, gauge};

/// Metric names.
pub mod names {
    pub const EVENTS_ROUTED: &str = "presence_events_routed_total";
    pub const EVENTS_REJECTED: &str = "presence_events_rejected_total";
    pub const LISTENERS_ACTIVE: &str = "presence_listeners_active";
    pub const RECORDS_CACHED: &str = "presence_records_cached";
    pub const REQUESTS_TOTAL: &str = "presence_requests_total";
}

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(
        names::EVENTS_ROUTED,
        "Raw events classified and broadcast"
    );
    metrics::describe_counter!(
        names::EVENTS_REJECTED,
        "Raw events dropped because they could not be classified"
    );
    metrics::describe_gauge!(
        names::LISTENERS_ACTIVE,
        "Transport listeners currently bound"
    );
    metrics::describe_gauge!(names::RECORDS_CACHED, "Presence records in the cache");
    metrics::describe_counter!(names::REQUESTS_TOTAL, "Service requests issued");
}

/// Record a broadcast envelope.
pub fn record_routed(event: &'static str) {
    counter!(names::EVENTS_ROUTED, "event" => event).increment(1);
}

/// Record a dropped raw event.
pub fn record_rejected(reason: &'static str) {
    counter!(names::EVENTS_REJECTED, "reason" => reason).increment(1);
}

/// Update the bound listener count.
pub fn set_active_listeners(count: usize) {
    gauge!(names::LISTENERS_ACTIVE).set(count as f64);
}

/// Update the cached record count.
pub fn set_cached_records(count: usize) {
    gauge!(names::RECORDS_CACHED).set(count as f64);
}

/// Record an issued service request.
pub fn record_request(resource: &str) {
    counter!(names::REQUESTS_TOTAL, "resource" => resource.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: calls are no-ops
        describe_metrics();
        record_routed("usersub.userstate");
        record_rejected("unrecognized_event");
        set_active_listeners(1);
        set_cached_records(3);
        record_request("subscribe");
    }
}
