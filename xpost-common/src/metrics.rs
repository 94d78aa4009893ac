use std::collections::HashMap;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Instant;

use cadence::{
    BufferedUdpMetricSink, Counted, Gauged, Histogrammed, Metric, NopMetricSink,
    QueuingMetricSink, StatsdClient, Timed,
};

pub use cadence::MetricError;

/// Thin wrapper around a [`StatsdClient`], cloneable and cheap, shared by
/// the sync engine, scheduler and token lifecycle manager. Defaults to a
/// no-op sink so unit tests never require a live statsd endpoint.
#[derive(Debug, Clone)]
pub struct Metrics {
    client: Arc<StatsdClient>,
    tags: HashMap<String, String>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::noop()
    }
}

impl Metrics {
    pub fn noop() -> Self {
        Self {
            client: Arc::new(StatsdClient::builder("", NopMetricSink).build()),
            tags: HashMap::new(),
        }
    }

    pub fn new(client: Arc<StatsdClient>, tags: HashMap<String, String>) -> Self {
        Self { client, tags }
    }

    /// Returns a clone of this handle with an additional tag applied to
    /// every metric it emits (e.g. `main_social=mastodon-primary`).
    pub fn with_tag(&self, key: &str, value: &str) -> Self {
        let mut tags = self.tags.clone();
        tags.insert(key.to_owned(), value.to_owned());
        Self {
            client: self.client.clone(),
            tags,
        }
    }

    pub fn incr(&self, label: &str) {
        self.count_with_tags(label, 1, &[])
    }

    pub fn incr_with_tags(&self, label: &str, extra: &[(&str, &str)]) {
        self.count_with_tags(label, 1, extra)
    }

    pub fn count_with_tags(&self, label: &str, count: i64, extra: &[(&str, &str)]) {
        let mut tagged = self.client.count_with_tags(label, count);
        for (k, v) in self.tags.iter() {
            tagged = tagged.with_tag(k, v);
        }
        for (k, v) in extra {
            tagged = tagged.with_tag(k, v);
        }
        let _ = tagged.try_send();
    }

    pub fn gauge(&self, label: &str, value: u64, extra: &[(&str, &str)]) {
        let mut tagged = self.client.gauge_with_tags(label, value);
        for (k, v) in self.tags.iter() {
            tagged = tagged.with_tag(k, v);
        }
        for (k, v) in extra {
            tagged = tagged.with_tag(k, v);
        }
        let _ = tagged.try_send();
    }

    /// Records an `operation_duration_seconds` histogram observation.
    pub fn observe_duration(&self, label: &str, elapsed: Instant, extra: &[(&str, &str)]) {
        let millis = elapsed.elapsed().as_secs_f64() * 1000.0;
        let mut tagged = self.client.histogram_with_tags(label, millis);
        for (k, v) in self.tags.iter() {
            tagged = tagged.with_tag(k, v);
        }
        for (k, v) in extra {
            tagged = tagged.with_tag(k, v);
        }
        let _ = tagged.try_send();
    }
}

/// Builds a live statsd-backed client, or a no-op one when no host is
/// configured.
pub fn metrics_from_opts(
    label: &str,
    host: Option<&str>,
    port: u16,
) -> Result<Arc<StatsdClient>, MetricError> {
    let builder = if let Some(statsd_host) = host {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        let sink = QueuingMetricSink::from(BufferedUdpMetricSink::from(
            (statsd_host, port),
            socket,
        )?);
        StatsdClient::builder(label, sink)
    } else {
        StatsdClient::builder(label, NopMetricSink)
    };
    Ok(Arc::new(builder.build()))
}
