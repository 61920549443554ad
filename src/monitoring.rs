//! Prometheus metrics for the feed

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::{FeedError, Result};

/// Counters and gauges describing feed activity
#[derive(Clone)]
pub struct FeedMetrics {
    registry: Registry,
    pub messages: IntCounterVec,
    pub dropped_messages: IntCounter,
    pub sequence_gaps: IntCounter,
    pub reconnects: IntCounter,
    pub demo_ticks: IntCounter,
    pub source_switches: IntCounter,
    pub connected: IntGauge,
}

impl FeedMetrics {
    /// Create the metrics and register them in a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages = IntCounterVec::new(
            Opts::new("feed_messages_total", "Market data messages received, by kind"),
            &["kind"],
        )?;
        let dropped_messages = IntCounter::new(
            "feed_dropped_messages_total",
            "Messages dropped because they could not be parsed",
        )?;
        let sequence_gaps = IntCounter::new(
            "feed_sequence_gaps_total",
            "Depth updates that skipped past the local book",
        )?;
        let reconnects = IntCounter::new(
            "feed_reconnects_total",
            "Live connection attempts after a failure",
        )?;
        let demo_ticks = IntCounter::new("feed_demo_ticks_total", "Demo generator ticks")?;
        let source_switches = IntCounter::new(
            "feed_source_switches_total",
            "Data sources established after a selection change",
        )?;
        let connected = IntGauge::new("feed_connected", "1 while the active source is connected")?;

        registry.register(Box::new(messages.clone()))?;
        registry.register(Box::new(dropped_messages.clone()))?;
        registry.register(Box::new(sequence_gaps.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(demo_ticks.clone()))?;
        registry.register(Box::new(source_switches.clone()))?;
        registry.register(Box::new(connected.clone()))?;

        Ok(Self {
            registry,
            messages,
            dropped_messages,
            sequence_gaps,
            reconnects,
            demo_ticks,
            source_switches,
            connected,
        })
    }

    pub fn record_message(&self, kind: &str) {
        self.messages.with_label_values(&[kind]).inc();
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| FeedError::MetricsError(e.to_string()))
    }
}
