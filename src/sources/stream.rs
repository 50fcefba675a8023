/// Gateway publish/subscribe messages
///
/// One message per observed advertisement. The sensor address is not in the
/// payload; it is the last segment of the routing key, e.g.
/// `ruuvi/AA:BB:CC:DD:EE:FF/CB:B8:33:4C:88:4F`.
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;

use super::{resolve_gateway_id, signal_strength, SourceAdapter};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{MacAddress, RequestContext, Sample, SampleMeta};

#[derive(Debug, Deserialize)]
struct StreamMessage {
    data: String,
    #[serde(default)]
    rssi: Value,
    #[serde(default)]
    gw_mac: Option<String>,
    #[serde(default)]
    ts: Value,
}

pub struct GatewayStreamAdapter {
    config: Arc<IngestConfig>,
}

impl GatewayStreamAdapter {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        GatewayStreamAdapter { config }
    }
}

/// Sensor address from the routing key's last segment
fn address_from_routing_key(routing_key: &str) -> Result<MacAddress, IngestError> {
    let segment = routing_key
        .trim_end_matches('/')
        .rsplit(['/', '.'])
        .next()
        .unwrap_or_default();
    segment.parse()
}

/// Unix seconds, as a number or a numeric string
fn send_time(ts: &Value) -> Option<OffsetDateTime> {
    let seconds = match ts {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    OffsetDateTime::from_unix_timestamp(seconds).ok()
}

impl SourceAdapter for GatewayStreamAdapter {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn extract(&self, body: &[u8], ctx: &RequestContext) -> Result<Vec<Sample>, IngestError> {
        let routing_key = ctx
            .routing_key
            .as_deref()
            .ok_or_else(|| IngestError::Malformed("stream message without routing key".into()))?;
        let mac = address_from_routing_key(routing_key)?;
        let message: StreamMessage = serde_json::from_slice(body)?;

        let sent_at = send_time(&message.ts);
        if let Some(sent_at) = sent_at {
            debug!(
                "Relay latency for {}: {} ms",
                mac,
                (ctx.received_at - sent_at).whole_milliseconds()
            );
        }

        Ok(vec![Sample {
            frame_hex: Some(message.data),
            meta: SampleMeta {
                mac,
                gateway_id: resolve_gateway_id(ctx, message.gw_mac.as_deref(), &self.config),
                rssi: signal_strength(&message.rssi),
                sent_at,
            },
        }])
    }
}
