/// Gateway HTTP batches
///
/// The gateway posts every advertisement it heard since the last post, keyed
/// by sensor address. Its JSON is not always well formed, so strict parsing
/// falls back to JSON5.
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::{resolve_gateway_id, signal_strength, SourceAdapter};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{MacAddress, RequestContext, Sample, SampleMeta};

#[derive(Debug, Deserialize)]
struct GatewayReport {
    data: GatewayData,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    #[serde(default)]
    gw_mac: Option<String>,
    /// Insertion-ordered (`preserve_order`), so samples follow the report
    #[serde(default)]
    tags: Map<String, Value>,
}

pub struct GatewayBatchAdapter {
    config: Arc<IngestConfig>,
}

impl GatewayBatchAdapter {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        GatewayBatchAdapter { config }
    }
}

fn parse_report(body: &[u8]) -> Result<GatewayReport, IngestError> {
    match serde_json::from_slice(body) {
        Ok(report) => Ok(report),
        Err(strict) => {
            let text = std::str::from_utf8(body)
                .map_err(|e| IngestError::Malformed(format!("gateway body is not UTF-8: {}", e)))?;
            let report = json5::from_str(text).map_err(|lenient| {
                IngestError::Malformed(format!(
                    "gateway body: {} (lenient parse: {})",
                    strict, lenient
                ))
            })?;
            debug!("Gateway body needed lenient parsing: {}", strict);
            Ok(report)
        }
    }
}

impl SourceAdapter for GatewayBatchAdapter {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn extract(&self, body: &[u8], ctx: &RequestContext) -> Result<Vec<Sample>, IngestError> {
        let report = parse_report(body)?;
        let gateway_id = resolve_gateway_id(ctx, report.data.gw_mac.as_deref(), &self.config);

        let mut samples = Vec::with_capacity(report.data.tags.len());
        for (address, tag) in &report.data.tags {
            let mac = match address.parse::<MacAddress>() {
                Ok(mac) => mac,
                Err(e) => {
                    warn!("Skipping gateway entry: {}", e);
                    continue;
                }
            };
            let Some(frame_hex) = tag.get("data").and_then(Value::as_str) else {
                debug!("Gateway entry for {} has no data", mac);
                continue;
            };

            samples.push(Sample {
                frame_hex: Some(frame_hex.to_string()),
                meta: SampleMeta {
                    mac,
                    gateway_id: gateway_id.clone(),
                    rssi: tag.get("rssi").and_then(signal_strength),
                    sent_at: None,
                },
            });
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> GatewayBatchAdapter {
        GatewayBatchAdapter::new(Arc::new(IngestConfig::default()))
    }

    #[test]
    fn one_sample_per_address() {
        let body = br#"{"data": {"gw_mac": "AA:BB:CC:DD:EE:FF", "tags": {
            "CB:B8:33:4C:88:4F": {"rssi": -71, "data": "0201061BFF99040512FC5394C37C0004FFFC040CAC364200CDCBB8334C884F"},
            "D1:2A:00:11:22:33": {"rssi": -85, "data": "1AFF4C000215"}
        }}}"#;
        let samples = adapter().extract(body, &RequestContext::now()).unwrap();

        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.meta.gateway_id == "AA:BB:CC:DD:EE:FF"));
        assert_eq!(samples[0].meta.rssi, Some(-71));
    }

    #[test]
    fn keeps_arrival_order() {
        let body = br#"{"data": {"gw_mac": "gw", "tags": {
            "FF:00:00:00:00:01": {"data": "00"},
            "AA:00:00:00:00:02": {"data": "00"},
            "CC:00:00:00:00:03": {"data": "00"}
        }}}"#;
        let order: Vec<String> = adapter()
            .extract(body, &RequestContext::now())
            .unwrap()
            .iter()
            .map(|s| s.meta.mac.to_string())
            .collect();
        assert_eq!(
            order,
            ["FF:00:00:00:00:01", "AA:00:00:00:00:02", "CC:00:00:00:00:03"]
        );
    }

    #[test]
    fn loose_json_keeps_arrival_order() {
        let body = br#"{data: {tags: {
            'FF:00:00:00:00:01': {data: '00'},
            'AA:00:00:00:00:02': {data: '00'},
        },},}"#;
        let samples = adapter().extract(body, &RequestContext::now()).unwrap();
        assert_eq!(samples[0].meta.mac.to_string(), "FF:00:00:00:00:01");
        assert_eq!(samples[1].meta.mac.to_string(), "AA:00:00:00:00:02");
    }

    #[test]
    fn repairs_loose_json() {
        let body = br#"{data: {gw_mac: 'gw-1', tags: {
            'CB:B8:33:4C:88:4F': {rssi: -71, data: '0201061BFF99',},
        },},}"#;
        let samples = adapter().extract(body, &RequestContext::now()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].meta.gateway_id, "gw-1");
        assert_eq!(samples[0].meta.rssi, Some(-71));
    }

    #[test]
    fn request_gateway_id_wins() {
        let body = br#"{"data": {"gw_mac": "payload", "tags": {
            "CB:B8:33:4C:88:4F": {"rssi": -71, "data": "00"}
        }}}"#;
        let ctx = RequestContext::now().with_gateway_id("override");
        let samples = adapter().extract(body, &ctx).unwrap();
        assert_eq!(samples[0].meta.gateway_id, "override");
    }

    #[test]
    fn skips_bad_entries() {
        let body = br#"{"data": {"tags": {
            "not-an-address": {"rssi": -71, "data": "00"},
            "CB:B8:33:4C:88:4F": {"rssi": -71}
        }}}"#;
        assert!(adapter()
            .extract(body, &RequestContext::now())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_unusable_body() {
        assert!(adapter().extract(b"{{{", &RequestContext::now()).is_err());
        assert!(adapter()
            .extract(br#"{"tags": []}"#, &RequestContext::now())
            .is_err());
    }
}
