/// Station application reports
///
/// The station posts the tags it can hear with their signal strength but no
/// broadcast payload, so its samples only carry presence and RSSI.
use log::debug;
use serde_json::Value;
use std::sync::Arc;

use super::{resolve_gateway_id, signal_strength, SourceAdapter};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{MacAddress, RequestContext, Sample, SampleMeta};

pub struct StationAdapter {
    config: Arc<IngestConfig>,
}

impl StationAdapter {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        StationAdapter { config }
    }
}

impl SourceAdapter for StationAdapter {
    fn name(&self) -> &'static str {
        "station"
    }

    fn extract(&self, body: &[u8], ctx: &RequestContext) -> Result<Vec<Sample>, IngestError> {
        let report: Value = serde_json::from_slice(body)?;
        let device_id = report.get("deviceId").and_then(Value::as_str);
        let tags = report
            .get("tags")
            .and_then(Value::as_array)
            .ok_or_else(|| IngestError::Malformed("station report has no tags array".into()))?;

        let gateway_id = resolve_gateway_id(ctx, device_id, &self.config);

        let samples = tags
            .iter()
            .filter_map(|tag| {
                let id = tag.get("id").and_then(Value::as_str)?;
                match id.parse::<MacAddress>() {
                    Ok(mac) => Some(Sample {
                        frame_hex: None,
                        meta: SampleMeta {
                            mac,
                            gateway_id: gateway_id.clone(),
                            rssi: tag.get("rssi").and_then(signal_strength),
                            sent_at: None,
                        },
                    }),
                    Err(e) => {
                        debug!("Skipping station tag: {}", e);
                        None
                    }
                }
            })
            .collect();

        Ok(samples)
    }
}
