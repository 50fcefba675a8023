/// Ingestion pipeline: samples in, one sink write out
///
/// Every sample goes through locate → decode → normalize, is merged with its
/// metadata and stamped by the batch's sequencer. A sample that fails any step
/// is dropped on its own; a message that cannot be read at all becomes an
/// empty batch. Neither case is reported to the caller as a failure.
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::config::IngestConfig;
use crate::decoding::{decode, locate_hex};
use crate::derived::DerivedValues;
use crate::models::{Batch, RequestContext, Sample, SensorPoint};
use crate::sequencer::TimestampSequencer;
use crate::sink::PointSink;
use crate::sources::SourceAdapter;

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub samples: usize,
    pub points: usize,
    pub written: bool,
}

pub struct Pipeline {
    config: Arc<IngestConfig>,
}

impl Pipeline {
    pub fn new(config: Arc<IngestConfig>) -> Self {
        Pipeline { config }
    }

    /// Build the batch for one message's samples
    pub fn process(&self, samples: Vec<Sample>, ctx: &RequestContext) -> Batch {
        let mut batch = Batch::new(ctx.received_at);
        let mut sequencer = TimestampSequencer::new(ctx.received_millis());

        for sample in samples {
            let mac = sample.meta.mac;
            let reading = match &sample.frame_hex {
                None => None,
                Some(frame_hex) => match locate_hex(frame_hex) {
                    Ok(Some(payload)) => match decode(&payload) {
                        Ok(reading) => Some(reading),
                        Err(e) => {
                            debug!("Dropping sample from {}: {}", mac, e);
                            continue;
                        }
                    },
                    // Not a Ruuvi broadcast
                    Ok(None) => {
                        debug!("No Ruuvi data in frame from {}", mac);
                        continue;
                    }
                    Err(e) => {
                        warn!("Dropping sample from {}: {}", mac, e);
                        continue;
                    }
                },
            };

            let derived = if self.config.extended {
                reading.as_ref().map(DerivedValues::from_reading)
            } else {
                None
            };

            batch.points.push(SensorPoint {
                mac,
                name: self.config.tag_name(&mac).map(str::to_string),
                gateway_id: sample.meta.gateway_id,
                reading,
                rssi: sample.meta.rssi,
                derived,
                timestamp_ns: sequencer.next_timestamp(),
            });
        }

        batch
    }

    /// Run one inbound message through an adapter and into the sink
    ///
    /// Never fails: malformed messages yield an empty batch, and sink errors
    /// are logged and the batch dropped.
    pub async fn ingest<S>(
        &self,
        adapter: &dyn SourceAdapter,
        sink: &S,
        body: &[u8],
        ctx: &RequestContext,
    ) -> IngestSummary
    where
        S: PointSink + ?Sized,
    {
        let samples = match adapter.extract(body, ctx) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Ignoring {} message: {}", adapter.name(), e);
                Vec::new()
            }
        };
        let sample_count = samples.len();
        let batch = self.process(samples, ctx);

        let mut summary = IngestSummary {
            samples: sample_count,
            points: batch.len(),
            written: false,
        };
        if batch.is_empty() {
            debug!("Nothing to write for {} message", adapter.name());
            return summary;
        }

        match sink.write(&batch).await {
            Ok(()) => {
                summary.written = true;
                info!(
                    "Stored {} of {} samples from {} message",
                    summary.points,
                    summary.samples,
                    adapter.name()
                );
            }
            Err(e) => error!(
                "Failed to store {} points from {} message: {}",
                summary.points,
                adapter.name(),
                e
            ),
        }
        summary
    }
}
