/// Destination for finished batches
use async_trait::async_trait;
use log::info;

use crate::error::SinkError;
use crate::models::Batch;

#[async_trait]
pub trait PointSink: Send + Sync {
    /// Persist the whole batch as a single write
    async fn write(&self, batch: &Batch) -> Result<(), SinkError>;
}

/// Logs points instead of storing them
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl PointSink for LogSink {
    async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        for point in &batch.points {
            info!(
                "{} mac={} gateway_id={} dataFormat={} name={} {}",
                point.timestamp_ns,
                point.mac,
                point.gateway_id,
                point
                    .data_format()
                    .map_or_else(|| "-".to_string(), |f| f.to_string()),
                point.name.as_deref().unwrap_or("-"),
                serde_json::Value::Object(point.fields())
            );
        }
        Ok(())
    }
}
