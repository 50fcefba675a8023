/// Source adapters: one per relay carrier
///
/// An adapter turns one inbound message into samples for the pipeline. It only
/// fails for problems with the message as a whole; a bad entry inside an
/// otherwise usable message is logged and skipped.
pub mod gateway;
pub mod station;
pub mod stream;

pub use gateway::GatewayBatchAdapter;
pub use station::StationAdapter;
pub use stream::GatewayStreamAdapter;

use serde_json::Value;

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::models::{RequestContext, Sample};

pub trait SourceAdapter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn extract(&self, body: &[u8], ctx: &RequestContext) -> Result<Vec<Sample>, IngestError>;
}

/// Request override, then the payload's own id, then the configured default
fn resolve_gateway_id(
    ctx: &RequestContext,
    from_payload: Option<&str>,
    config: &IngestConfig,
) -> String {
    ctx.gateway_id
        .as_deref()
        .or(from_payload.filter(|id| !id.is_empty()))
        .or(config.default_gateway_id.as_deref())
        .unwrap_or_default()
        .to_string()
}

/// Signal strength as sent: integer, float or numeric string
fn signal_strength(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
