use approx::assert_relative_eq;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

use ruuvi_relay_ingest::sources::{
    GatewayBatchAdapter, GatewayStreamAdapter, SourceAdapter, StationAdapter,
};
use ruuvi_relay_ingest::{
    Batch, IngestConfig, Pipeline, PointSink, RequestContext, Sample, SampleMeta, SinkError,
};

const FORMAT_5_FRAME: &str = "0201061BFF99040512FC5394C37C0004FFFC040CAC364200CDCBB8334C884F";

// Flags, then a 17-byte manufacturer structure holding a format 3 payload:
// acceleration 1000 mg on every axis, battery 3000 mV
const FORMAT_3_FRAME: &str = "02010611FF990403291A1ECE1E03E803E803E80BB8";

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Batch>>,
}

#[async_trait]
impl PointSink for RecordingSink {
    async fn write(&self, batch: &Batch) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }
}

impl RecordingSink {
    fn points(&self) -> Vec<ruuvi_relay_ingest::SensorPoint> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|b| b.points.clone())
            .collect()
    }
}

fn config() -> Arc<IngestConfig> {
    Arc::new(IngestConfig::default())
}

fn received_at() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap()
}

async fn run(adapter: &dyn SourceAdapter, body: &str, ctx: RequestContext) -> RecordingSink {
    let sink = RecordingSink::default();
    Pipeline::new(config())
        .ingest(adapter, &sink, body.as_bytes(), &ctx)
        .await;
    sink
}

#[tokio::test]
async fn format_5_frame_decodes_unscaled() {
    let body = format!(
        r#"{{"data": "{}", "rssi": -64, "gw_mac": "AA:BB:CC:DD:EE:FF", "ts": 1700000000}}"#,
        FORMAT_5_FRAME
    );
    let ctx = RequestContext::new(received_at())
        .with_routing_key("ruuvi/AA:BB:CC:DD:EE:FF/CB:B8:33:4C:88:4F");
    let sink = run(&GatewayStreamAdapter::new(config()), &body, ctx).await;

    let points = sink.points();
    assert_eq!(points.len(), 1);
    let point = &points[0];
    assert_eq!(point.data_format(), Some(5));
    assert_eq!(point.mac.to_string(), "CB:B8:33:4C:88:4F");
    assert_eq!(point.gateway_id, "AA:BB:CC:DD:EE:FF");
    assert_eq!(point.rssi, Some(-64));
    assert_eq!(point.timestamp_ns, 1_700_000_000_123_000_000);

    let reading = point.reading.as_ref().unwrap();
    assert_relative_eq!(reading.acceleration_x.unwrap(), 0.004, epsilon = 1e-9);
    assert_relative_eq!(reading.acceleration_y.unwrap(), -0.004, epsilon = 1e-9);
    assert_relative_eq!(reading.acceleration_z.unwrap(), 1.036, epsilon = 1e-9);
    assert_relative_eq!(reading.battery_voltage.unwrap(), 2.977, epsilon = 1e-9);
}

#[tokio::test]
async fn format_3_frame_is_normalized() {
    let body = format!(
        r#"{{"data": {{"gw_mac": "gw", "tags": {{"CB:B8:33:4C:88:4F": {{"rssi": -70, "data": "{}"}}}}}}}}"#,
        FORMAT_3_FRAME
    );
    let sink = run(
        &GatewayBatchAdapter::new(config()),
        &body,
        RequestContext::new(received_at()),
    )
    .await;

    let points = sink.points();
    assert_eq!(points.len(), 1);
    let reading = points[0].reading.as_ref().unwrap();
    assert_eq!(reading.data_format, 3);
    assert_relative_eq!(reading.acceleration_x.unwrap(), 1.0);
    assert_relative_eq!(reading.acceleration_y.unwrap(), 1.0);
    assert_relative_eq!(reading.acceleration_z.unwrap(), 1.0);
    assert_relative_eq!(reading.battery_voltage.unwrap(), 3.0);
}

#[tokio::test]
async fn gateway_batch_skips_non_ruuvi_entries() {
    let body = format!(
        r#"{{"data": {{"gw_mac": "C8:25:2D:8E:9C:2C", "tags": {{
            "CB:B8:33:4C:88:4F": {{"rssi": -71, "data": "{}"}},
            "D1:2A:00:11:22:33": {{"rssi": -85, "data": "1AFF4C000215"}}
        }}}}}}"#,
        FORMAT_5_FRAME
    );
    let sink = run(
        &GatewayBatchAdapter::new(config()),
        &body,
        RequestContext::new(received_at()),
    )
    .await;

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0].points[0].gateway_id, "C8:25:2D:8E:9C:2C");
}

#[test]
fn station_tags_not_an_array_is_an_empty_batch() {
    let adapter = StationAdapter::new(config());
    let ctx = RequestContext::new(received_at());
    let samples = adapter
        .extract(br#"{"deviceId": "phone", "tags": "none"}"#, &ctx)
        .unwrap_or_default();

    let batch = Pipeline::new(config()).process(samples, &ctx);
    assert!(batch.is_empty());
}

#[tokio::test]
async fn station_tags_not_an_array_is_not_written() {
    let sink = run(
        &StationAdapter::new(config()),
        r#"{"deviceId": "phone", "tags": {"id": "cbb8334c884f"}}"#,
        RequestContext::new(received_at()),
    )
    .await;
    assert!(sink.batches.lock().unwrap().is_empty());
}

#[test]
fn same_millisecond_samples_get_distinct_timestamps() {
    let meta = SampleMeta {
        mac: "CB:B8:33:4C:88:4F".parse().unwrap(),
        gateway_id: "gw".into(),
        rssi: Some(-70),
        sent_at: None,
    };
    let samples = vec![
        Sample {
            frame_hex: Some(FORMAT_5_FRAME.into()),
            meta: meta.clone(),
        },
        Sample {
            frame_hex: Some(FORMAT_5_FRAME.into()),
            meta,
        },
    ];

    let batch = Pipeline::new(config()).process(samples, &RequestContext::new(received_at()));
    let [first, second] = &batch.points[..] else {
        panic!("expected two points, got {}", batch.len());
    };
    assert_eq!(first.tag_set(), second.tag_set());
    assert_eq!(second.timestamp_ns - first.timestamp_ns, 1);
}

#[tokio::test]
async fn repeated_station_tags_do_not_collide() {
    let sink = run(
        &StationAdapter::new(config()),
        r#"{"deviceId": "phone", "tags": [
            {"id": "cbb8334c884f", "rssi": -70},
            {"id": "cbb8334c884f", "rssi": -72},
            {"id": "cbb8334c884f", "rssi": -74}
        ]}"#,
        RequestContext::new(received_at()),
    )
    .await;

    let points = sink.points();
    assert_eq!(points.len(), 3);
    assert!(points
        .windows(2)
        .all(|w| w[0].tag_set() == w[1].tag_set() && w[0].timestamp_ns < w[1].timestamp_ns));
}
