use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

use crate::decoding::hex::hex_to_bytes;
use crate::derived::DerivedValues;
use crate::error::IngestError;

/// Decoded fields of one sensor broadcast, already in physical units
///
/// Fields a data format does not carry stay `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reading {
    pub data_format: u8,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub acceleration_x: Option<f64>,
    pub acceleration_y: Option<f64>,
    pub acceleration_z: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub tx_power: Option<f64>,
    pub movement_counter: Option<u32>,
    pub measurement_sequence_number: Option<u32>,
}

/// Six-octet device address, shown as `AA:BB:CC:DD:EE:FF`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl FromStr for MacAddress {
    type Err = IngestError;

    /// Accepts bare hex digits or `:`/`-` separated octets, in either case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        let bytes = hex_to_bytes(&digits)
            .map_err(|e| IngestError::Malformed(format!("address {:?}: {}", s, e)))?;
        let octets: [u8; 6] = bytes
            .try_into()
            .map_err(|_| IngestError::Malformed(format!("address {:?} is not 6 octets", s)))?;
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

/// Request-level context shared by every sample of one inbound message
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub received_at: OffsetDateTime,
    /// Overrides any gateway id found in the payload
    pub gateway_id: Option<String>,
    /// Transport routing key (topic) for publish/subscribe messages
    pub routing_key: Option<String>,
}

impl RequestContext {
    pub fn new(received_at: OffsetDateTime) -> Self {
        RequestContext {
            received_at,
            gateway_id: None,
            routing_key: None,
        }
    }

    pub fn now() -> Self {
        Self::new(OffsetDateTime::now_utc())
    }

    pub fn with_gateway_id(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = Some(gateway_id.into());
        self
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }

    /// Receipt time truncated to whole milliseconds since the epoch
    pub fn received_millis(&self) -> i64 {
        (self.received_at.unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Per-sample metadata supplied by a source adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMeta {
    pub mac: MacAddress,
    pub gateway_id: String,
    pub rssi: Option<i32>,
    /// Time the relay says it sent the observation
    pub sent_at: Option<OffsetDateTime>,
}

/// One observation as produced by a source adapter
///
/// `frame_hex` is `None` when the carrier reports presence only.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub frame_hex: Option<String>,
    pub meta: SampleMeta,
}

/// Canonical output record handed to the sink
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPoint {
    pub mac: MacAddress,
    pub gateway_id: String,
    pub name: Option<String>,
    /// `None` for presence-only samples
    pub reading: Option<Reading>,
    pub rssi: Option<i32>,
    pub derived: Option<DerivedValues>,
    pub timestamp_ns: i64,
}

impl SensorPoint {
    pub fn data_format(&self) -> Option<u8> {
        self.reading.as_ref().map(|r| r.data_format)
    }

    /// Identity of the point for the sink, apart from its timestamp
    pub fn tag_set(&self) -> (MacAddress, &str, Option<u8>) {
        (self.mac, &self.gateway_id, self.data_format())
    }

    /// Non-null fields keyed by their sink names
    pub fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(r) = &self.reading {
            put_float(&mut fields, "temperature", r.temperature);
            put_float(&mut fields, "humidity", r.humidity);
            put_float(&mut fields, "pressure", r.pressure);
            put_float(&mut fields, "accelerationX", r.acceleration_x);
            put_float(&mut fields, "accelerationY", r.acceleration_y);
            put_float(&mut fields, "accelerationZ", r.acceleration_z);
            put_float(&mut fields, "batteryVoltage", r.battery_voltage);
            put_float(&mut fields, "txPower", r.tx_power);
            put_int(&mut fields, "movementCounter", r.movement_counter.map(i64::from));
            put_int(
                &mut fields,
                "measurementSequenceNumber",
                r.measurement_sequence_number.map(i64::from),
            );
        }
        put_int(&mut fields, "rssi", self.rssi.map(i64::from));
        if let Some(d) = &self.derived {
            put_float(&mut fields, "accelerationTotal", d.acceleration_total);
            put_float(&mut fields, "absoluteHumidity", d.absolute_humidity);
            put_float(&mut fields, "dewPoint", d.dew_point);
            put_float(
                &mut fields,
                "equilibriumVaporPressure",
                d.equilibrium_vapor_pressure,
            );
            put_float(&mut fields, "airDensity", d.air_density);
            put_float(&mut fields, "accelerationAngleFromX", d.angle_from_x);
            put_float(&mut fields, "accelerationAngleFromY", d.angle_from_y);
            put_float(&mut fields, "accelerationAngleFromZ", d.angle_from_z);
        }
        fields
    }
}

fn put_float(fields: &mut Map<String, Value>, key: &str, value: Option<f64>) {
    // NaN/inf have no JSON form and are dropped
    if let Some(n) = value.and_then(Number::from_f64) {
        fields.insert(key.to_string(), Value::Number(n));
    }
}

fn put_int(fields: &mut Map<String, Value>, key: &str, value: Option<i64>) {
    if let Some(v) = value {
        fields.insert(key.to_string(), Value::from(v));
    }
}

/// Points produced from one inbound message, in sample order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub received_at: OffsetDateTime,
    pub points: Vec<SensorPoint>,
}

impl Batch {
    pub fn new(received_at: OffsetDateTime) -> Self {
        Batch {
            received_at,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_accepts_common_spellings() {
        let expected = "CB:B8:33:4C:88:4F";
        for input in ["cbb8334c884f", "CB:B8:33:4C:88:4F", "cb-b8-33-4c-88-4f"] {
            let mac: MacAddress = input.parse().unwrap();
            assert_eq!(mac.to_string(), expected);
        }
    }

    #[test]
    fn mac_rejects_wrong_length() {
        assert!("CB:B8:33:4C:88".parse::<MacAddress>().is_err());
        assert!("CB:B8:33:4C:88:4F:00".parse::<MacAddress>().is_err());
        assert!("not-a-mac".parse::<MacAddress>().is_err());
    }

    #[test]
    fn fields_skip_nulls() {
        let point = SensorPoint {
            mac: "CBB8334C884F".parse().unwrap(),
            gateway_id: "gw".into(),
            name: None,
            reading: Some(Reading {
                data_format: 2,
                temperature: Some(21.5),
                ..Reading::default()
            }),
            rssi: Some(-70),
            derived: None,
            timestamp_ns: 0,
        };

        let fields = point.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["temperature"], Value::from(21.5));
        assert_eq!(fields["rssi"], Value::from(-70));
        assert_eq!(point.data_format(), Some(2));
    }

    #[test]
    fn received_millis_truncates() {
        let at = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_123_456_789).unwrap();
        assert_eq!(RequestContext::new(at).received_millis(), 1_700_000_000_123);
    }
}
