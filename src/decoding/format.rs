/// RuuviTag data format decoding
///
/// Each supported data format is described by a layout table: an ordered list
/// of fields with their byte offset, raw encoding, linear scale and the raw
/// value the sensor uses to mark the field as unavailable. Decoding walks the
/// table; unit corrections that differ between formats happen afterwards in
/// [`normalize`].
///
/// Formats 2 and 4 (legacy URL formats) share the humidity/temperature/pressure
/// layout. Format 3 (RAWv1) extends it with acceleration in milli-g and battery
/// in millivolts. Format 5 (RAWv2) uses a finer layout with acceleration in g,
/// battery in volts, TX power, movement counter and sequence number.
use crate::error::DecodeError;
use crate::models::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Temperature,
    Humidity,
    Pressure,
    AccelerationX,
    AccelerationY,
    AccelerationZ,
    BatteryVoltage,
    TxPower,
    MovementCounter,
    MeasurementSequenceNumber,
}

#[derive(Debug, Clone, Copy)]
enum Encoding {
    U8,
    I16,
    U16,
    /// Sign bit plus 7-bit whole degrees, followed by a byte of hundredths
    SignMagnitude,
    /// Bit range `[shift, shift + width)` of a big-endian u16
    U16Bits { shift: u8, width: u8 },
}

impl Encoding {
    fn width(self) -> usize {
        match self {
            Encoding::U8 => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    field: Field,
    offset: usize,
    encoding: Encoding,
    scale: f64,
    bias: f64,
    invalid: Option<i64>,
}

const fn spec(field: Field, offset: usize, encoding: Encoding, scale: f64, bias: f64) -> FieldSpec {
    FieldSpec {
        field,
        offset,
        encoding,
        scale,
        bias,
        invalid: None,
    }
}

const fn with_invalid(mut s: FieldSpec, raw: i64) -> FieldSpec {
    s.invalid = Some(raw);
    s
}

/// Humidity 0.5 %, temperature sign/magnitude, pressure Pa - 50000
const LEGACY_FIELDS: &[FieldSpec] = &[
    spec(Field::Humidity, 1, Encoding::U8, 0.5, 0.0),
    spec(Field::Temperature, 2, Encoding::SignMagnitude, 1.0, 0.0),
    spec(Field::Pressure, 4, Encoding::U16, 0.01, 500.0),
];

/// RAWv1 additions, left in milli-g and millivolts
const RAWV1_FIELDS: &[FieldSpec] = &[
    spec(Field::AccelerationX, 6, Encoding::I16, 1.0, 0.0),
    spec(Field::AccelerationY, 8, Encoding::I16, 1.0, 0.0),
    spec(Field::AccelerationZ, 10, Encoding::I16, 1.0, 0.0),
    spec(Field::BatteryVoltage, 12, Encoding::U16, 1.0, 0.0),
];

const RAWV2_FIELDS: &[FieldSpec] = &[
    with_invalid(spec(Field::Temperature, 1, Encoding::I16, 0.005, 0.0), -32768),
    with_invalid(spec(Field::Humidity, 3, Encoding::U16, 0.0025, 0.0), 0xFFFF),
    with_invalid(spec(Field::Pressure, 5, Encoding::U16, 0.01, 500.0), 0xFFFF),
    with_invalid(spec(Field::AccelerationX, 7, Encoding::I16, 0.001, 0.0), -32768),
    with_invalid(spec(Field::AccelerationY, 9, Encoding::I16, 0.001, 0.0), -32768),
    with_invalid(spec(Field::AccelerationZ, 11, Encoding::I16, 0.001, 0.0), -32768),
    // Upper 11 bits: millivolts above 1600
    with_invalid(
        spec(
            Field::BatteryVoltage,
            13,
            Encoding::U16Bits { shift: 5, width: 11 },
            0.001,
            1.6,
        ),
        2047,
    ),
    // Lower 5 bits: 2 dBm steps from -40 dBm
    with_invalid(
        spec(
            Field::TxPower,
            13,
            Encoding::U16Bits { shift: 0, width: 5 },
            2.0,
            -40.0,
        ),
        31,
    ),
    with_invalid(spec(Field::MovementCounter, 15, Encoding::U8, 1.0, 0.0), 0xFF),
    with_invalid(
        spec(Field::MeasurementSequenceNumber, 16, Encoding::U16, 1.0, 0.0),
        0xFFFF,
    ),
];

struct Layout {
    version: u8,
    min_len: usize,
    parts: &'static [&'static [FieldSpec]],
}

const LAYOUTS: &[Layout] = &[
    Layout {
        version: 2,
        min_len: 6,
        parts: &[LEGACY_FIELDS],
    },
    Layout {
        version: 3,
        min_len: 14,
        parts: &[LEGACY_FIELDS, RAWV1_FIELDS],
    },
    Layout {
        version: 4,
        min_len: 6,
        parts: &[LEGACY_FIELDS],
    },
    // Trailing six bytes carry the sensor MAC, which the relay already reports
    Layout {
        version: 5,
        min_len: 24,
        parts: &[RAWV2_FIELDS],
    },
];

/// Smallest payload any supported format can fit in
pub fn min_payload_len() -> usize {
    LAYOUTS.iter().map(|l| l.min_len).min().unwrap_or(0)
}

impl FieldSpec {
    fn read(&self, payload: &[u8]) -> Option<f64> {
        let bytes = payload.get(self.offset..self.offset + self.encoding.width())?;
        let raw: i64 = match self.encoding {
            Encoding::U8 => bytes[0] as i64,
            Encoding::I16 => i16::from_be_bytes([bytes[0], bytes[1]]) as i64,
            Encoding::U16 => u16::from_be_bytes([bytes[0], bytes[1]]) as i64,
            Encoding::U16Bits { shift, width } => {
                let word = u16::from_be_bytes([bytes[0], bytes[1]]) as i64;
                (word >> shift) & ((1 << width) - 1)
            }
            Encoding::SignMagnitude => {
                let whole = (bytes[0] & 0x7F) as f64;
                let fraction = bytes[1] as f64 / 100.0;
                let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
                return Some(sign * (whole + fraction) * self.scale + self.bias);
            }
        };

        if self.invalid == Some(raw) {
            return None;
        }
        Some(raw as f64 * self.scale + self.bias)
    }
}

/// Decode a located payload through its layout table, without unit corrections
pub fn decode_raw(payload: &[u8]) -> Result<Reading, DecodeError> {
    let version = *payload.first().ok_or(DecodeError::Empty)?;
    let layout = LAYOUTS
        .iter()
        .find(|l| l.version == version)
        .ok_or(DecodeError::UnsupportedFormat(version))?;

    if payload.len() < layout.min_len {
        return Err(DecodeError::TooShort {
            version,
            len: payload.len(),
            min: layout.min_len,
        });
    }

    let mut reading = Reading {
        data_format: version,
        ..Reading::default()
    };

    for spec in layout.parts.iter().flat_map(|part| part.iter()) {
        let value = spec.read(payload);
        match spec.field {
            Field::Temperature => reading.temperature = value,
            Field::Humidity => reading.humidity = value,
            Field::Pressure => reading.pressure = value,
            Field::AccelerationX => reading.acceleration_x = value,
            Field::AccelerationY => reading.acceleration_y = value,
            Field::AccelerationZ => reading.acceleration_z = value,
            Field::BatteryVoltage => reading.battery_voltage = value,
            Field::TxPower => reading.tx_power = value,
            Field::MovementCounter => reading.movement_counter = value.map(|v| v as u32),
            Field::MeasurementSequenceNumber => {
                reading.measurement_sequence_number = value.map(|v| v as u32)
            }
        }
    }

    Ok(reading)
}

/// Bring a raw reading to g and volts
///
/// Format 3 reports acceleration in milli-g and battery in millivolts; the
/// other formats are already in physical units.
pub fn normalize(mut reading: Reading) -> Reading {
    if reading.data_format == 3 {
        for axis in [
            &mut reading.acceleration_x,
            &mut reading.acceleration_y,
            &mut reading.acceleration_z,
        ] {
            *axis = axis.map(|milli_g| milli_g / 1000.0);
        }
        reading.battery_voltage = reading.battery_voltage.map(|millivolts| millivolts / 1000.0);
    }
    reading
}

/// Decode and normalize a located payload
pub fn decode(payload: &[u8]) -> Result<Reading, DecodeError> {
    decode_raw(payload).map(normalize)
}
