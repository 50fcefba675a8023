/// Values computed from a decoded reading
///
/// These are only attached to points when extended values are enabled in the
/// configuration. Every value needs all of its inputs; a missing input leaves
/// the value `None`.
use crate::models::Reading;

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedValues {
    /// Magnitude of the acceleration vector, g
    pub acceleration_total: Option<f64>,
    /// g/m³
    pub absolute_humidity: Option<f64>,
    /// °C
    pub dew_point: Option<f64>,
    /// Saturation vapor pressure over water, Pa
    pub equilibrium_vapor_pressure: Option<f64>,
    /// kg/m³
    pub air_density: Option<f64>,
    /// Angle between the acceleration vector and each axis, degrees
    pub angle_from_x: Option<f64>,
    pub angle_from_y: Option<f64>,
    pub angle_from_z: Option<f64>,
}

impl DerivedValues {
    pub fn from_reading(reading: &Reading) -> Self {
        let t = reading.temperature;
        let rh = reading.humidity;
        let acceleration_total = acceleration_total(reading);

        let angle = |axis: Option<f64>| match (axis, acceleration_total) {
            (Some(a), Some(total)) => angle_between(a, total),
            _ => None,
        };

        DerivedValues {
            acceleration_total,
            absolute_humidity: t.zip(rh).map(|(t, rh)| absolute_humidity(t, rh)),
            dew_point: t.zip(rh).and_then(|(t, rh)| dew_point(t, rh)),
            equilibrium_vapor_pressure: t.map(equilibrium_vapor_pressure),
            air_density: match (t, rh, reading.pressure) {
                (Some(t), Some(rh), Some(p)) => Some(air_density(t, rh, p)),
                _ => None,
            },
            angle_from_x: angle(reading.acceleration_x),
            angle_from_y: angle(reading.acceleration_y),
            angle_from_z: angle(reading.acceleration_z),
        }
    }
}

fn acceleration_total(reading: &Reading) -> Option<f64> {
    let x = reading.acceleration_x?;
    let y = reading.acceleration_y?;
    let z = reading.acceleration_z?;
    Some((x * x + y * y + z * z).sqrt())
}

/// Magnus approximation over water, Pa
pub fn equilibrium_vapor_pressure(temperature: f64) -> f64 {
    611.2 * (17.67 * temperature / (243.5 + temperature)).exp()
}

pub fn absolute_humidity(temperature: f64, humidity: f64) -> f64 {
    equilibrium_vapor_pressure(temperature) * humidity / 100.0
        / (461.5 * (temperature + KELVIN_OFFSET))
        * 1000.0
}

/// `None` when humidity is zero (no condensation point)
pub fn dew_point(temperature: f64, humidity: f64) -> Option<f64> {
    if humidity <= 0.0 {
        return None;
    }
    let v = (humidity / 100.0 * equilibrium_vapor_pressure(temperature) / 611.2).ln();
    Some(243.5 * v / (17.67 - v))
}

/// Moist air density from temperature (°C), humidity (%) and pressure (hPa)
pub fn air_density(temperature: f64, humidity: f64, pressure: f64) -> f64 {
    1.2929 * KELVIN_OFFSET / (temperature + KELVIN_OFFSET)
        * (pressure * 100.0
            - 0.3783 * humidity / 100.0 * equilibrium_vapor_pressure(temperature))
        / 101300.0
}

fn angle_between(axis: f64, total: f64) -> Option<f64> {
    if total == 0.0 {
        return None;
    }
    Some((axis / total).clamp(-1.0, 1.0).acos().to_degrees())
}
