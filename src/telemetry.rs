//! Optional JSON data sources served on the telemetry route.

use rand::Rng;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Produces the current snapshot synchronously, or `None` when no data is
/// available right now.
pub trait TelemetrySource: Send + Sync {
    fn snapshot(&self) -> Option<Value>;
}

/// Simulated device readings within plausible ranges.
pub struct RandomTelemetry;

impl TelemetrySource for RandomTelemetry {
    fn snapshot(&self) -> Option<Value> {
        let mut rng = rand::rng();
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let acceleration: Vec<f32> = (0..3).map(|_| rng.random_range(0.0..1.0)).collect();
        let gyroscope: Vec<f32> = (0..3).map(|_| rng.random_range(-1.0..1.0)).collect();

        Some(json!({
            "time": time,
            "temperature": rng.random_range(20.0..35.0f64),
            "humidity": rng.random_range(0..100u32),
            "pressure": rng.random_range(900.0..1100.0f64),
            "latitude": rng.random_range(48.0..52.0f64),
            "longitude": rng.random_range(10.0..14.0f64),
            "acceleration": acceleration,
            "gyroscope": gyroscope,
        }))
    }
}
