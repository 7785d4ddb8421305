//! Speed and distance readouts.
//!
//! The simulation pushes two strings per frame into a [`HudSink`]; the sink
//! decides where they end up (screen overlay, window title, a test buffer).

use serde::{Deserialize, Serialize};

/// Receiver for the two HUD fields.
pub trait HudSink {
    /// Speed in whole km/h, without unit.
    fn set_speed(&mut self, text: &str);
    /// Distance with its unit, e.g. `"420 m"` or `"1.25 km"`.
    fn set_distance(&mut self, text: &str);
}

const KMH_PER_MPS: f32 = 3.6;
const METERS_PER_MILE: f32 = 1609.34;

/// Speed in m/s rounded to whole km/h. Non-finite input reads as zero.
pub fn speed_kmh(speed_mps: f32) -> i64 {
    if speed_mps.is_finite() {
        (speed_mps.abs() * KMH_PER_MPS).round() as i64
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn meters_per_unit(self) -> f32 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => METERS_PER_MILE,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }

    pub fn convert(self, meters: f32) -> f32 {
        meters / self.meters_per_unit()
    }

    /// Whole meters, or two decimals for the larger units.
    pub fn format(self, meters: f32) -> String {
        let meters = if meters.is_finite() { meters.max(0.0) } else { 0.0 };
        match self {
            DistanceUnit::Meters => format!("{} m", meters.round() as u64),
            unit => format!("{:.2} {}", unit.convert(meters), unit.suffix()),
        }
    }
}

/// Meters below one kilometer, kilometers from there on.
pub fn format_distance(meters: f32) -> String {
    let rounded = if meters.is_finite() { meters.max(0.0).round() } else { 0.0 };
    if rounded < 1000.0 {
        DistanceUnit::Meters.format(meters)
    } else {
        DistanceUnit::Kilometers.format(meters)
    }
}

/// Format both readouts and hand them to `sink`. `unit` pins the distance unit;
/// `None` switches from meters to kilometers automatically.
pub fn publish(
    sink: &mut dyn HudSink,
    speed_mps: f32,
    distance_m: f32,
    unit: Option<DistanceUnit>,
) {
    sink.set_speed(&speed_kmh(speed_mps).to_string());
    let distance = match unit {
        Some(unit) => unit.format(distance_m),
        None => format_distance(distance_m),
    };
    sink.set_distance(&distance);
}

/// Latest HUD strings, kept for drawing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HudText {
    pub speed: String,
    pub distance: String,
}

impl HudSink for HudText {
    fn set_speed(&mut self, text: &str) {
        if self.speed != text {
            self.speed.clear();
            self.speed.push_str(text);
        }
    }

    fn set_distance(&mut self, text: &str) {
        if self.distance != text {
            self.distance.clear();
            self.distance.push_str(text);
        }
    }
}
