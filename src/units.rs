//! Unit conversions shared by the normalizer and split builders

pub const MILES_PER_METER: f64 = 0.0006213712;

pub fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}

pub fn meters_to_miles(meters: f64) -> f64 {
  meters * MILES_PER_METER
}

pub fn meters_to_km(meters: f64) -> f64 {
  meters / 1000.0
}
