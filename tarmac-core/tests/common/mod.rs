//! Synthetic surveillance feeds around a small airport.
#![allow(dead_code)]

use tarmac_core::loading::RawRecord;

/// Degrees of latitude per metre.
pub const M: f64 = 1.0 / 111_195.0;
pub const BASE_LAT: f64 = 47.45;
pub const BASE_LON: f64 = 8.55;
pub const EPOCH: i64 = 1_700_000_000;

pub fn record(vehicle: &str, secs: i64, north_m: f64, speed: f64) -> RawRecord {
    RawRecord {
        vehicle_id: Some(vehicle.to_string()),
        timestamp: Some((EPOCH + secs).to_string()),
        lat: Some(BASE_LAT + north_m * M),
        lon: Some(BASE_LON),
        altitude: Some(0.0),
        ground_speed: Some(speed),
        heading: None,
    }
}

/// Parks at the stand for 300 s, taxis past a holding point 300 m north,
/// rolls down the runway 1000-1150 m north and climbs out.
pub fn departure(vehicle: &str, offset: i64) -> Vec<RawRecord> {
    let mut records = Vec::new();
    // stand, sub-metre jitter
    for (i, jitter) in [0.0, 0.5, 1.0, 0.5, 0.0, 0.5].into_iter().enumerate() {
        records.push(record(vehicle, offset + i as i64 * 60, jitter, 0.1));
    }
    // taxi
    for i in 0..6 {
        records.push(record(vehicle, offset + 310 + i * 10, 300.0 + i as f64 * 2.0, 8.0));
    }
    // takeoff roll
    for i in 0..4 {
        let mut r = record(vehicle, offset + 400 + i * 10, 1000.0 + i as f64 * 50.0, 60.0);
        r.heading = Some(350.0);
        records.push(r);
    }
    // airborne, right above the stand
    let mut climb = record(vehicle, offset + 500, 0.0, 80.0);
    climb.altitude = Some(900.0);
    records.push(climb);
    records
}

pub fn airport(vehicles: usize) -> Vec<RawRecord> {
    (0..vehicles)
        .flat_map(|v| departure(&format!("V{v:03}"), v as i64 * 1_000))
        .collect()
}

/// A vehicle sitting still whose speed never drops to the stationary
/// threshold.
pub fn noisy_parked(vehicle: &str, points: usize, interval: i64, speed: f64) -> Vec<RawRecord> {
    (0..points)
        .map(|i| record(vehicle, i as i64 * interval, (i % 3) as f64 * 0.5, speed))
        .collect()
}
