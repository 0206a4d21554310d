//! Wire types for the server-side analytics endpoints.
//!
//! Field names are camelCase on the wire (the server formats them for its
//! charting clients); renames keep the Rust side snake_case.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyVolume {
    /// ISO week key, e.g. "2026-W34".
    pub week: String,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
    #[serde(rename = "avgVolumePerWorkout")]
    pub avg_volume_per_workout: f64,
    #[serde(rename = "workoutCount")]
    pub workout_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyVolumeResponse {
    pub weekly_volumes: Vec<WeeklyVolume>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyFrequency {
    pub week: String,
    #[serde(rename = "workoutCount")]
    pub workout_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklyFrequencyResponse {
    pub weekly_frequency: Vec<WeeklyFrequency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopWorkout {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    #[serde(rename = "totalVolume")]
    pub total_volume: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopWorkoutsResponse {
    pub top_workouts: Vec<TopWorkout>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekly_volume_wire_format() {
        let json = r#"{
            "weekly_volumes": [
                {"week": "2026-W33", "totalVolume": 12000.0, "avgVolumePerWorkout": 4000.0, "workoutCount": 3}
            ]
        }"#;
        let resp: WeeklyVolumeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.weekly_volumes.len(), 1);
        assert_eq!(resp.weekly_volumes[0].workout_count, 3);
        assert_eq!(resp.weekly_volumes[0].avg_volume_per_workout, 4000.0);
    }

    #[test]
    fn weekly_frequency_wire_format() {
        let json = r#"{"weekly_frequency": [{"week": "2026-W34", "workoutCount": 2}]}"#;
        let resp: WeeklyFrequencyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.weekly_frequency[0].week, "2026-W34");
    }
}
