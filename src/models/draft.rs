//! In-progress workout state, persisted between CLI invocations.
//!
//! A draft is built up one exercise at a time (`log add`), survives process
//! restarts through the key-value store, and is only turned into a
//! `NewWorkout` once it validates.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{NewPerformedExercise, NewWorkout, ValidationError};

/// Store key for the in-progress workout draft.
pub const WORKOUT_DRAFT_KEY: &str = "workout_draft";
/// Store key for the rest-timer start timestamp (unix millis).
pub const REST_TIMER_KEY: &str = "rest_timer_start";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkoutDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub exercises: Vec<NewPerformedExercise>,
}

impl WorkoutDraft {
    /// Add a validated exercise entry. Invalid entries never enter the draft.
    pub fn add_exercise(&mut self, entry: NewPerformedExercise) -> Result<(), ValidationError> {
        entry.validate()?;
        self.exercises.push(entry);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn total_volume(&self) -> f64 {
        self.exercises.iter().map(NewPerformedExercise::volume).sum()
    }

    /// Finalize into a creation payload. Defaults: today's date, a generic
    /// name. Fails when no exercises were logged.
    pub fn finish(self, name: Option<String>) -> Result<NewWorkout, ValidationError> {
        let date = self.date.unwrap_or_else(|| Utc::now().date_naive());
        let name = name
            .or(self.name)
            .unwrap_or_else(|| "Untitled Workout".to_string());
        let workout = NewWorkout::new(date, name, self.exercises);
        workout.validate()?;
        Ok(workout)
    }
}
