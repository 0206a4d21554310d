use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::MuscleGroup;

/// A logged training session.
///
/// List endpoints return summaries without `performed_exercises`; the field
/// stays `None` until the detail for that workout has been fetched and
/// merged. `total_volume` is a server-side denormalization and may be absent
/// on older records, in which case `volume()` recomputes it from the sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_exercises: Option<Vec<PerformedExercise>>,
}

impl Workout {
    /// Total volume for the workout: sum over sets of reps x weight.
    /// Falls back to the server-provided aggregate when details are absent.
    pub fn volume(&self) -> f64 {
        match &self.performed_exercises {
            Some(entries) => entries.iter().map(PerformedExercise::volume).sum(),
            None => self.total_volume.unwrap_or(0.0),
        }
    }

    pub fn has_details(&self) -> bool {
        self.performed_exercises.is_some()
    }
}

/// One exercise performed within a workout, with per-set reps and weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformedExercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Catalog exercise id.
    pub exercise: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muscle_group: Option<MuscleGroup>,
    pub sets: u32,
    pub reps_per_set: Vec<u32>,
    /// Absent for bodyweight work; missing weights count as zero volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_per_set: Option<Vec<f64>>,
}

impl PerformedExercise {
    /// Volume contributed by this entry. Server data is not re-validated
    /// here: reps and weights are zipped, short weight lists pad with zero.
    pub fn volume(&self) -> f64 {
        let weights = self.weights_per_set.as_deref().unwrap_or(&[]);
        self.reps_per_set
            .iter()
            .enumerate()
            .map(|(i, &reps)| f64::from(reps) * weights.get(i).copied().unwrap_or(0.0))
            .sum()
    }
}

/// Validation failures for workout-creation payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("an exercise needs at least one set")]
    NoSets,
    #[error("reps were logged for {got} sets but the exercise has {expected}")]
    RepsMismatch { expected: u32, got: usize },
    #[error("weights were logged for {got} sets but the exercise has {expected}")]
    WeightsMismatch { expected: u32, got: usize },
    #[error("a workout needs at least one exercise")]
    NoExercises,
}

/// Creation payload for one performed exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPerformedExercise {
    pub exercise: i64,
    pub sets: u32,
    pub reps_per_set: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_per_set: Option<Vec<f64>>,
}

impl NewPerformedExercise {
    /// `sets` must match the per-set list lengths. Enforced at every entry
    /// point so a malformed entry never reaches the wire.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sets == 0 {
            return Err(ValidationError::NoSets);
        }
        if self.reps_per_set.len() != self.sets as usize {
            return Err(ValidationError::RepsMismatch {
                expected: self.sets,
                got: self.reps_per_set.len(),
            });
        }
        if let Some(weights) = &self.weights_per_set {
            if weights.len() != self.sets as usize {
                return Err(ValidationError::WeightsMismatch {
                    expected: self.sets,
                    got: weights.len(),
                });
            }
        }
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        let weights = self.weights_per_set.as_deref().unwrap_or(&[]);
        self.reps_per_set
            .iter()
            .enumerate()
            .map(|(i, &reps)| f64::from(reps) * weights.get(i).copied().unwrap_or(0.0))
            .sum()
    }
}

/// Creation payload for a workout.
#[derive(Debug, Clone, Serialize)]
pub struct NewWorkout {
    pub date: NaiveDate,
    pub name: String,
    pub total_volume: f64,
    pub performed_exercises: Vec<NewPerformedExercise>,
}

impl NewWorkout {
    pub fn new(date: NaiveDate, name: String, exercises: Vec<NewPerformedExercise>) -> Self {
        let total_volume = exercises.iter().map(NewPerformedExercise::volume).sum();
        Self {
            date,
            name,
            total_volume,
            performed_exercises: exercises,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.performed_exercises.is_empty() {
            return Err(ValidationError::NoExercises);
        }
        for entry in &self.performed_exercises {
            entry.validate()?;
        }
        Ok(())
    }
}

/// Sort a collection newest-first, the display order everywhere.
pub fn sort_by_date_desc(workouts: &mut [Workout]) {
    workouts.sort_by(|a, b| b.date.cmp(&a.date));
}
