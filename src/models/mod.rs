//! Data models for workout-tracking entities.
//!
//! This module contains all the data structures used to represent
//! workout data including:
//!
//! - `Workout`, `PerformedExercise`: logged sessions with per-set data
//! - `Exercise`, `MuscleGroup`: the exercise catalog
//! - `NewWorkout`, `NewPerformedExercise`, `WorkoutDraft`: creation flow
//! - Analytics types: `WeeklyVolume`, `WeeklyFrequency`, `TopWorkout`

pub mod analytics;
pub mod draft;
pub mod exercise;
pub mod workout;

pub use analytics::{
    TopWorkout, TopWorkoutsResponse, WeeklyFrequency, WeeklyFrequencyResponse, WeeklyVolume,
    WeeklyVolumeResponse,
};
pub use draft::{WorkoutDraft, REST_TIMER_KEY, WORKOUT_DRAFT_KEY};
pub use exercise::{Exercise, MuscleGroup, NewExercise};
pub use workout::{
    sort_by_date_desc, NewPerformedExercise, NewWorkout, PerformedExercise, ValidationError,
    Workout,
};
