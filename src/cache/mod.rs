//! Caching layer for API responses.
//!
//! The workout collection is cached with a short TTL and mutated
//! optimistically; the exercise catalog is a plain read-through cache with
//! a longer TTL. Both persist through [`crate::store::KvStore`] so a cold
//! start shows data before the first request completes.

pub mod manager;

pub use manager::{
    age_display, CacheEntry, CacheError, CacheSnapshot, ExerciseCache, WorkoutCache,
    EXERCISE_TTL_SECS, WORKOUT_TTL_SECS,
};
