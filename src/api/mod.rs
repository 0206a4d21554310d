//! REST API client module for the workout-tracking service.
//!
//! This module provides the `ApiClient` for authenticating and fetching
//! workout, exercise, and analytics data, plus the `WorkoutApi` seam the
//! cache manager consumes so tests can substitute a mock source.
//!
//! The API uses JWT bearer authentication with a refresh-token exchange
//! on access-token expiry.

pub mod client;
pub mod error;

use std::future::Future;

use crate::models::Workout;

pub use client::ApiClient;
pub use error::ApiError;

/// Data source for the workout cache. `ApiClient` is the production
/// implementation; tests inject their own.
pub trait WorkoutApi: Send + Sync + 'static {
    fn list_workouts(&self) -> impl Future<Output = Result<Vec<Workout>, ApiError>> + Send;
    fn workout_detail(&self, id: i64) -> impl Future<Output = Result<Workout, ApiError>> + Send;
    fn delete_workout(&self, id: i64) -> impl Future<Output = Result<(), ApiError>> + Send;
}
