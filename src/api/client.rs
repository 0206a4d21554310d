//! API client for the workout-tracking REST service.
//!
//! All data requests carry the session's access token as a bearer
//! credential. A 401 triggers a single coordinated refresh-token exchange:
//! concurrent failures queue behind the in-flight refresh and replay in the
//! order they arrived, each at most once.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::models::{
    Exercise, NewExercise, NewWorkout, TopWorkout, TopWorkoutsResponse, WeeklyFrequency,
    WeeklyFrequencyResponse, WeeklyVolume, WeeklyVolumeResponse, Workout,
};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct TokenPairResponse {
    access: String,
    refresh: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// Refresh coordination state, owned by the client instance.
///
/// While a refresh is in flight, requests that hit a 401 park a oneshot
/// sender here instead of starting a second exchange. The leader releases
/// them in arrival order when the exchange settles.
enum RefreshPhase {
    Idle,
    Refreshing(Vec<oneshot::Sender<Result<String, RefreshFailed>>>),
}

#[derive(Debug, Clone, Copy)]
struct RefreshFailed;

enum RefreshRole {
    Leader,
    Follower(oneshot::Receiver<Result<String, RefreshFailed>>),
}

/// API client for the workout service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresh: Arc<Mutex<RefreshPhase>>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            refresh: Arc::new(Mutex::new(RefreshPhase::Idle)),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.http.request(method.clone(), self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Send a request with the current access token, transparently
    /// recovering from access-token expiry. A request is replayed at most
    /// once: a second 401 propagates as a final failure.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self.session.access_token();
        let response = self
            .send_once(&method, path, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        // Nothing to exchange: surface the 401 as-is.
        if self.session.refresh_token().is_none() {
            return Err(ApiError::Unauthorized);
        }

        debug!(path, "Access token rejected, refreshing");
        let new_token = self.refresh_access_token().await?;

        let response = self
            .send_once(&method, path, body.as_ref(), Some(&new_token))
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Self::check_response(response).await
    }

    /// Exchange the refresh token for a new access token, coordinating so
    /// that at most one exchange is in flight. Followers wait for the
    /// leader's result; on failure everyone gets `SessionExpired` and the
    /// stored tokens are destroyed.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let role = {
            let mut phase = self.refresh.lock().unwrap();
            match &mut *phase {
                RefreshPhase::Refreshing(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    RefreshRole::Follower(rx)
                }
                RefreshPhase::Idle => {
                    *phase = RefreshPhase::Refreshing(Vec::new());
                    RefreshRole::Leader
                }
            }
        };

        match role {
            RefreshRole::Follower(rx) => match rx.await {
                Ok(Ok(token)) => Ok(token),
                Ok(Err(RefreshFailed)) | Err(_) => Err(ApiError::SessionExpired),
            },
            RefreshRole::Leader => {
                let outcome = self.exchange_refresh_token().await;

                let waiters = {
                    let mut phase = self.refresh.lock().unwrap();
                    match std::mem::replace(&mut *phase, RefreshPhase::Idle) {
                        RefreshPhase::Refreshing(waiters) => waiters,
                        RefreshPhase::Idle => Vec::new(),
                    }
                };

                match outcome {
                    Ok(token) => {
                        if let Err(e) = self.session.rotate_access(token.clone()) {
                            warn!(error = %e, "Failed to persist rotated access token");
                        }
                        for tx in waiters {
                            let _ = tx.send(Ok(token.clone()));
                        }
                        Ok(token)
                    }
                    Err(e) => {
                        warn!(error = %e, "Token refresh failed, clearing session");
                        if let Err(e) = self.session.sign_out() {
                            warn!(error = %e, "Failed to clear session");
                        }
                        for tx in waiters {
                            let _ = tx.send(Err(RefreshFailed));
                        }
                        Err(ApiError::SessionExpired)
                    }
                }
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<String, ApiError> {
        let refresh = self
            .session
            .refresh_token()
            .ok_or(ApiError::SessionExpired)?;

        let response = self
            .http
            .post(self.url("login/refresh/"))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Refresh exchange rejected");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::SessionExpired,
                _ => ApiError::from_status(status, &body),
            });
        }

        let parsed: RefreshResponse = response.json().await?;
        Ok(parsed.access)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode body: {}", e)))?;
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    // ===== Authentication =====

    /// Authenticate and store the resulting token pair in the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("login/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::BadCredentials);
        }
        let response = Self::check_response(response).await?;

        let tokens: TokenPairResponse = response.json().await?;
        self.session
            .sign_in(username.to_string(), tokens.access, tokens.refresh)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Create an account, then log in with the same credentials.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("register/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        Self::check_response(response).await?;

        self.login(username, password).await
    }

    // ===== Workouts =====

    pub async fn list_workouts(&self) -> Result<Vec<Workout>, ApiError> {
        self.get_json("workouts/").await
    }

    pub async fn workout_detail(&self, id: i64) -> Result<Workout, ApiError> {
        self.get_json(&format!("workouts/{}/", id)).await
    }

    pub async fn create_workout(&self, workout: &NewWorkout) -> Result<Workout, ApiError> {
        self.post_json("workouts/", workout).await
    }

    pub async fn delete_workout(&self, id: i64) -> Result<(), ApiError> {
        self.execute(Method::DELETE, &format!("workouts/{}/", id), None)
            .await?;
        Ok(())
    }

    // ===== Exercise catalog =====

    pub async fn list_exercises(&self) -> Result<Vec<Exercise>, ApiError> {
        self.get_json("exercises/").await
    }

    pub async fn create_exercise(&self, exercise: &NewExercise) -> Result<Exercise, ApiError> {
        self.post_json("exercises/", exercise).await
    }

    // ===== Analytics =====

    pub async fn weekly_volume(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<WeeklyVolume>, ApiError> {
        let mut path = String::from("analytics/weekly-volume/");
        let mut sep = '?';
        if let Some(start) = start_date {
            path.push_str(&format!("{}start_date={}", sep, start));
            sep = '&';
        }
        if let Some(end) = end_date {
            path.push_str(&format!("{}end_date={}", sep, end));
        }
        let response: WeeklyVolumeResponse = self.get_json(&path).await?;
        Ok(response.weekly_volumes)
    }

    pub async fn weekly_frequency(&self) -> Result<Vec<WeeklyFrequency>, ApiError> {
        let response: WeeklyFrequencyResponse =
            self.get_json("analytics/weekly-frequency/").await?;
        Ok(response.weekly_frequency)
    }

    pub async fn top_workouts(&self) -> Result<Vec<TopWorkout>, ApiError> {
        let response: TopWorkoutsResponse = self.get_json("analytics/top-workouts/").await?;
        Ok(response.top_workouts)
    }
}

impl super::WorkoutApi for ApiClient {
    async fn list_workouts(&self) -> Result<Vec<Workout>, ApiError> {
        ApiClient::list_workouts(self).await
    }

    async fn workout_detail(&self, id: i64) -> Result<Workout, ApiError> {
        ApiClient::workout_detail(self, id).await
    }

    async fn delete_workout(&self, id: i64) -> Result<(), ApiError> {
        ApiClient::delete_workout(self, id).await
    }
}
