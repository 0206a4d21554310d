//! Cache manager for the workout collection.
//!
//! `WorkoutCache` is the single source of truth for the record collection:
//! it owns the in-memory list and its persisted mirror, publishes a
//! `CacheSnapshot` for display, deduplicates in-flight fetches, and applies
//! optimistic deletes with exact rollback on failure.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, WorkoutApi};
use crate::models::{sort_by_date_desc, Exercise, PerformedExercise, Workout};
use crate::store::KvStore;

/// Workout collection freshness window in seconds (2 minutes).
pub const WORKOUT_TTL_SECS: i64 = 120;

/// Exercise catalog freshness window in seconds (10 minutes); the catalog
/// changes far less often than the workout list.
pub const EXERCISE_TTL_SECS: i64 = 600;

/// Store key for the exercise catalog cache.
const EXERCISES_KEY: &str = "exercises";

/// A cached payload with its capture timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// Fresh means `now - cached_at < ttl`. Clock skew into the future
    /// counts as fresh rather than producing a negative age.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.cached_at < ttl
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes().max(0)
    }
}

/// Human-readable age for status lines ("just now", "5m ago", "2h ago").
pub fn age_display(since: DateTime<Utc>) -> String {
    let minutes = (Utc::now() - since).num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    }
}

/// Error from a cache operation. Clonable because a failed fetch may be
/// observed by every caller sharing the in-flight operation.
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct CacheError(Arc<ApiError>);

impl CacheError {
    pub fn api(&self) -> &ApiError {
        &self.0
    }
}

impl From<Arc<ApiError>> for CacheError {
    fn from(e: Arc<ApiError>) -> Self {
        Self(e)
    }
}

impl From<ApiError> for CacheError {
    fn from(e: ApiError) -> Self {
        Self(Arc::new(e))
    }
}

/// Published view of the cache for display.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub workouts: Vec<Workout>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetched: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct CacheState {
    workouts: Vec<Workout>,
    loading: bool,
    error: Option<String>,
    last_fetched: Option<DateTime<Utc>>,
    /// Barrier for optimistic deletes: ids here are masked out of any list
    /// that arrives while their delete request is still in flight.
    pending_deletes: HashSet<i64>,
}

type SharedFetch = Shared<BoxFuture<'static, Result<(), Arc<ApiError>>>>;

struct CacheInner<A> {
    api: A,
    store: KvStore,
    key: String,
    ttl: Duration,
    state: Mutex<CacheState>,
    in_flight: Mutex<Option<SharedFetch>>,
    detail_in_flight: Mutex<HashMap<i64, SharedFetch>>,
}

/// Read-through, TTL-based cache over the workout list endpoint with
/// optimistic mutation. The collection is mutated only through these
/// operations, keeping displayed and persisted state in lockstep.
pub struct WorkoutCache<A> {
    inner: Arc<CacheInner<A>>,
}

impl<A> Clone for WorkoutCache<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: WorkoutApi> WorkoutCache<A> {
    pub fn new(api: A, store: KvStore, key: String) -> Self {
        Self::with_ttl(api, store, key, Duration::seconds(WORKOUT_TTL_SECS))
    }

    pub fn with_ttl(api: A, store: KvStore, key: String, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                api,
                store,
                key,
                ttl,
                state: Mutex::new(CacheState::default()),
                in_flight: Mutex::new(None),
                detail_in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.inner.state.lock().unwrap();
        CacheSnapshot {
            workouts: state.workouts.clone(),
            loading: state.loading,
            error: state.error.clone(),
            last_fetched: state.last_fetched,
        }
    }

    /// Load the collection. A persisted entry is published synchronously
    /// before any suspension; a fresh entry completes the operation with no
    /// network request. Stale or missing entries trigger a fetch, and the
    /// loading flag is only raised when there was no cache hit to show.
    pub async fn load(&self, force: bool) -> Result<(), CacheError> {
        self.inner.state.lock().unwrap().error = None;

        let mut had_cache = false;
        if !force {
            if let Some(entry) = self.inner.store.get::<CacheEntry<Vec<Workout>>>(&self.inner.key)
            {
                let fresh = entry.is_fresh(self.inner.ttl);
                {
                    let mut state = self.inner.state.lock().unwrap();
                    let mut list = entry.data;
                    sort_by_date_desc(&mut list);
                    list.retain(|w| !state.pending_deletes.contains(&w.id));
                    state.workouts = list;
                    state.last_fetched = Some(entry.cached_at);
                }
                had_cache = true;
                if fresh {
                    debug!(key = %self.inner.key, "Cache fresh, skipping fetch");
                    return Ok(());
                }
            }
        }

        self.do_fetch(!had_cache).await
    }

    /// Force a refetch regardless of freshness.
    pub async fn refresh(&self) -> Result<(), CacheError> {
        self.load(true).await
    }

    /// Optimistically remove a workout. The collection and its persisted
    /// mirror are updated before the delete request is dispatched; a failed
    /// request restores the exact prior collection and propagates the error.
    pub async fn delete(&self, id: i64) -> Result<(), CacheError> {
        let prev;
        let next;
        {
            let mut state = self.inner.state.lock().unwrap();
            state.pending_deletes.insert(id);
            prev = state.workouts.clone();
            state.workouts.retain(|w| w.id != id);
            next = state.workouts.clone();
        }
        self.persist(next);

        match self.inner.api.delete_workout(id).await {
            Ok(()) => {
                self.inner.state.lock().unwrap().pending_deletes.remove(&id);
                // One background resync to confirm server state. The delete
                // itself succeeded, so a resync failure never rolls it back.
                if let Err(e) = self.do_fetch(false).await {
                    warn!(error = %e, "Post-delete resync failed, keeping local state");
                }
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.pending_deletes.remove(&id);
                    state.workouts = prev.clone();
                }
                self.persist(prev);
                Err(e.into())
            }
        }
    }

    /// Merge a newly-created workout, keeping date-descending order.
    pub fn upsert(&self, workout: Workout) {
        let next = {
            let mut state = self.inner.state.lock().unwrap();
            state.workouts.retain(|w| w.id != workout.id);
            state.workouts.push(workout);
            sort_by_date_desc(&mut state.workouts);
            state.workouts.clone()
        };
        self.persist(next);
    }

    /// Fetch one workout's nested exercises and merge them in place.
    /// Already-detailed workouts are skipped; concurrent calls for the same
    /// id share one request.
    pub async fn load_detail(&self, id: i64) -> Result<(), CacheError> {
        {
            let state = self.inner.state.lock().unwrap();
            if let Some(w) = state.workouts.iter().find(|w| w.id == id) {
                if w.has_details() {
                    return Ok(());
                }
            }
        }

        let fetch = {
            let mut map = self.inner.detail_in_flight.lock().unwrap();
            match map.get(&id) {
                Some(fetch) => fetch.clone(),
                None => {
                    let this = self.clone();
                    let fetch: SharedFetch = async move {
                        let result = this.fetch_detail(id).await.map_err(Arc::new);
                        this.inner.detail_in_flight.lock().unwrap().remove(&id);
                        result
                    }
                    .boxed()
                    .shared();
                    map.insert(id, fetch.clone());
                    fetch
                }
            }
        };

        fetch.await.map_err(CacheError::from)
    }

    /// Clear everything for this user: collection, flags, persisted entry.
    pub fn clear(&self) {
        *self.inner.state.lock().unwrap() = CacheState::default();
        if let Err(e) = self.inner.store.remove(&self.inner.key) {
            warn!(error = %e, "Failed to remove cache entry");
        }
    }

    /// Collapse concurrent loads onto one underlying fetch: callers issued
    /// while one is outstanding await the same shared future.
    async fn do_fetch(&self, show_loading: bool) -> Result<(), CacheError> {
        let fetch = {
            let mut slot = self.inner.in_flight.lock().unwrap();
            match slot.as_ref() {
                Some(fetch) => fetch.clone(),
                None => {
                    let this = self.clone();
                    let fetch: SharedFetch = async move {
                        let result = this.fetch_and_publish().await.map_err(Arc::new);
                        *this.inner.in_flight.lock().unwrap() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fetch.clone());
                    fetch
                }
            }
        };

        if show_loading {
            self.inner.state.lock().unwrap().loading = true;
        }
        let result = fetch.await;
        if show_loading {
            self.inner.state.lock().unwrap().loading = false;
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                // Previously displayed data stays untouched.
                self.inner.state.lock().unwrap().error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    async fn fetch_and_publish(&self) -> Result<(), ApiError> {
        let mut list = self.inner.api.list_workouts().await?;
        sort_by_date_desc(&mut list);

        let next = {
            let mut state = self.inner.state.lock().unwrap();
            list.retain(|w| !state.pending_deletes.contains(&w.id));

            // Summaries arrive without nested exercises; keep details that
            // were already merged for unchanged workouts.
            let prev_details: HashMap<i64, Vec<PerformedExercise>> = state
                .workouts
                .iter()
                .filter_map(|w| w.performed_exercises.clone().map(|pe| (w.id, pe)))
                .collect();
            for w in &mut list {
                if w.performed_exercises.is_none() {
                    if let Some(details) = prev_details.get(&w.id) {
                        w.performed_exercises = Some(details.clone());
                    }
                }
            }

            state.workouts = list.clone();
            state.last_fetched = Some(Utc::now());
            state.error = None;
            list
        };
        self.persist(next);
        Ok(())
    }

    async fn fetch_detail(&self, id: i64) -> Result<(), ApiError> {
        let detail = self.inner.api.workout_detail(id).await?;

        let next = {
            let mut state = self.inner.state.lock().unwrap();
            match state.workouts.iter_mut().find(|w| w.id == id) {
                Some(w) => *w = detail,
                // Deleted out from under us; nothing to merge.
                None => return Ok(()),
            }
            state.workouts.clone()
        };
        self.persist(next);
        Ok(())
    }

    /// Mirror the collection to the persistent store. A write failure is
    /// logged, not fatal: the in-memory collection is still authoritative.
    fn persist(&self, workouts: Vec<Workout>) {
        if let Err(e) = self.inner.store.set(&self.inner.key, &CacheEntry::new(workouts)) {
            warn!(key = %self.inner.key, error = %e, "Failed to persist cache entry");
        }
    }
}

/// Read-through TTL cache for the exercise catalog. No optimistic mutation
/// here; the catalog is small and rarely changes.
pub struct ExerciseCache {
    store: KvStore,
    ttl: Duration,
}

impl ExerciseCache {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            ttl: Duration::seconds(EXERCISE_TTL_SECS),
        }
    }

    pub fn load(&self) -> Option<CacheEntry<Vec<Exercise>>> {
        self.store.get(EXERCISES_KEY)
    }

    pub fn is_fresh(&self, entry: &CacheEntry<Vec<Exercise>>) -> bool {
        entry.is_fresh(self.ttl)
    }

    pub fn save(&self, exercises: &[Exercise]) {
        if let Err(e) = self
            .store
            .set(EXERCISES_KEY, &CacheEntry::new(exercises.to_vec()))
        {
            warn!(error = %e, "Failed to persist exercise catalog");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(EXERCISES_KEY) {
            warn!(error = %e, "Failed to remove exercise catalog cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn workout(id: i64, day: u32) -> Workout {
        Workout {
            id,
            name: format!("workout {}", id),
            date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            total_volume: Some(1000.0),
            performed_exercises: None,
        }
    }

    #[derive(Default)]
    struct MockState {
        workouts: Mutex<Vec<Workout>>,
        list_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        detail_calls: AtomicUsize,
        fail_list: AtomicBool,
        fail_delete: AtomicBool,
        list_delay_ms: AtomicUsize,
        delete_delay_ms: AtomicUsize,
    }

    #[derive(Clone, Default)]
    struct MockApi {
        state: Arc<MockState>,
    }

    impl MockApi {
        fn with_workouts(workouts: Vec<Workout>) -> Self {
            let api = Self::default();
            *api.state.workouts.lock().unwrap() = workouts;
            api
        }
    }

    impl WorkoutApi for MockApi {
        async fn list_workouts(&self) -> Result<Vec<Workout>, ApiError> {
            self.state.list_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.state.list_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
            }
            if self.state.fail_list.load(Ordering::SeqCst) {
                return Err(ApiError::ServerError("mock outage".into()));
            }
            Ok(self.state.workouts.lock().unwrap().clone())
        }

        async fn workout_detail(&self, id: i64) -> Result<Workout, ApiError> {
            self.state.detail_calls.fetch_add(1, Ordering::SeqCst);
            let mut detail = self
                .state
                .workouts
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("workout {}", id)))?;
            detail.performed_exercises = Some(vec![PerformedExercise {
                id: Some(1),
                exercise: 1,
                exercise_name: Some("Squat".into()),
                muscle_group: None,
                sets: 1,
                reps_per_set: vec![5],
                weights_per_set: Some(vec![100.0]),
            }]);
            Ok(detail)
        }

        async fn delete_workout(&self, id: i64) -> Result<(), ApiError> {
            self.state.delete_calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.state.delete_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
            }
            if self.state.fail_delete.load(Ordering::SeqCst) {
                return Err(ApiError::ServerError("mock outage".into()));
            }
            self.state.workouts.lock().unwrap().retain(|w| w.id != id);
            Ok(())
        }
    }

    fn cache_with(api: MockApi) -> (tempfile::TempDir, WorkoutCache<MockApi>) {
        let dir = tempfile::tempdir().unwrap();
        let store = KvStore::new(dir.path().to_path_buf()).unwrap();
        let cache = WorkoutCache::new(api, store, "workouts_user_test".into());
        (dir, cache)
    }

    fn seed_entry(cache: &WorkoutCache<MockApi>, workouts: Vec<Workout>, age_secs: i64) {
        let entry = CacheEntry {
            data: workouts,
            cached_at: Utc::now() - Duration::seconds(age_secs),
        };
        cache.inner.store.set(&cache.inner.key, &entry).unwrap();
    }

    #[tokio::test]
    async fn fresh_cache_skips_network_and_loading_stays_false() {
        let api = MockApi::default();
        let (_dir, cache) = cache_with(api.clone());
        // 90s old with a 120s TTL: fresh
        seed_entry(&cache, vec![workout(1, 10), workout(2, 12)], 90);

        cache.load(false).await.unwrap();

        let snap = cache.snapshot();
        assert_eq!(api.state.list_calls.load(Ordering::SeqCst), 0);
        assert!(!snap.loading);
        assert_eq!(snap.workouts.len(), 2);
        // newest first
        assert_eq!(snap.workouts[0].id, 2);
    }

    #[tokio::test]
    async fn stale_cache_publishes_then_revalidates() {
        let api = MockApi::with_workouts(vec![workout(1, 10), workout(3, 14)]);
        let (_dir, cache) = cache_with(api.clone());
        seed_entry(&cache, vec![workout(1, 10)], 600);

        cache.load(false).await.unwrap();

        let snap = cache.snapshot();
        assert_eq!(api.state.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(snap.workouts.len(), 2);
        assert_eq!(snap.workouts[0].id, 3);
    }

    #[tokio::test]
    async fn concurrent_loads_share_one_fetch() {
        let api = MockApi::with_workouts(vec![workout(1, 10)]);
        api.state.list_delay_ms.store(30, Ordering::SeqCst);
        let (_dir, cache) = cache_with(api.clone());

        let (a, b, c) = tokio::join!(cache.load(false), cache.load(false), cache.load(false));
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(api.state.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.snapshot().workouts.len(), 1);
    }

    #[tokio::test]
    async fn load_failure_keeps_previous_data() {
        let api = MockApi::default();
        let (_dir, cache) = cache_with(api.clone());
        seed_entry(&cache, vec![workout(1, 10)], 600);
        api.state.fail_list.store(true, Ordering::SeqCst);

        let result = cache.load(false).await;

        assert!(result.is_err());
        let snap = cache.snapshot();
        assert_eq!(snap.workouts.len(), 1);
        assert!(snap.error.is_some());
    }

    #[tokio::test]
    async fn delete_is_applied_before_the_request_settles() {
        let api = MockApi::with_workouts(vec![workout(1, 10), workout(2, 12)]);
        api.state.delete_delay_ms.store(50, Ordering::SeqCst);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();

        let handle = tokio::spawn({
            let cache = cache.clone();
            async move { cache.delete(1).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // Published collection already reflects the delete
        let snap = cache.snapshot();
        assert_eq!(snap.workouts.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2]);

        handle.await.unwrap().unwrap();
        assert_eq!(cache.snapshot().workouts.len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_rolls_back_exactly() {
        let api = MockApi::with_workouts(vec![workout(1, 10), workout(2, 12)]);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();
        let before = cache.snapshot().workouts;

        api.state.fail_delete.store(true, Ordering::SeqCst);
        let result = cache.delete(1).await;

        assert!(result.is_err());
        let after = cache.snapshot().workouts;
        assert_eq!(
            after.iter().map(|w| w.id).collect::<Vec<_>>(),
            before.iter().map(|w| w.id).collect::<Vec<_>>()
        );
        // Persisted mirror rolled back too
        let entry: CacheEntry<Vec<Workout>> = cache.inner.store.get(&cache.inner.key).unwrap();
        assert_eq!(entry.data.len(), 2);
    }

    #[tokio::test]
    async fn successful_delete_resyncs_with_server() {
        let api = MockApi::with_workouts(vec![workout(1, 10), workout(2, 12)]);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();

        cache.delete(2).await.unwrap();

        assert_eq!(api.state.delete_calls.load(Ordering::SeqCst), 1);
        // initial load + post-delete resync
        assert_eq!(api.state.list_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.snapshot().workouts.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn clear_empties_collection_and_store() {
        let api = MockApi::with_workouts(vec![workout(1, 10)]);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();

        cache.clear();

        assert!(cache.snapshot().workouts.is_empty());
        assert!(cache
            .inner
            .store
            .get::<CacheEntry<Vec<Workout>>>(&cache.inner.key)
            .is_none());
    }

    #[tokio::test]
    async fn detail_merge_survives_revalidation() {
        let api = MockApi::with_workouts(vec![workout(1, 10), workout(2, 12)]);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();

        cache.load_detail(1).await.unwrap();
        assert!(cache
            .snapshot()
            .workouts
            .iter()
            .find(|w| w.id == 1)
            .unwrap()
            .has_details());

        // A later summary fetch keeps the merged details
        cache.refresh().await.unwrap();
        assert!(cache
            .snapshot()
            .workouts
            .iter()
            .find(|w| w.id == 1)
            .unwrap()
            .has_details());

        // Second detail load is a no-op
        cache.load_detail(1).await.unwrap();
        assert_eq!(api.state.detail_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upsert_keeps_date_order() {
        let api = MockApi::with_workouts(vec![workout(1, 10)]);
        let (_dir, cache) = cache_with(api.clone());
        cache.load(true).await.unwrap();

        cache.upsert(workout(9, 20));
        cache.upsert(workout(8, 5));

        let ids: Vec<i64> = cache.snapshot().workouts.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![9, 1, 8]);
    }

    #[test]
    fn entry_freshness() {
        let fresh = CacheEntry::new(vec![1]);
        assert!(fresh.is_fresh(Duration::seconds(WORKOUT_TTL_SECS)));

        let stale = CacheEntry {
            data: vec![1],
            cached_at: Utc::now() - Duration::seconds(WORKOUT_TTL_SECS + 1),
        };
        assert!(!stale.is_fresh(Duration::seconds(WORKOUT_TTL_SECS)));
    }

    #[test]
    fn age_display_buckets() {
        assert_eq!(age_display(Utc::now()), "just now");
        assert_eq!(age_display(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(age_display(Utc::now() - Duration::hours(3)), "3h ago");
        assert_eq!(age_display(Utc::now() - Duration::days(2)), "2d ago");
    }

}
