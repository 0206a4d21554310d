//! Application layer: wires config, store, session, client, and caches
//! together, and implements the CLI commands on top of them.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::analytics;
use crate::api::{ApiClient, ApiError, WorkoutApi};
use crate::auth::{CredentialStore, SessionStore};
use crate::cache::{age_display, CacheError, CacheSnapshot, ExerciseCache, WorkoutCache};
use crate::config::Config;
use crate::models::{
    Exercise, MuscleGroup, NewExercise, NewPerformedExercise, WorkoutDraft, REST_TIMER_KEY,
    WORKOUT_DRAFT_KEY,
};
use crate::store::KvStore;
use crate::utils::format::{format_date, format_volume, parse_reps, parse_weights};

pub struct App {
    config: Config,
    store: KvStore,
    session: Arc<SessionStore>,
    api: ApiClient,
    workouts: WorkoutCache<ApiClient>,
    exercises: ExerciseCache,
}

impl App {
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let store = KvStore::new(crate::config::cache_dir()?)?;
        let session = Arc::new(SessionStore::load(store.clone()));
        let api = ApiClient::new(&config.api_base_url(), Arc::clone(&session))?;
        let workouts = WorkoutCache::new(api.clone(), store.clone(), session.cache_key());
        let exercises = ExerciseCache::new(store.clone());

        Ok(Self {
            config,
            store,
            session,
            api,
            workouts,
            exercises,
        })
    }

    fn require_auth(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            bail!("Not signed in. Run `setcache login <username>` first.");
        }
        Ok(())
    }

    // ===== Authentication =====

    pub async fn login(&mut self, username: Option<&str>, remember: bool) -> Result<()> {
        let username = match username {
            Some(u) => u.to_string(),
            None => match std::env::var("SETCACHE_USERNAME") {
                Ok(u) if !u.is_empty() => u,
                _ => prompt_line("Username", self.config.last_username.as_deref())?,
            },
        };

        let password = match std::env::var("SETCACHE_PASSWORD") {
            Ok(p) if !p.is_empty() => p,
            _ => match CredentialStore::remembered(&username) {
                Some(p) => {
                    debug!(%username, "Using remembered password");
                    p
                }
                None => rpassword::prompt_password("Password: ")
                    .context("Failed to read password")?,
            },
        };

        self.api.login(&username, &password).await?;

        if remember {
            if let Err(e) = CredentialStore::remember(&username, &password) {
                warn!(error = %e, "Could not store password in keychain");
            }
        }
        self.config.last_username = Some(username.clone());
        self.config.save()?;

        // The collection cache is keyed per user
        self.workouts =
            WorkoutCache::new(self.api.clone(), self.store.clone(), self.session.cache_key());

        println!("Signed in as {}", username);
        Ok(())
    }

    pub async fn register(&mut self, username: &str) -> Result<()> {
        let password =
            rpassword::prompt_password("Choose a password: ").context("Failed to read password")?;
        let confirm =
            rpassword::prompt_password("Confirm password: ").context("Failed to read password")?;
        if password != confirm {
            bail!("Passwords do not match");
        }

        self.api.register(username, &password).await?;
        self.config.last_username = Some(username.to_string());
        self.config.save()?;
        self.workouts =
            WorkoutCache::new(self.api.clone(), self.store.clone(), self.session.cache_key());

        println!("Account created; signed in as {}", username);
        Ok(())
    }

    pub fn logout(&self) -> Result<()> {
        let username = self.session.username();
        self.workouts.clear();
        self.exercises.clear();
        self.store.remove(WORKOUT_DRAFT_KEY)?;
        self.store.remove(REST_TIMER_KEY)?;
        self.session.sign_out()?;

        if let Some(username) = username {
            if let Err(e) = CredentialStore::forget(&username) {
                warn!(error = %e, "Could not remove remembered password");
            }
            println!("Signed out {}", username);
        } else {
            println!("Already signed out");
        }
        Ok(())
    }

    // ===== Workouts =====

    pub async fn list(&self, refresh: bool) -> Result<()> {
        self.require_auth()?;
        let snap = load_for_display(&self.workouts, refresh).await?;
        if let Some(err) = &snap.error {
            warn!("Showing cached data; refresh failed: {}", err);
        }
        if snap.workouts.is_empty() {
            println!("No workouts logged yet.");
            return Ok(());
        }

        println!("{:<6} {:<14} {:<28} {:>12}", "ID", "DATE", "NAME", "VOLUME");
        for w in &snap.workouts {
            println!(
                "{:<6} {:<14} {:<28} {:>12}",
                w.id,
                format_date(w.date),
                truncate(&w.name, 28),
                format_volume(w.volume())
            );
        }
        if let Some(fetched) = snap.last_fetched {
            println!("\n{} workouts, synced {}", snap.workouts.len(), age_display(fetched));
        }
        Ok(())
    }

    pub async fn show(&self, id: i64) -> Result<()> {
        self.require_auth()?;
        self.workouts.load(false).await?;
        self.workouts.load_detail(id).await?;

        let snap = self.workouts.snapshot();
        let workout = snap
            .workouts
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| anyhow!("No workout with id {}", id))?;

        println!("{} - {}", workout.name, format_date(workout.date));
        println!("Total volume: {}", format_volume(workout.volume()));
        if let Some(entries) = &workout.performed_exercises {
            for entry in entries {
                let name = entry
                    .exercise_name
                    .clone()
                    .unwrap_or_else(|| format!("exercise #{}", entry.exercise));
                let reps: Vec<String> = entry.reps_per_set.iter().map(u32::to_string).collect();
                let weights = entry
                    .weights_per_set
                    .as_ref()
                    .map(|ws| {
                        ws.iter()
                            .map(|w| format!("{}", w))
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_else(|| "bodyweight".to_string());
                println!(
                    "  {} - {} sets, reps {}, weights {} (volume {})",
                    name,
                    entry.sets,
                    reps.join(","),
                    weights,
                    format_volume(entry.volume())
                );
            }
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        self.require_auth()?;
        // Seed the collection so the optimistic removal has something to act on
        self.workouts.load(false).await?;
        self.workouts.delete(id).await?;
        println!("Deleted workout {}", id);
        Ok(())
    }

    // ===== Exercise catalog =====

    /// Read-through with fallback: a failed refresh falls back to whatever
    /// catalog is cached, however stale.
    async fn load_exercises(&self, refresh: bool) -> Result<Vec<Exercise>> {
        let cached = self.exercises.load();
        if !refresh {
            if let Some(entry) = &cached {
                if self.exercises.is_fresh(entry) {
                    return Ok(entry.data.clone());
                }
            }
        }

        match self.api.list_exercises().await {
            Ok(list) => {
                self.exercises.save(&list);
                Ok(list)
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!(error = %e, "Catalog refresh failed, using cached copy");
                    Ok(entry.data)
                }
                None => Err(e.into()),
            },
        }
    }

    pub async fn exercises(&self, refresh: bool) -> Result<()> {
        self.require_auth()?;
        let mut list = self.load_exercises(refresh).await?;
        list.sort_by(|a, b| (a.muscle_group, &a.name).cmp(&(b.muscle_group, &b.name)));

        println!("{:<6} {:<12} NAME", "ID", "GROUP");
        for exercise in &list {
            println!(
                "{:<6} {:<12} {}",
                exercise.id, exercise.muscle_group, exercise.name
            );
        }
        Ok(())
    }

    pub async fn add_exercise(&self, name: &str, group: &str) -> Result<()> {
        self.require_auth()?;
        let muscle_group: MuscleGroup = serde_json::from_value(serde_json::Value::String(
            group.to_lowercase(),
        ))
        .map_err(|_| {
            anyhow!(
                "Unknown muscle group '{}' (expected one of: chest, back, shoulders, arms, legs, core)",
                group
            )
        })?;

        let created = self
            .api
            .create_exercise(&NewExercise {
                name: name.to_string(),
                description: None,
                muscle_group,
            })
            .await?;

        // Invalidate so the next catalog read picks up the new entry
        self.exercises.clear();
        println!("Created exercise {} (id {})", created.name, created.id);
        Ok(())
    }

    // ===== Workout logging =====

    fn draft(&self) -> WorkoutDraft {
        self.store.get(WORKOUT_DRAFT_KEY).unwrap_or_default()
    }

    pub async fn log_add(&self, exercise_id: i64, reps: &str, weights: Option<&str>) -> Result<()> {
        self.require_auth()?;
        let reps_per_set = parse_reps(reps).map_err(|e| anyhow!(e))?;
        let weights_per_set = weights
            .map(|w| parse_weights(w).map_err(|e| anyhow!(e)))
            .transpose()?;

        let entry = NewPerformedExercise {
            exercise: exercise_id,
            sets: reps_per_set.len() as u32,
            reps_per_set,
            weights_per_set,
        };

        let mut draft = self.draft();
        draft.add_exercise(entry)?;
        self.store.set(WORKOUT_DRAFT_KEY, &draft)?;
        println!(
            "Added. Draft now has {} exercises, volume {}",
            draft.exercises.len(),
            format_volume(draft.total_volume())
        );
        Ok(())
    }

    pub fn log_status(&self) -> Result<()> {
        let draft = self.draft();
        if draft.is_empty() {
            println!("No workout in progress.");
            return Ok(());
        }
        println!(
            "Workout in progress: {} exercises, volume {}",
            draft.exercises.len(),
            format_volume(draft.total_volume())
        );
        for entry in &draft.exercises {
            println!(
                "  exercise #{}: {} sets (volume {})",
                entry.exercise,
                entry.sets,
                format_volume(entry.volume())
            );
        }
        Ok(())
    }

    pub fn log_cancel(&self) -> Result<()> {
        self.store.remove(WORKOUT_DRAFT_KEY)?;
        println!("Draft discarded.");
        Ok(())
    }

    pub async fn log_finish(&self, name: Option<&str>) -> Result<()> {
        self.require_auth()?;
        let draft = self.draft();
        let workout = draft.finish(name.map(str::to_string))?;

        let created = self.api.create_workout(&workout).await?;
        self.workouts.upsert(created.clone());
        self.store.remove(WORKOUT_DRAFT_KEY)?;
        self.store.remove(REST_TIMER_KEY)?;

        println!(
            "Logged '{}' on {} (volume {})",
            created.name,
            format_date(created.date),
            format_volume(created.volume())
        );
        Ok(())
    }

    // ===== Rest timer =====

    pub fn timer_start(&self) -> Result<()> {
        self.store.set(REST_TIMER_KEY, &Utc::now())?;
        println!("Rest timer started.");
        Ok(())
    }

    pub fn timer_show(&self) -> Result<()> {
        match self.store.get::<DateTime<Utc>>(REST_TIMER_KEY) {
            Some(started) => {
                let elapsed = (Utc::now() - started).num_seconds().max(0);
                println!("Resting for {}m {}s", elapsed / 60, elapsed % 60);
            }
            None => println!("No rest timer running."),
        }
        Ok(())
    }

    pub fn timer_clear(&self) -> Result<()> {
        self.store.remove(REST_TIMER_KEY)?;
        println!("Rest timer cleared.");
        Ok(())
    }

    // ===== Analytics =====

    /// Server-side aggregates when reachable, local computation over the
    /// cached collection otherwise.
    pub async fn stats_volume(&self) -> Result<()> {
        self.require_auth()?;
        let rows = match self.api.weekly_volume(None, None).await {
            Ok(rows) => rows,
            Err(e) if is_offline(&e) => {
                warn!(error = %e, "Analytics endpoint unreachable, computing locally");
                self.workouts.load(false).await.ok();
                analytics::weekly_volume(&self.workouts.snapshot().workouts)
            }
            Err(e) => return Err(e.into()),
        };

        println!("{:<10} {:>12} {:>10} {:>8}", "WEEK", "VOLUME", "AVG", "COUNT");
        for row in rows {
            println!(
                "{:<10} {:>12} {:>10} {:>8}",
                row.week,
                format_volume(row.total_volume),
                format_volume(row.avg_volume_per_workout),
                row.workout_count
            );
        }
        Ok(())
    }

    pub async fn stats_frequency(&self) -> Result<()> {
        self.require_auth()?;
        let rows = match self.api.weekly_frequency().await {
            Ok(rows) => rows,
            Err(e) if is_offline(&e) => {
                warn!(error = %e, "Analytics endpoint unreachable, computing locally");
                self.workouts.load(false).await.ok();
                analytics::weekly_frequency(&self.workouts.snapshot().workouts)
            }
            Err(e) => return Err(e.into()),
        };

        println!("{:<10} {:>8}", "WEEK", "COUNT");
        for row in rows {
            println!("{:<10} {:>8}", row.week, row.workout_count);
        }
        Ok(())
    }

    pub async fn stats_top(&self, count: usize) -> Result<()> {
        self.require_auth()?;
        match self.api.top_workouts().await {
            Ok(rows) => {
                for (i, w) in rows.iter().take(count).enumerate() {
                    println!(
                        "{}. {} ({}) - {}",
                        i + 1,
                        w.name,
                        format_date(w.date),
                        format_volume(w.total_volume)
                    );
                }
            }
            Err(e) if is_offline(&e) => {
                warn!(error = %e, "Analytics endpoint unreachable, computing locally");
                self.workouts.load(false).await.ok();
                let snap = self.workouts.snapshot();
                for (i, w) in analytics::top_workouts(&snap.workouts, count).iter().enumerate() {
                    println!(
                        "{}. {} ({}) - {}",
                        i + 1,
                        w.name,
                        format_date(w.date),
                        format_volume(w.volume())
                    );
                }
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Muscle-group breakdown over the last `days` days, computed locally
    /// from merged workout details.
    pub async fn stats_groups(&self, days: i64) -> Result<()> {
        self.require_auth()?;
        self.workouts.load(false).await?;

        let end = Utc::now().date_naive();
        let start = end - Duration::days(days);
        let in_range: Vec<i64> = self
            .workouts
            .snapshot()
            .workouts
            .iter()
            .filter(|w| w.date >= start && w.date <= end && !w.has_details())
            .map(|w| w.id)
            .collect();
        for id in in_range {
            if let Err(e) = self.workouts.load_detail(id).await {
                warn!(id, error = %e, "Skipping workout, detail fetch failed");
            }
        }

        let catalog = self.load_exercises(false).await.unwrap_or_default();
        let snap = self.workouts.snapshot();
        let volumes = analytics::muscle_group_volumes(&snap.workouts, &catalog, start, end);
        if volumes.is_empty() {
            println!("No detailed workouts between {} and {}.", start, end);
            return Ok(());
        }

        println!("Volume by muscle group, {} to {}:", start, end);
        for (group, volume) in volumes {
            println!("  {:<10} {}", group, format_volume(volume));
        }
        Ok(())
    }

    pub fn status(&self) -> Result<()> {
        match self.session.username() {
            Some(username) => println!("Signed in as {}", username),
            None => println!("Not signed in"),
        }
        println!("Server: {}", self.config.api_base_url());
        let draft = self.draft();
        if !draft.is_empty() {
            println!("Workout in progress ({} exercises)", draft.exercises.len());
        }
        Ok(())
    }
}

/// Load for display: a failed revalidation is tolerated as long as cached
/// data exists to show. The stale list renders with the error published in
/// the snapshot; only an empty cache turns the failure into a hard error.
async fn load_for_display<A: WorkoutApi>(
    cache: &WorkoutCache<A>,
    force: bool,
) -> Result<CacheSnapshot, CacheError> {
    if let Err(e) = cache.load(force).await {
        if cache.snapshot().workouts.is_empty() {
            return Err(e);
        }
    }
    Ok(cache.snapshot())
}

fn is_offline(e: &ApiError) -> bool {
    matches!(e, ApiError::Network(_) | ApiError::ServerError(_))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default
            .map(str::to_string)
            .ok_or_else(|| anyhow!("{} is required", label))
    } else {
        Ok(trimmed.to_string())
    }
}
