//! Local analytics over cached workouts.
//!
//! The server exposes the same aggregates over its analytics endpoints, but
//! computing them from the cache keeps stats available offline and lets the
//! muscle-group breakdown use merged workout details. Week keys are ISO 8601
//! ("2026-W34"), matching the server's bucketing.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::models::{Exercise, MuscleGroup, WeeklyFrequency, WeeklyVolume, Workout};

/// ISO week key for a date, e.g. "2026-W07". Uses the ISO week-numbering
/// year, so dates near January 1 may key into the adjacent year.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Per-ISO-week volume totals, ascending by week.
pub fn weekly_volume(workouts: &[Workout]) -> Vec<WeeklyVolume> {
    let mut buckets: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for w in workouts {
        let bucket = buckets.entry(iso_week_key(w.date)).or_insert((0.0, 0));
        bucket.0 += w.volume();
        bucket.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(week, (total, count))| WeeklyVolume {
            week,
            total_volume: round2(total),
            avg_volume_per_workout: round2(total / f64::from(count)),
            workout_count: count,
        })
        .collect()
}

/// Per-ISO-week workout counts, ascending by week.
pub fn weekly_frequency(workouts: &[Workout]) -> Vec<WeeklyFrequency> {
    let mut buckets: BTreeMap<String, u32> = BTreeMap::new();
    for w in workouts {
        *buckets.entry(iso_week_key(w.date)).or_insert(0) += 1;
    }
    buckets
        .into_iter()
        .map(|(week, workout_count)| WeeklyFrequency {
            week,
            workout_count,
        })
        .collect()
}

/// The `count` highest-volume workouts, ties broken newest-first.
pub fn top_workouts(workouts: &[Workout], count: usize) -> Vec<&Workout> {
    let mut ranked: Vec<&Workout> = workouts.iter().collect();
    ranked.sort_by(|a, b| {
        b.volume()
            .partial_cmp(&a.volume())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.date.cmp(&a.date))
    });
    ranked.truncate(count);
    ranked
}

/// Volume per muscle group over a date range (inclusive). Groups resolve
/// through the exercise catalog, falling back to the annotation the server
/// puts on each entry. Only workouts with merged details contribute;
/// unresolvable entries and groups with no volume are skipped.
pub fn muscle_group_volumes(
    workouts: &[Workout],
    catalog: &[Exercise],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<(MuscleGroup, f64)> {
    let groups_by_id: HashMap<i64, MuscleGroup> =
        catalog.iter().map(|e| (e.id, e.muscle_group)).collect();
    let mut by_group: Vec<(MuscleGroup, f64)> =
        MuscleGroup::ALL.iter().map(|&g| (g, 0.0)).collect();

    for w in workouts {
        if w.date < start || w.date > end {
            continue;
        }
        let Some(entries) = &w.performed_exercises else {
            continue;
        };
        for entry in entries {
            let group = groups_by_id
                .get(&entry.exercise)
                .copied()
                .or(entry.muscle_group);
            if let Some(group) = group {
                if let Some(slot) = by_group.iter_mut().find(|(g, _)| *g == group) {
                    slot.1 += entry.volume();
                }
            }
        }
    }

    by_group.retain(|(_, volume)| *volume > 0.0);
    by_group
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PerformedExercise;

    fn workout(id: i64, date: (i32, u32, u32), volume: f64) -> Workout {
        Workout {
            id,
            name: format!("w{}", id),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            total_volume: Some(volume),
            performed_exercises: None,
        }
    }

    #[test]
    fn week_keys_are_iso() {
        // 2026-01-01 is a Thursday, ISO week 1
        assert_eq!(
            iso_week_key(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            "2026-W01"
        );
        // 2027-01-01 is a Friday, still ISO week 53 of 2026
        assert_eq!(
            iso_week_key(NaiveDate::from_ymd_opt(2027, 1, 1).unwrap()),
            "2026-W53"
        );
        assert_eq!(
            iso_week_key(NaiveDate::from_ymd_opt(2026, 8, 20).unwrap()),
            "2026-W34"
        );
    }

    #[test]
    fn weekly_volume_buckets_and_averages() {
        let workouts = vec![
            workout(1, (2026, 8, 17), 4000.0),
            workout(2, (2026, 8, 19), 2000.0),
            workout(3, (2026, 8, 24), 5000.0),
        ];
        let stats = weekly_volume(&workouts);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].week, "2026-W34");
        assert_eq!(stats[0].total_volume, 6000.0);
        assert_eq!(stats[0].avg_volume_per_workout, 3000.0);
        assert_eq!(stats[0].workout_count, 2);
        assert_eq!(stats[1].week, "2026-W35");
        assert_eq!(stats[1].workout_count, 1);
    }

    #[test]
    fn frequency_counts_per_week() {
        let workouts = vec![
            workout(1, (2026, 8, 17), 1.0),
            workout(2, (2026, 8, 18), 1.0),
            workout(3, (2026, 8, 25), 1.0),
        ];
        let stats = weekly_frequency(&workouts);
        assert_eq!(stats[0].workout_count, 2);
        assert_eq!(stats[1].workout_count, 1);
    }

    #[test]
    fn top_workouts_ranked_by_volume() {
        let workouts = vec![
            workout(1, (2026, 8, 1), 3000.0),
            workout(2, (2026, 8, 2), 9000.0),
            workout(3, (2026, 8, 3), 6000.0),
        ];
        let top = top_workouts(&workouts, 2);
        assert_eq!(top.iter().map(|w| w.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn muscle_groups_resolve_through_catalog() {
        let entry = |exercise, group: Option<MuscleGroup>, weight| PerformedExercise {
            id: None,
            exercise,
            exercise_name: None,
            muscle_group: group,
            sets: 1,
            reps_per_set: vec![10],
            weights_per_set: Some(vec![weight]),
        };
        let catalog = vec![
            Exercise {
                id: 1,
                name: "Bench press".into(),
                description: None,
                muscle_group: MuscleGroup::Chest,
            },
            Exercise {
                id: 2,
                name: "Squat".into(),
                description: None,
                muscle_group: MuscleGroup::Legs,
            },
        ];

        let mut detailed = workout(1, (2026, 8, 18), 0.0);
        detailed.performed_exercises = Some(vec![
            entry(1, None, 80.0),
            entry(2, None, 120.0),
            entry(1, None, 60.0),
            // Not in the catalog; the server annotation fills in
            entry(99, Some(MuscleGroup::Core), 20.0),
        ]);
        let out_of_range = {
            let mut w = workout(2, (2026, 7, 1), 0.0);
            w.performed_exercises = Some(vec![entry(2, None, 100.0)]);
            w
        };
        let summary_only = workout(3, (2026, 8, 19), 5000.0);

        let volumes = muscle_group_volumes(
            &[detailed, out_of_range, summary_only],
            &catalog,
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 31).unwrap(),
        );
        assert_eq!(
            volumes,
            vec![
                (MuscleGroup::Chest, 1400.0),
                (MuscleGroup::Legs, 1200.0),
                (MuscleGroup::Core, 200.0),
            ]
        );
    }
}
