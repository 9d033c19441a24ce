// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::OnboardingState;

pub const POINTS_PER_LEVEL_STEP: i64 = 50;

/// Total points needed to reach `level`. Level 1 starts at zero; thresholds
/// past `i64::MAX` saturate.
pub const fn points_for_level(level: u32) -> i64 {
    if level <= 1 {
        return 0;
    }
    let n = level as i64;
    POINTS_PER_LEVEL_STEP.saturating_mul(n).saturating_mul(n - 1)
}

fn exact_threshold(level: u32) -> Option<i64> {
    let n = i64::from(level);
    POINTS_PER_LEVEL_STEP.checked_mul(n)?.checked_mul(n - 1)
}

/// Solves `50 * n * (n - 1) <= points` for the largest `n`.
pub fn level_for_points(points: i64) -> u32 {
    if points < POINTS_PER_LEVEL_STEP * 2 {
        return 1;
    }
    let steps = (points / POINTS_PER_LEVEL_STEP) as f64;
    let estimate = ((1.0 + (1.0 + 4.0 * steps).sqrt()) / 2.0).floor();
    let mut level = (estimate as u32).max(1);
    while level > 1 && exact_threshold(level).is_none_or(|floor| floor > points) {
        level -= 1;
    }
    while let Some(next) = level.checked_add(1).and_then(exact_threshold) {
        if next > points {
            break;
        }
        level += 1;
    }
    level
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    pub total_points: i64,
    pub points_into_level: i64,
    pub points_to_next: i64,
}

impl LevelProgress {
    pub fn from_points(total_points: i64) -> Self {
        let total_points = total_points.max(0);
        let level = level_for_points(total_points);
        let floor = points_for_level(level);
        let next = points_for_level(level + 1);
        Self {
            level,
            total_points,
            points_into_level: total_points - floor,
            points_to_next: next - total_points,
        }
    }

    pub fn fraction(&self) -> f64 {
        let span = self.points_into_level + self.points_to_next;
        if span == 0 {
            return 0.0;
        }
        self.points_into_level as f64 / span as f64
    }
}

/// The level reached since the user last acknowledged one, if any.
pub fn pending_level_up(state: &OnboardingState, total_points: i64) -> Option<u32> {
    let level = level_for_points(total_points);
    (level > state.last_seen_level).then_some(level)
}

#[cfg(test)]
mod tests {
    use super::{LevelProgress, level_for_points, pending_level_up, points_for_level};
    use crate::{OnboardingState, ProfileId};

    #[test]
    fn thresholds_follow_triangular_steps() {
        assert_eq!(points_for_level(1), 0);
        assert_eq!(points_for_level(2), 100);
        assert_eq!(points_for_level(3), 300);
        assert_eq!(points_for_level(4), 600);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(299), 2);
        assert_eq!(level_for_points(300), 3);
        assert_eq!(level_for_points(-20), 1);
        for level in 2..2_000 {
            let floor = points_for_level(level);
            assert_eq!(level_for_points(floor), level);
            assert_eq!(level_for_points(floor - 1), level - 1);
        }
    }

    #[test]
    fn extreme_totals_do_not_overflow() {
        let level = level_for_points(i64::MAX);
        assert!(points_for_level(level) <= i64::MAX);
        assert_eq!(points_for_level(u32::MAX), i64::MAX);
        let progress = LevelProgress::from_points(i64::MAX);
        assert_eq!(progress.level, level);
        assert!(progress.points_into_level >= 0);
        assert!(progress.points_to_next >= 0);
    }

    #[test]
    fn progress_within_level() {
        let progress = LevelProgress::from_points(150);
        assert_eq!(progress.level, 2);
        assert_eq!(progress.points_into_level, 50);
        assert_eq!(progress.points_to_next, 150);
        assert!((progress.fraction() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn level_up_pending_until_acknowledged() {
        let mut state = OnboardingState {
            user_id: ProfileId::new(1),
            onboarding_completed: true,
            last_seen_level: 1,
        };
        assert_eq!(pending_level_up(&state, 50), None);
        assert_eq!(pending_level_up(&state, 320), Some(3));
        state.last_seen_level = 3;
        assert_eq!(pending_level_up(&state, 320), None);
    }
}
