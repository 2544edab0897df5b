use crate::kart::{CompetitorId, CompetitorSnapshot};

/// Closest competitors on the same lap, by track progress.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NearestCompetitors {
    pub ahead: Option<(CompetitorId, f32)>,
    pub behind: Option<(CompetitorId, f32)>,
    /// 1-based race position; 1 is leading.
    pub rank: usize,
    /// Competitors in the snapshot, including this kart.
    pub field_size: usize,
    /// No human competitor is ahead of this kart (and at least one is racing).
    pub ahead_of_all_humans: bool,
}

impl NearestCompetitors {
    /// Unbounded when nobody is ahead.
    pub fn distance_ahead(&self) -> f32 {
        self.ahead.map_or(f32::INFINITY, |(_, d)| d)
    }

    pub fn distance_behind(&self) -> f32 {
        self.behind.map_or(f32::INFINITY, |(_, d)| d)
    }

    pub fn is_last(&self) -> bool {
        self.field_size > 1 && self.rank == self.field_size
    }
}

/// Refreshed once per tick from the host snapshot. Holds ids only; callers
/// look competitors up again in the snapshot.
#[derive(Debug, Clone, Default)]
pub struct NearestCompetitorTracker {
    current: NearestCompetitors,
}

impl NearestCompetitorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &NearestCompetitors {
        &self.current
    }

    /// Rescan every competitor. If `me` is missing from the snapshot the
    /// result is empty.
    pub fn refresh(&mut self, me: CompetitorId, all: &[CompetitorSnapshot]) -> NearestCompetitors {
        let Some(own) = all.iter().find(|c| c.id == me) else {
            self.current = NearestCompetitors::default();
            return self.current;
        };

        let mut result = NearestCompetitors {
            rank: 1,
            field_size: all.len(),
            ..NearestCompetitors::default()
        };
        let mut humans = 0;
        let mut human_ahead = false;

        for other in all.iter().filter(|c| c.id != me) {
            if other.is_ahead_of(own) {
                result.rank += 1;
                human_ahead |= other.human;
            }
            humans += usize::from(other.human);

            if other.lap != own.lap {
                continue;
            }
            let delta = other.progress - own.progress;
            if delta > 0.0 {
                if result.ahead.is_none_or(|(_, best)| delta < best) {
                    result.ahead = Some((other.id, delta));
                }
            } else if delta < 0.0 && result.behind.is_none_or(|(_, best)| -delta < best) {
                result.behind = Some((other.id, -delta));
            }
        }
        result.ahead_of_all_humans = humans > 0 && !human_ahead;

        self.current = result;
        result
    }
}

#[cfg(test)]
mod tests {
    use bevy_math::Vec2;

    use super::*;

    fn kart(id: u32, lap: u32, progress: f32) -> CompetitorSnapshot {
        CompetitorSnapshot::new(CompetitorId(id), Vec2::ZERO, lap, progress)
    }

    #[test]
    fn picks_closest_on_each_side() {
        let all = [
            kart(1, 0, 50.0),
            kart(2, 0, 80.0),
            kart(3, 0, 60.0),
            kart(4, 0, 30.0),
            kart(5, 0, 45.0),
        ];
        let mut tracker = NearestCompetitorTracker::new();
        let nearest = tracker.refresh(CompetitorId(1), &all);
        assert_eq!(nearest.ahead, Some((CompetitorId(3), 10.0)));
        assert_eq!(nearest.behind, Some((CompetitorId(5), 5.0)));
        assert_eq!(nearest.rank, 3);
        assert_eq!(nearest.field_size, 5);
    }

    #[test]
    fn ignores_other_laps() {
        let all = [kart(1, 1, 50.0), kart(2, 0, 60.0), kart(3, 2, 40.0)];
        let nearest = NearestCompetitorTracker::new().refresh(CompetitorId(1), &all);
        assert_eq!(nearest.ahead, None);
        assert_eq!(nearest.behind, None);
        assert_eq!(nearest.distance_ahead(), f32::INFINITY);
        assert_eq!(nearest.rank, 2);
    }

    #[test]
    fn first_encountered_wins_ties() {
        let all = [kart(1, 0, 10.0), kart(7, 0, 20.0), kart(8, 0, 20.0)];
        let nearest = NearestCompetitorTracker::new().refresh(CompetitorId(1), &all);
        assert_eq!(nearest.ahead, Some((CompetitorId(7), 10.0)));
        assert!(nearest.is_last());
    }

    #[test]
    fn missing_self_yields_nothing() {
        let all = [kart(2, 0, 10.0)];
        let nearest = NearestCompetitorTracker::new().refresh(CompetitorId(1), &all);
        assert_eq!(nearest, NearestCompetitors::default());
    }

    #[test]
    fn leading_humans_needs_a_human() {
        let mut tracker = NearestCompetitorTracker::new();
        let bots_only = [kart(1, 0, 90.0), kart(2, 0, 10.0)];
        assert!(!tracker.refresh(CompetitorId(1), &bots_only).ahead_of_all_humans);

        let with_human = [kart(1, 0, 90.0), kart(2, 0, 10.0).human()];
        assert!(tracker.refresh(CompetitorId(1), &with_human).ahead_of_all_humans);

        let human_leads = [kart(1, 0, 90.0), kart(2, 0, 95.0).human()];
        assert!(!tracker.refresh(CompetitorId(1), &human_leads).ahead_of_all_humans);
    }
}
