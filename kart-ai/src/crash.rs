use bevy_math::Vec2;
use tracing::trace;

use crate::kart::{CompetitorId, CompetitorSnapshot, KartSpec, KartState};
use crate::look_ahead::TrackView;
use crate::track_graph::NodeId;

/// Below this speed other karts are not extrapolated along their velocity.
const MIN_PROJECTION_SPEED: f32 = 0.5;
/// Steering this close to full lock widens the horizon for tight curves.
const HARD_STEER_FRACTION: f32 = 0.95;

/// What the horizon walk found. Both kinds of crash can fire together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrashVerdict {
    pub road_crash: bool,
    pub competitor_crash: Option<CompetitorId>,
    /// First projected position outside the corridor.
    pub crash_point: Option<Vec2>,
}

impl CrashVerdict {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.road_crash || self.competitor_crash.is_some()
    }
}

/// Walks the kart's current trajectory in kart-length steps.
#[derive(Debug, Clone, Copy)]
pub struct CrashPredictor {
    min_steps: usize,
}

impl CrashPredictor {
    pub fn new(min_steps: usize) -> Self {
        Self { min_steps }
    }

    /// Horizon length in steps.
    ///
    /// One second of travel measured in kart lengths, widened by half the
    /// corridor width (in kart lengths) while steering at full lock, then
    /// clamped to `[min_steps, max_steps]`. Monotonic in speed. Always zero
    /// when `min_steps` is zero.
    pub fn calc_steps(
        &self,
        speed: f32,
        steer_fraction: f32,
        corridor_width: f32,
        spec: &KartSpec,
        max_steps: usize,
    ) -> usize {
        if self.min_steps == 0 {
            return 0;
        }
        let mut steps = (speed.max(0.0) / spec.length) as usize;
        if steer_fraction.abs() > HARD_STEER_FRACTION {
            steps += (corridor_width / (spec.length * 2.0)) as usize;
        }
        steps.min(max_steps).max(self.min_steps)
    }

    /// Check `steps` positions along the kart's travel direction, starting
    /// at its current position. The road is only checked as far as the
    /// look-ahead covers; later positions can only find other karts.
    ///
    /// Other karts are moved along their own velocity to the time the kart
    /// reaches each step; a competitor crash is recorded for the earliest
    /// step at which another kart's bounding circle overlaps, nearest first.
    #[allow(clippy::too_many_arguments)]
    pub fn predict(
        &self,
        view: &TrackView<'_>,
        node: NodeId,
        kart: &KartState,
        spec: &KartSpec,
        me: CompetitorId,
        competitors: &[CompetitorSnapshot],
        steps: usize,
    ) -> CrashVerdict {
        let mut verdict = CrashVerdict::none();
        if self.min_steps == 0 || steps == 0 {
            return verdict;
        }

        let direction = kart.travel_direction();
        let step_time = if kart.speed > MIN_PROJECTION_SPEED {
            spec.length / kart.speed
        } else {
            0.0
        };

        let covered = view.covered_distance(node, kart.position);

        for i in 0..steps {
            let travelled = spec.length * i as f32;
            let point = kart.position + direction * travelled;

            if verdict.competitor_crash.is_none() {
                let time = step_time * i as f32;
                verdict.competitor_crash = competitors
                    .iter()
                    .filter(|other| other.id != me)
                    .map(|other| (other.id, point.distance(other.position + other.velocity * time)))
                    .filter(|&(_, distance)| distance < spec.length)
                    .fold(None, |best: Option<(CompetitorId, f32)>, candidate| match best {
                        Some(best) if best.1 <= candidate.1 => Some(best),
                        _ => Some(candidate),
                    })
                    .map(|(id, _)| id);
            }

            if !verdict.road_crash && travelled <= covered && !view.on_road(node, point, 0.0) {
                verdict.road_crash = true;
                verdict.crash_point = Some(point);
            }

            if verdict.road_crash && verdict.competitor_crash.is_some() {
                break;
            }
        }

        trace!(
            steps,
            road = verdict.road_crash,
            kart = ?verdict.competitor_crash,
            "crash prediction"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::look_ahead::{LOOK_AHEAD_NODES, LookAheadCache};
    use crate::route::ChosenPath;
    use crate::track_graph::TrackGraph;

    fn straight(width: f32) -> TrackGraph {
        let centers: Vec<Vec2> = (0..40).map(|i| Vec2::new(i as f32 * 5.0, 0.0)).collect();
        TrackGraph::from_centers(&centers, width, false).unwrap()
    }

    fn moving(position: Vec2, velocity: Vec2) -> KartState {
        let mut kart = KartState::at_rest(position, velocity.to_angle(), 30.0);
        kart.velocity = velocity;
        kart.speed = velocity.length();
        kart
    }

    #[test]
    fn zero_min_steps_never_reports() {
        let graph = straight(4.0);
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let predictor = CrashPredictor::new(0);
        let spec = KartSpec::default();

        // Heading straight off the road, with another kart right in front.
        let kart = moving(Vec2::new(10.0, 0.0), Vec2::new(0.0, 20.0));
        let other = CompetitorSnapshot::new(CompetitorId(2), Vec2::new(10.0, 1.0), 0, 10.0);
        let me = CompetitorSnapshot::new(CompetitorId(1), kart.position, 0, 10.0);
        let steps = predictor.calc_steps(kart.speed, 1.0, 4.0, &spec, 10);
        assert_eq!(steps, 0);
        for steps in [0, 1, 5, 10] {
            let verdict = predictor.predict(
                &view,
                2,
                &kart,
                &spec,
                CompetitorId(1),
                &[me.clone(), other.clone()],
                steps,
            );
            assert_eq!(verdict, CrashVerdict::none());
        }
    }

    #[test]
    fn steps_scale_with_speed_and_clamp() {
        let spec = KartSpec::default();
        let predictor = CrashPredictor::new(2);
        assert_eq!(predictor.calc_steps(0.0, 0.0, 10.0, &spec, 10), 2);
        assert_eq!(predictor.calc_steps(9.0, 0.0, 10.0, &spec, 10), 6);
        assert_eq!(predictor.calc_steps(100.0, 0.0, 10.0, &spec, 10), 10);
        assert_eq!(predictor.calc_steps(6.0, 1.0, 12.0, &spec, 10), 8);

        let mut last = 0;
        for i in 0..100 {
            let steps = predictor.calc_steps(i as f32 * 0.5, 0.0, 10.0, &spec, 10);
            assert!(steps >= last);
            last = steps;
        }
    }

    #[test]
    fn one_step_only_checks_current_position() {
        let graph = straight(4.0);
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let predictor = CrashPredictor::new(1);
        let spec = KartSpec::default();

        // On the road but heading for the edge.
        let kart = moving(Vec2::new(10.0, 1.5), Vec2::new(0.0, 10.0));
        let near = predictor.predict(&view, 2, &kart, &spec, CompetitorId(1), &[], 1);
        assert!(!near.road_crash);
        let far = predictor.predict(&view, 2, &kart, &spec, CompetitorId(1), &[], 3);
        assert!(far.road_crash);
        assert!(far.crash_point.is_some());
    }

    #[test]
    fn dense_nodes_do_not_shorten_the_road() {
        let centers: Vec<Vec2> = (0..200).map(|i| Vec2::new(i as f32 * 0.5, 0.0)).collect();
        let graph = TrackGraph::from_centers(&centers, 8.0, false).unwrap();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, LOOK_AHEAD_NODES);
        let view = TrackView::new(&graph, &path, &cache);
        let predictor = CrashPredictor::new(1);
        let spec = KartSpec::default();

        let kart = moving(Vec2::new(20.0, 0.0), Vec2::new(20.0, 0.0));
        let steps = predictor.calc_steps(kart.speed, 0.0, 8.0, &spec, cache.size());
        assert_eq!(steps, LOOK_AHEAD_NODES);
        let verdict = predictor.predict(&view, 40, &kart, &spec, CompetitorId(1), &[], steps);
        assert_eq!(verdict, CrashVerdict::none());

        // Leaving the road inside the covered stretch is still seen.
        let sideways = moving(Vec2::new(20.0, 3.0), Vec2::new(0.0, 20.0));
        let verdict = predictor.predict(&view, 40, &sideways, &spec, CompetitorId(1), &[], steps);
        assert!(verdict.road_crash);
    }

    #[test]
    fn road_and_competitor_crash_fire_together() {
        let graph = straight(4.0);
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let predictor = CrashPredictor::new(1);
        let spec = KartSpec::default();

        let kart = moving(Vec2::new(10.0, 0.0), Vec2::new(6.0, 8.0));
        let blocker = CompetitorSnapshot::new(CompetitorId(9), Vec2::new(10.9, 1.2), 0, 11.0);
        let verdict =
            predictor.predict(&view, 2, &kart, &spec, CompetitorId(1), &[blocker], 6);
        assert!(verdict.road_crash);
        assert_eq!(verdict.competitor_crash, Some(CompetitorId(9)));
        assert!(verdict.any());
    }
}
