//! Picking an aim point each tick and turning it into a steering angle.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use bevy_math::Vec2;

use crate::crash::CrashVerdict;
use crate::difficulty::FallbackTactic;
use crate::geometry::{forward, heading_of, normalize_angle};
use crate::kart::{CompetitorId, CompetitorSnapshot, KartSpec, KartState};
use crate::look_ahead::TrackView;
use crate::track_graph::NodeId;

/// Heading errors smaller than this are not corrected.
const STRAIGHT_DEAD_ZONE: f32 = 0.05;
/// How far outside the corridor the kart may drift before it heads straight
/// back to the track.
const OFF_ROAD_TOLERANCE: f32 = 0.5;
/// Curves turning more than this pull the aim point closer.
const SHARP_CURVE_ANGLE: f32 = FRAC_PI_4;
/// Fraction of max speed lost per radian of curve, divided by PI.
const CURVE_SLOWDOWN: f32 = 1.0;
const MIN_CURVE_SPEED_FRACTION: f32 = 0.35;
/// Sideways offset added when swerving around another kart.
const DODGE_ANGLE: f32 = FRAC_PI_2;
/// Aim points closer than this many kart lengths are skipped.
const MIN_AIM_LENGTHS: f32 = 2.0;
/// Straight line checks sample this many points per kart length.
const LINE_SAMPLES_PER_LENGTH: f32 = 4.0;

/// Why the aim point was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    LookAhead,
    CurveAdjusted,
    OffRoadRecovery,
    DodgeCompetitor,
    AvoidTrackCrash,
    Parallel,
    FarthestPoint,
    HoldHeading,
}

/// Aim point plus the steering it demands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringTarget {
    pub kind: TargetKind,
    pub point: Vec2,
    /// Desired steering in radians, not yet limited to full lock.
    pub demand: f32,
}

/// Upcoming bend and the speed to take it at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveInfo {
    /// Signed heading change over the next second of travel, positive left.
    pub angle: f32,
    pub target_speed: f32,
}

/// Everything the planner reads for one tick.
#[derive(Debug, Clone, Copy)]
pub struct PlanInput<'a> {
    pub view: TrackView<'a>,
    pub node: NodeId,
    pub kart: &'a KartState,
    pub spec: &'a KartSpec,
    pub me: CompetitorId,
    pub competitors: &'a [CompetitorSnapshot],
    pub verdict: &'a CrashVerdict,
    pub curve: CurveInfo,
    pub steps: usize,
    pub dt: f32,
}

/// Remembers which way the kart started swerving around another kart so it
/// doesn't flip sides mid-manoeuvre.
#[derive(Debug, Clone, Default)]
pub struct PathPlanner {
    dodge_direction: f32,
}

impl PathPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.dodge_direction = 0.0;
    }

    pub fn choose_target(&mut self, input: &PlanInput<'_>, tactic: FallbackTactic) -> SteeringTarget {
        let PlanInput {
            view,
            node,
            kart,
            spec,
            verdict,
            ..
        } = *input;
        let next = view.next(node);

        let here = view.project(node, kart.position);
        if here.lateral.abs() > here.half_width + OFF_ROAD_TOLERANCE {
            self.dodge_direction = 0.0;
            let point = view.graph.node(next.unwrap_or(node)).center;
            return SteeringTarget {
                kind: TargetKind::OffRoadRecovery,
                point,
                demand: steer_demand_to_point(kart, spec, point, input.dt),
            };
        }

        match verdict.competitor_crash {
            Some(other) if !verdict.road_crash => {
                if let Some(target) = self.dodge(input, here.lateral, other) {
                    return target;
                }
            }
            _ => self.dodge_direction = 0.0,
        }

        if verdict.road_crash {
            return fallback_target(input, tactic);
        }

        look_ahead_target(input)
    }

    fn dodge(&mut self, input: &PlanInput<'_>, my_lateral: f32, other: CompetitorId) -> Option<SteeringTarget> {
        let other = input.competitors.iter().find(|c| c.id == other)?;
        if self.dodge_direction == 0.0 {
            let other_lateral = input.view.project(input.node, other.position).lateral;
            self.dodge_direction = if my_lateral >= other_lateral { 1.0 } else { -1.0 };
        }
        let sector = input.view.next(input.node).unwrap_or(input.node);
        let demand = steer_to_angle(input, sector, self.dodge_direction * DODGE_ANGLE);
        Some(SteeringTarget {
            kind: TargetKind::DodgeCompetitor,
            point: input.kart.position + forward(input.kart.heading + demand) * input.spec.length * 2.0,
            demand,
        })
    }
}

fn fallback_target(input: &PlanInput<'_>, tactic: FallbackTactic) -> SteeringTarget {
    let PlanInput {
        view,
        node,
        kart,
        spec,
        verdict,
        dt,
        ..
    } = *input;
    match tactic {
        FallbackTactic::AvoidTrackCrash => match verdict.crash_point {
            Some(crash) => {
                let (_, projection) = view.locate(node, crash);
                let inside = (projection.half_width - spec.width * 0.5).max(0.0);
                let offset = crash - projection.closest;
                let point = projection.closest + offset.normalize_or_zero() * offset.length().min(inside);
                SteeringTarget {
                    kind: TargetKind::AvoidTrackCrash,
                    point,
                    demand: steer_demand_to_point(kart, spec, point, dt),
                }
            }
            None => hold_heading(kart, spec),
        },
        FallbackTactic::Parallel => {
            let direction = match view.next(node) {
                Some(next) => view.graph.direction_to_next(node, next),
                None => forward(kart.heading),
            };
            SteeringTarget {
                kind: TargetKind::Parallel,
                point: kart.position + direction * spec.length * MIN_AIM_LENGTHS * 2.0,
                demand: steer_to_angle(input, node, 0.0),
            }
        }
        FallbackTactic::FarthestPoint => match find_non_crashing_point(&view, node, kart, spec) {
            Some(point) => SteeringTarget {
                kind: TargetKind::FarthestPoint,
                point,
                demand: steer_demand_to_point(kart, spec, point, dt),
            },
            None => hold_heading(kart, spec),
        },
    }
}

fn look_ahead_target(input: &PlanInput<'_>) -> SteeringTarget {
    let PlanInput {
        view,
        node,
        kart,
        spec,
        curve,
        steps,
        dt,
        ..
    } = *input;
    let ahead = view.look_ahead.get(node);
    if ahead.is_empty() {
        return hold_heading(kart, spec);
    }

    // Aim at the first node beyond the crash horizon, half as far into a
    // sharp bend.
    let mut reach = steps.max(1) as f32 * spec.length;
    let mut kind = TargetKind::LookAhead;
    if curve.angle.abs() > SHARP_CURVE_ANGLE {
        reach *= 0.5;
        kind = TargetKind::CurveAdjusted;
    }
    let min_distance = spec.length * MIN_AIM_LENGTHS;
    let reach = reach.max(min_distance);

    let mut travelled = 0.0;
    let mut previous = node;
    let mut point = view.graph.node(ahead[ahead.len() - 1]).center;
    for &id in ahead {
        travelled += view.graph.distance_to_next(previous, id);
        previous = id;
        let center = view.graph.node(id).center;
        if travelled >= reach && center.distance(kart.position) >= min_distance {
            point = center;
            break;
        }
    }

    SteeringTarget {
        kind,
        point,
        demand: steer_demand_to_point(kart, spec, point, dt),
    }
}

fn hold_heading(kart: &KartState, spec: &KartSpec) -> SteeringTarget {
    SteeringTarget {
        kind: TargetKind::HoldHeading,
        point: kart.position + forward(kart.heading) * spec.length * MIN_AIM_LENGTHS,
        demand: 0.0,
    }
}

/// Angle between the road direction at `sector` (plus `add_angle`) and the
/// kart's heading, normalized but not limited to full lock.
pub fn steer_to_angle(input: &PlanInput<'_>, sector: NodeId, add_angle: f32) -> f32 {
    let road = match input.view.next(sector) {
        Some(next) => input.view.graph.angle_to_next(sector, next),
        None => input.kart.heading,
    };
    normalize_angle(road - input.kart.heading + add_angle)
}

/// Steering towards `point`, limited to full lock. The controller works
/// from [`steer_demand_to_point`] instead and clamps after its skid check.
pub fn steer_to_point(kart: &KartState, spec: &KartSpec, point: Vec2, dt: f32) -> f32 {
    steer_demand_to_point(kart, spec, point, dt).clamp(-spec.max_steer_angle, spec.max_steer_angle)
}

/// Wheel angle of the circle through the kart and `point`, tangent to the
/// current heading. The current yaw rate is subtracted twice over to damp
/// oversteer. Points behind the kart demand a quarter turn.
pub fn steer_demand_to_point(kart: &KartState, spec: &KartSpec, point: Vec2, dt: f32) -> f32 {
    let to_point = point - kart.position;
    let distance = to_point.length();
    if distance < 1e-3 {
        return 0.0;
    }
    let angle = normalize_angle(heading_of(to_point) - kart.heading - dt * kart.angular_velocity * 2.0);
    if angle.abs() < STRAIGHT_DEAD_ZONE {
        return 0.0;
    }
    if angle.abs() > FRAC_PI_2 {
        return FRAC_PI_2.copysign(angle);
    }
    // radius = distance / (2 sin angle); steer = atan(wheel_base / radius)
    (2.0 * spec.wheel_base * angle.sin() / distance).atan()
}

/// Bend over the next second of travel along the chosen path.
pub fn find_curve(view: &TrackView<'_>, node: NodeId, kart: &KartState, spec: &KartSpec) -> CurveInfo {
    let straight = CurveInfo {
        angle: 0.0,
        target_speed: kart.max_speed,
    };
    let Some(first_next) = view.next(node) else {
        return straight;
    };

    let horizon = kart.speed.max(spec.length);
    let mut total = 0.0;
    let mut end = node;
    for &candidate in view.look_ahead.get(node) {
        if total >= horizon || view.next(candidate).is_none() {
            break;
        }
        total += view.graph.distance_to_next(end, candidate);
        end = candidate;
    }
    let Some(end_next) = view.next(end) else {
        return straight;
    };

    let angle = normalize_angle(
        view.graph.angle_to_next(end, end_next) - view.graph.angle_to_next(node, first_next),
    );
    let fraction = (1.0 - angle.abs() / PI * CURVE_SLOWDOWN).clamp(MIN_CURVE_SPEED_FRACTION, 1.0);
    CurveInfo {
        angle,
        target_speed: kart.max_speed * fraction,
    }
}

/// Farthest node center along the look-ahead that the kart can reach in a
/// straight line while keeping half its width inside the corridor.
///
/// Searches forward and stops at the first blocked node. `None` if even the
/// next node is blocked.
pub fn find_non_crashing_point(
    view: &TrackView<'_>,
    node: NodeId,
    kart: &KartState,
    spec: &KartSpec,
) -> Option<Vec2> {
    let mut best = None;
    for &candidate in view.look_ahead.get(node) {
        let center = view.graph.node(candidate).center;
        if !straight_line_clear(view, node, kart.position, center, spec) {
            break;
        }
        best = Some(center);
    }
    best
}

/// Sample the segment `from..to` (excluding `from`) and require every sample
/// to be on the road with half the kart's width to spare.
pub fn straight_line_clear(view: &TrackView<'_>, node: NodeId, from: Vec2, to: Vec2, spec: &KartSpec) -> bool {
    let samples = line_samples(from, to, spec);
    (1..=samples).all(|i| {
        let point = from.lerp(to, i as f32 / samples as f32);
        view.on_road(node, point, spec.width * 0.5)
    })
}

/// Number of samples `straight_line_clear` takes between two points.
pub fn line_samples(from: Vec2, to: Vec2, spec: &KartSpec) -> usize {
    ((from.distance(to) * LINE_SAMPLES_PER_LENGTH / spec.length).ceil() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::look_ahead::LookAheadCache;
    use crate::route::ChosenPath;
    use crate::track_graph::TrackGraph;

    fn l_track() -> TrackGraph {
        // East for 40 units, then north.
        let mut centers: Vec<Vec2> = (0..=8).map(|i| Vec2::new(i as f32 * 5.0, 0.0)).collect();
        centers.extend((1..=8).map(|i| Vec2::new(40.0, i as f32 * 5.0)));
        TrackGraph::from_centers(&centers, 6.0, false).unwrap()
    }

    fn driving(position: Vec2, heading: f32, speed: f32) -> KartState {
        let mut kart = KartState::at_rest(position, heading, 25.0);
        kart.velocity = forward(heading) * speed;
        kart.speed = speed;
        kart
    }

    #[test]
    fn straight_ahead_needs_no_steering() {
        let kart = driving(Vec2::ZERO, 0.0, 10.0);
        let spec = KartSpec::default();
        assert_eq!(steer_to_point(&kart, &spec, Vec2::new(20.0, 0.3), 0.016), 0.0);
    }

    #[test]
    fn steers_towards_side_of_point() {
        let kart = driving(Vec2::ZERO, 0.0, 10.0);
        let spec = KartSpec::default();
        assert!(steer_to_point(&kart, &spec, Vec2::new(10.0, 5.0), 0.016) > 0.0);
        assert!(steer_to_point(&kart, &spec, Vec2::new(10.0, -5.0), 0.016) < 0.0);
        let behind = steer_to_point(&kart, &spec, Vec2::new(-10.0, -1.0), 0.016);
        assert_eq!(behind, -spec.max_steer_angle);
    }

    #[test]
    fn heading_across_pi_does_not_flip() {
        // Facing west, target slightly to the left (south-west).
        let kart = driving(Vec2::ZERO, PI - 0.01, 10.0);
        let spec = KartSpec::default();
        let left = steer_to_point(&kart, &spec, Vec2::new(-10.0, -3.0), 0.016);
        assert!(left > 0.0, "{left}");
    }

    #[test]
    fn curve_ahead_lowers_target_speed() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();

        let far = find_curve(&view, 0, &driving(Vec2::ZERO, 0.0, 10.0), &spec);
        assert_eq!(far.angle, 0.0);
        assert_eq!(far.target_speed, 25.0);

        let near = find_curve(&view, 6, &driving(Vec2::new(30.0, 0.0), 0.0, 10.0), &spec);
        assert!((near.angle - FRAC_PI_2).abs() < 1e-4);
        assert!(near.target_speed < 25.0 * 0.6);
    }

    #[test]
    fn farthest_point_stops_before_the_corner() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();

        let kart = driving(Vec2::new(20.0, 0.0), 0.0, 10.0);
        let point = find_non_crashing_point(&view, 4, &kart, &spec).unwrap();
        assert_eq!(point, Vec2::new(40.0, 0.0));
    }

    #[test]
    fn blocked_search_returns_none() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();

        // Far off to the side: the line to the next node leaves the road.
        let kart = driving(Vec2::new(20.0, -40.0), 0.0, 10.0);
        assert_eq!(find_non_crashing_point(&view, 4, &kart, &spec), None);
    }

    fn plan<'a>(
        view: TrackView<'a>,
        node: NodeId,
        kart: &'a KartState,
        spec: &'a KartSpec,
        competitors: &'a [CompetitorSnapshot],
        verdict: &'a CrashVerdict,
    ) -> PlanInput<'a> {
        PlanInput {
            view,
            node,
            kart,
            spec,
            me: CompetitorId(1),
            competitors,
            verdict,
            curve: find_curve(&view, node, kart, spec),
            steps: 4,
            dt: 0.016,
        }
    }

    /// Every sample of the straight line sits inside some corridor of the
    /// whole graph, with half the kart's width to spare.
    fn clear_anywhere(graph: &TrackGraph, from: Vec2, to: Vec2, spec: &KartSpec) -> bool {
        let samples = line_samples(from, to, spec);
        (1..=samples).all(|i| {
            let point = from.lerp(to, i as f32 / samples as f32);
            (0..graph.len()).any(|node| {
                graph.contains(node, graph.successors(node).first().copied(), point, spec.width * 0.5)
            })
        })
    }

    #[test]
    fn farthest_point_target_passes_corridor_check() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();

        // (node, position, crash point); each position is tried at several headings.
        let cases = [
            (1, Vec2::new(5.0, 0.0), Vec2::new(12.0, 4.0)),
            (2, Vec2::new(12.0, 2.0), Vec2::new(20.0, 3.5)),
            (2, Vec2::new(12.0, 2.9), Vec2::new(14.0, 4.0)),
            (4, Vec2::new(20.0, -2.0), Vec2::new(26.0, -4.0)),
            (6, Vec2::new(30.0, 1.0), Vec2::new(36.0, 3.5)),
            (7, Vec2::new(38.0, -2.0), Vec2::new(44.0, -1.0)),
            (8, Vec2::new(41.0, 3.0), Vec2::new(44.0, 8.0)),
            (10, Vec2::new(39.0, 12.0), Vec2::new(36.0, 18.0)),
            (15, Vec2::new(40.0, 36.0), Vec2::new(44.0, 39.0)),
            (16, Vec2::new(40.0, 39.0), Vec2::new(40.0, 44.0)),
        ];
        let mut found = 0;
        let mut held = 0;
        for (node, position, crash) in cases {
            for heading in [-0.6, 0.0, 0.3, FRAC_PI_2, 2.5] {
                let kart = driving(position, heading, 10.0);
                let verdict = CrashVerdict {
                    road_crash: true,
                    competitor_crash: None,
                    crash_point: Some(crash),
                };
                let input = plan(view, node, &kart, &spec, &[], &verdict);
                let target = PathPlanner::new().choose_target(&input, FallbackTactic::FarthestPoint);
                match target.kind {
                    TargetKind::FarthestPoint => {
                        found += 1;
                        assert!(
                            clear_anywhere(&graph, position, target.point, &spec),
                            "{position} -> {} leaves the corridor",
                            target.point
                        );
                    }
                    TargetKind::HoldHeading => {
                        held += 1;
                        assert_eq!(find_non_crashing_point(&view, node, &kart, &spec), None);
                        assert_eq!(target.demand, 0.0);
                    }
                    other => panic!("unexpected {other:?} at {position}"),
                }
            }
        }
        assert!(found > 0 && held > 0, "{found} found, {held} held");
    }

    #[test]
    fn dodge_keeps_its_side_until_clear() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();
        let kart = driving(Vec2::new(20.0, 0.5), 0.0, 10.0);
        let threat = CrashVerdict {
            competitor_crash: Some(CompetitorId(2)),
            ..CrashVerdict::none()
        };
        let mut planner = PathPlanner::new();

        let right_of_me = [CompetitorSnapshot::new(CompetitorId(2), Vec2::new(22.0, -0.5), 0, 22.0)];
        let target = planner.choose_target(&plan(view, 4, &kart, &spec, &right_of_me, &threat), FallbackTactic::Parallel);
        assert_eq!(target.kind, TargetKind::DodgeCompetitor);
        assert!(target.demand > 0.0);

        let left_of_me = [CompetitorSnapshot::new(CompetitorId(2), Vec2::new(22.0, 1.5), 0, 22.0)];
        let target = planner.choose_target(&plan(view, 4, &kart, &spec, &left_of_me, &threat), FallbackTactic::Parallel);
        assert!(target.demand > 0.0);

        let clear = CrashVerdict::none();
        let target = planner.choose_target(&plan(view, 4, &kart, &spec, &left_of_me, &clear), FallbackTactic::Parallel);
        assert_eq!(target.kind, TargetKind::LookAhead);

        let target = planner.choose_target(&plan(view, 4, &kart, &spec, &left_of_me, &threat), FallbackTactic::Parallel);
        assert!(target.demand < 0.0);
    }

    #[test]
    fn off_road_kart_heads_for_next_node() {
        let graph = l_track();
        let path = ChosenPath::first_successors(&graph);
        let cache = LookAheadCache::new(&path, 10);
        let view = TrackView::new(&graph, &path, &cache);
        let spec = KartSpec::default();
        let kart = driving(Vec2::new(12.0, 6.0), 0.0, 5.0);
        let verdict = CrashVerdict::none();
        let target = PathPlanner::new().choose_target(&plan(view, 2, &kart, &spec, &[], &verdict), FallbackTactic::Parallel);
        assert_eq!(target.kind, TargetKind::OffRoadRecovery);
        assert_eq!(target.point, Vec2::new(15.0, 0.0));
        assert!(target.demand < 0.0);
    }
}
