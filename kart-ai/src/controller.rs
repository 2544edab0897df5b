use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::crash::{CrashPredictor, CrashVerdict};
use crate::difficulty::DifficultyProfile;
use crate::error::ProfileError;
use crate::geometry::normalize_angle;
use crate::items::{ItemContext, ItemPolicy, wants_nitro};
use crate::kart::{CompetitorId, CompetitorSnapshot, ControlOutput, KartSpec, KartState};
use crate::look_ahead::{LOOK_AHEAD_NODES, LookAheadCache, TrackView};
use crate::nearest::{NearestCompetitorTracker, NearestCompetitors};
use crate::route::ChosenPath;
use crate::steering::{CurveInfo, PathPlanner, PlanInput, SteeringTarget, find_curve};
use crate::track_graph::{CorridorProjection, NodeId, TrackGraph};

/// Seconds of being stuck before a rescue is requested.
pub const STUCK_RESCUE_SECS: f32 = 3.0;
/// Only a kart slower than this can count as stuck.
const STUCK_MAX_SPEED: f32 = 2.5;
/// Heading error against the road that is worth braking for.
const MIN_TRACK_ANGLE: f32 = 20.0 * std::f32::consts::PI / 180.0;
/// Fraction of the half width beyond which a kart is on the inside of a curve.
const CURVE_INSIDE_FRACTION: f32 = 0.25;
const BRAKE_SPEED_MARGIN: f32 = 1.0;
/// A kart that slow still needs to roll to turn away from the edge.
const MIN_CRASH_BRAKE_SPEED: f32 = 5.0;
/// Further off the path than this many half widths, search the whole graph
/// for the kart's node.
const RELOCATE_HALF_WIDTHS: f32 = 2.0;
const SKID_MIN_SPEED: f32 = 5.0;

/// Phase of the per-kart state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Waiting out the random launch delay with the throttle closed.
    RaceStartWait,
    Driving,
    /// Stuck long enough to need help; lasts only until the rescue is issued.
    Stuck,
    /// Waiting for the host to put the kart back on the track.
    Rescuing,
}

/// Host hook that repositions a stuck kart.
pub trait RescueHandler {
    fn request_rescue(&mut self, kart: CompetitorId);
}

impl<F: FnMut(CompetitorId)> RescueHandler for F {
    fn request_rescue(&mut self, kart: CompetitorId) {
        self(kart)
    }
}

/// Drives one kart. Owns its route and every cross-tick timer; shares the
/// track graph with the other controllers.
#[derive(Debug)]
pub struct KartController {
    id: CompetitorId,
    graph: Arc<TrackGraph>,
    profile: DifficultyProfile,
    spec: KartSpec,
    rng: StdRng,
    path: ChosenPath,
    look_ahead: LookAheadCache,
    tracker: NearestCompetitorTracker,
    predictor: CrashPredictor,
    planner: PathPlanner,
    items: ItemPolicy,
    state: ControlState,
    start_delay: f32,
    stuck_timer: f32,
    track_node: NodeId,
    steer: f32,
    last_target: Option<SteeringTarget>,
    last_verdict: CrashVerdict,
}

impl KartController {
    /// Branch choices and the launch delay come from `seed`, so two
    /// controllers built with the same arguments behave identically.
    pub fn new(
        id: CompetitorId,
        graph: Arc<TrackGraph>,
        profile: DifficultyProfile,
        spec: KartSpec,
        seed: u64,
        kart: &KartState,
    ) -> Result<Self, ProfileError> {
        profile.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let path = ChosenPath::random(&graph, &mut rng);
        let look_ahead = LookAheadCache::new(&path, LOOK_AHEAD_NODES);
        let start_delay = rng.random_range(profile.start_delay_min..=profile.start_delay_max);
        let track_node = graph.nearest_node(kart.position);

        debug!(kart = %id, start_delay, track_node, "controller ready");
        Ok(Self {
            id,
            predictor: CrashPredictor::new(profile.min_look_ahead_steps),
            items: ItemPolicy::new(profile.item_tactic, profile.handle_bomb),
            graph,
            profile,
            spec,
            rng,
            path,
            look_ahead,
            tracker: NearestCompetitorTracker::new(),
            planner: PathPlanner::new(),
            state: ControlState::RaceStartWait,
            start_delay,
            stuck_timer: 0.0,
            track_node,
            steer: 0.0,
            last_target: None,
            last_verdict: CrashVerdict::none(),
        })
    }

    pub fn id(&self) -> CompetitorId {
        self.id
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn path(&self) -> &ChosenPath {
        &self.path
    }

    pub fn track_node(&self) -> NodeId {
        self.track_node
    }

    pub fn stuck_timer(&self) -> f32 {
        self.stuck_timer
    }

    /// Launch delay still to wait out.
    pub fn start_delay(&self) -> f32 {
        self.start_delay.max(0.0)
    }

    /// Aim point of the last driving tick, for visualization.
    pub fn last_target(&self) -> Option<SteeringTarget> {
        self.last_target
    }

    pub fn last_verdict(&self) -> CrashVerdict {
        self.last_verdict
    }

    pub fn nearest(&self) -> &NearestCompetitors {
        self.tracker.current()
    }

    /// Take successor `index` at `node` from now on.
    pub fn choose_branch(&mut self, node: NodeId, index: usize) -> bool {
        if node >= self.graph.len() || !self.path.choose(&self.graph, node, index) {
            return false;
        }
        self.look_ahead.rebuild(&self.path);
        true
    }

    /// Back to the start line state: a fresh launch delay, cleared timers and
    /// the node re-located from `kart`.
    pub fn reset(&mut self, kart: &KartState) {
        self.state = ControlState::RaceStartWait;
        self.start_delay = self
            .rng
            .random_range(self.profile.start_delay_min..=self.profile.start_delay_max);
        self.stuck_timer = 0.0;
        self.steer = 0.0;
        self.items.reset();
        self.planner.reset();
        self.track_node = self.graph.nearest_node(kart.position);
        self.last_target = None;
        self.last_verdict = CrashVerdict::none();
        debug!(kart = %self.id, start_delay = self.start_delay, "controller reset");
    }

    /// Run one tick.
    pub fn update(
        &mut self,
        dt: f32,
        kart: &KartState,
        competitors: &[CompetitorSnapshot],
        rescue: &mut impl RescueHandler,
    ) -> ControlOutput {
        if matches!(self.state, ControlState::Stuck | ControlState::Rescuing) {
            if kart.rescuing {
                return ControlOutput::default();
            }
            self.finish_rescue(kart);
        }

        self.update_track_node(kart);
        let nearest = self.tracker.refresh(self.id, competitors);

        let view = TrackView::new(&self.graph, &self.path, &self.look_ahead);
        let node = self.track_node;
        let here = view.project(node, kart.position);
        let steps = self.predictor.calc_steps(
            kart.speed,
            self.steer / self.spec.max_steer_angle,
            self.graph.corner_width(node),
            &self.spec,
            self.look_ahead.size(),
        );
        let verdict = self
            .predictor
            .predict(&view, node, kart, &self.spec, self.id, competitors, steps);
        let curve = find_curve(&view, node, kart, &self.spec);
        let input = PlanInput {
            view,
            node,
            kart,
            spec: &self.spec,
            me: self.id,
            competitors,
            verdict: &verdict,
            curve,
            steps,
            dt,
        };
        let target = self.planner.choose_target(&input, self.profile.fallback_tactic);
        let braking = should_brake(&view, node, kart, &verdict, &curve, &here);

        self.last_target = Some(target);
        self.last_verdict = verdict;
        let skid = self.apply_steering(dt, &target, kart);

        if self.state == ControlState::RaceStartWait {
            self.start_delay -= dt;
            if self.start_delay > 0.0 {
                return ControlOutput {
                    steer_angle: self.steer,
                    ..ControlOutput::default()
                };
            }
            self.state = ControlState::Driving;
            debug!(kart = %self.id, "start delay over");
        }

        if verdict.road_crash && kart.speed < STUCK_MAX_SPEED {
            self.stuck_timer += dt;
        } else {
            self.stuck_timer = 0.0;
        }
        if self.stuck_timer > STUCK_RESCUE_SECS {
            self.state = ControlState::Stuck;
            info!(kart = %self.id, node, "stuck, requesting rescue");
            rescue.request_rescue(self.id);
            self.state = ControlState::Rescuing;
            self.stuck_timer = 0.0;
            self.steer = 0.0;
            return ControlOutput::default();
        }

        let mut throttle = 1.0;
        if self.profile.wait_for_players && nearest.ahead_of_all_humans {
            throttle = self.profile.handicap_accel;
        }

        let ctx = ItemContext {
            kart,
            me: self.id,
            competitors,
            nearest: &nearest,
            road_clear: !verdict.any() && curve.angle.abs() < MIN_TRACK_ANGLE,
        };
        let items = self.items.update(dt, &ctx);
        let mut fire = items.fire;
        let mut nitro = !braking && wants_nitro(self.profile.nitro_level, &ctx);
        if self.items.zipper_for_nitro(nitro, kart) {
            nitro = false;
            fire = true;
        }

        trace!(
            kart = %self.id,
            node,
            steps,
            target = ?target.kind,
            braking,
            "tick"
        );
        ControlOutput {
            steer_angle: self.steer,
            throttle: if braking { 0.0 } else { throttle },
            brake: braking,
            nitro,
            fire,
            skid,
            look_back: fire && items.look_back,
        }
    }

    /// Move the wheel towards the target at the kart's steering rate.
    /// Returns whether the demand calls for a skid.
    ///
    /// `target.demand` arrives unlimited so the skid check sees how far past
    /// full lock it asks for; the wheel itself is clamped here.
    fn apply_steering(&mut self, dt: f32, target: &SteeringTarget, kart: &KartState) -> bool {
        let full = self.spec.max_steer_angle;
        let wanted = target.demand.clamp(-full, full);
        let max_change = if self.spec.time_full_steer > 0.0 {
            full * dt / self.spec.time_full_steer
        } else {
            f32::INFINITY
        };
        self.steer = (self.steer + (wanted - self.steer).clamp(-max_change, max_change)).clamp(-full, full);
        kart.on_ground
            && kart.speed > SKID_MIN_SPEED
            && target.demand.abs() > self.profile.skidding_threshold * full
    }

    fn update_track_node(&mut self, kart: &KartState) {
        let view = TrackView::new(&self.graph, &self.path, &self.look_ahead);
        let (node, projection) = view.locate(self.track_node, kart.position);
        self.track_node = if projection.lateral.abs() > projection.half_width * RELOCATE_HALF_WIDTHS {
            self.graph.nearest_node(kart.position)
        } else {
            node
        };
    }

    fn finish_rescue(&mut self, kart: &KartState) {
        self.state = ControlState::Driving;
        self.stuck_timer = 0.0;
        self.steer = 0.0;
        self.planner.reset();
        self.track_node = self.graph.nearest_node(kart.position);
        debug!(kart = %self.id, node = self.track_node, "rescue finished");
    }
}

/// Brake when too fast for the bend ahead, or when about to leave the road
/// while pointing away from it. A kart on the inside of a bend it can take
/// keeps going.
fn should_brake(
    view: &TrackView<'_>,
    node: NodeId,
    kart: &KartState,
    verdict: &CrashVerdict,
    curve: &CurveInfo,
    here: &CorridorProjection,
) -> bool {
    if kart.speed > curve.target_speed + BRAKE_SPEED_MARGIN {
        return true;
    }
    if !verdict.road_crash || !here.contains(0.0) || kart.speed < MIN_CRASH_BRAKE_SPEED {
        return false;
    }
    let Some(next) = view.next(node) else {
        return false;
    };
    let misaligned = normalize_angle(view.graph.angle_to_next(node, next) - kart.heading).abs();
    if misaligned > MIN_TRACK_ANGLE {
        return true;
    }
    let inside = curve.angle * here.lateral > 0.0 && here.lateral.abs() > here.half_width * CURVE_INSIDE_FRACTION;
    curve.angle.abs() > MIN_TRACK_ANGLE && !inside
}
