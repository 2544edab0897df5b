use std::sync::Arc;

use bevy_math::Vec2;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use kart_ai::geometry::forward;
use kart_ai::{
    CompetitorId, CompetitorSnapshot, ControlOutput, ItemKind, KartController, KartSpec, NodeId,
    TrackGraph,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RaceConfig;
use crate::physics::{KartBody, KartParams};

/// Seconds a rescued kart stays frozen before it is put back.
const RESCUE_FREEZE_SECS: f32 = 1.0;
const GRID_ROW_SPACING: f32 = 3.0;
const GRID_LANE_OFFSET: f32 = 2.5;
/// Forward and backward reach of fired items.
const ITEM_RANGE: f32 = 30.0;
const BOMB_PASS_RANGE: f32 = 10.0;
const HIT_SPEED_FACTOR: f32 = 0.4;
const ZIPPER_BOOST: f32 = 8.0;
const HANDOUT_ITEMS: [ItemKind; 6] = [
    ItemKind::BubbleGum,
    ItemKind::Cake,
    ItemKind::Bowling,
    ItemKind::Zipper,
    ItemKind::Plunger,
    ItemKind::Anvil,
];

/// One kart and everything the race tracks about it.
#[derive(Debug)]
pub struct Racer {
    pub name: String,
    pub controller: KartController,
    pub body: KartBody,
    pub human: bool,
    pub team: Option<u32>,
    pub lap: u32,
    pub progress: f32,
    pub finished_at: Option<f32>,
    pub rescues: u32,
    pub items_fired: u32,
    pub hits_taken: u32,
    rescue_freeze: Option<f32>,
}

impl Racer {
    pub fn id(&self) -> CompetitorId {
        self.controller.id()
    }

    fn snapshot(&self) -> CompetitorSnapshot {
        CompetitorSnapshot {
            id: self.id(),
            position: self.body.state.position,
            velocity: self.body.state.velocity,
            lap: self.lap,
            progress: self.progress,
            human: self.human,
            team: self.team,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RacerSummary {
    pub rank: usize,
    pub name: String,
    pub id: u32,
    pub laps: u32,
    pub progress: f32,
    pub finished_at: Option<f32>,
    pub rescues: u32,
    pub items_fired: u32,
    pub hits_taken: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceSummary {
    pub track_length: f32,
    pub laps: u32,
    pub ticks: u64,
    pub time: f32,
    pub racers: Vec<RacerSummary>,
}

/// Headless race: shared graph, one controller and body per kart.
#[derive(Debug)]
pub struct Race {
    graph: Arc<TrackGraph>,
    spec: KartSpec,
    params: KartParams,
    laps: u32,
    dt: f32,
    item_interval: f32,
    item_timer: f32,
    time: f32,
    ticks: u64,
    rng: StdRng,
    racers: Vec<Racer>,
}

impl Race {
    pub fn new(graph: Arc<TrackGraph>, config: &RaceConfig) -> Result<Self> {
        config.validate()?;
        let spec = KartSpec::default();
        let mut rng = StdRng::seed_from_u64(config.seed);

        let (start, heading) = node_pose(&graph, 0);
        let direction = forward(heading);
        let rows = config.karts.len().div_ceil(2);

        let mut racers = Vec::with_capacity(config.karts.len());
        for (slot, entry) in config.karts.iter().enumerate() {
            let row = rows - 1 - slot / 2;
            let lane = if slot % 2 == 0 { 1.0 } else { -1.0 };
            let position =
                start + direction * (row as f32 * GRID_ROW_SPACING) + direction.perp() * (lane * GRID_LANE_OFFSET);
            let body = KartBody::new(position, heading, &config.kart);
            let id = CompetitorId(slot as u32 + 1);
            let controller = KartController::new(
                id,
                graph.clone(),
                entry.profile(),
                spec,
                rng.random(),
                &body.state,
            )
            .wrap_err_with(|| format!("kart {:?}", entry.name))?;
            racers.push(Racer {
                name: entry.name.clone(),
                progress: graph.progress_distance(controller.track_node()),
                controller,
                body,
                human: entry.human,
                team: entry.team,
                lap: 0,
                finished_at: None,
                rescues: 0,
                items_fired: 0,
                hits_taken: 0,
                rescue_freeze: None,
            });
        }

        info!(karts = racers.len(), laps = config.laps, length = graph.length(), "race ready");
        Ok(Self {
            graph,
            spec,
            params: config.kart,
            laps: config.laps,
            dt: config.dt,
            item_interval: config.item_interval,
            item_timer: 0.0,
            time: 0.0,
            ticks: 0,
            rng,
            racers,
        })
    }

    pub fn racers(&self) -> &[Racer] {
        &self.racers
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_finished(&self) -> bool {
        self.racers.iter().all(|r| r.finished_at.is_some())
    }

    /// Tick until every kart has finished or `max_ticks` have run.
    pub fn run(&mut self, max_ticks: u64) -> RaceSummary {
        while self.ticks < max_ticks && !self.is_finished() {
            self.tick();
        }
        if !self.is_finished() {
            warn!(ticks = self.ticks, "tick limit reached before every kart finished");
        }
        self.summary()
    }

    pub fn tick(&mut self) {
        let dt = self.dt;
        self.hand_out_items(dt);

        let snapshot: Vec<CompetitorSnapshot> = self.racers.iter().map(Racer::snapshot).collect();
        let mut outputs = Vec::with_capacity(self.racers.len());
        for racer in &mut self.racers {
            let mut rescued = false;
            let output = racer
                .controller
                .update(dt, &racer.body.state, &snapshot, &mut |_: CompetitorId| rescued = true);
            if rescued {
                racer.rescues += 1;
                racer.body.state.rescuing = true;
                racer.body.place(racer.body.state.position, racer.body.state.heading);
                racer.rescue_freeze = Some(RESCUE_FREEZE_SECS);
                info!(kart = %racer.name, rescues = racer.rescues, "rescued");
            }
            outputs.push(output);
        }

        for (index, output) in outputs.iter().enumerate() {
            if output.fire {
                self.fire(index, output);
            }
        }

        for (racer, output) in self.racers.iter_mut().zip(&outputs) {
            if let Some(remaining) = racer.rescue_freeze {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    racer.rescue_freeze = Some(remaining);
                } else {
                    racer.rescue_freeze = None;
                    put_back_on_track(&self.graph, racer);
                }
                continue;
            }
            if racer.finished_at.is_some() {
                racer.body.step(&ControlOutput::default(), &self.spec, &self.params, dt);
                continue;
            }
            racer.body.step(output, &self.spec, &self.params, dt);
        }

        self.time += dt;
        self.ticks += 1;
        for racer in &mut self.racers {
            update_progress(&self.graph, racer, self.laps, self.time);
        }
    }

    fn hand_out_items(&mut self, dt: f32) {
        self.item_timer += dt;
        if self.item_timer < self.item_interval {
            return;
        }
        self.item_timer = 0.0;
        for racer in &mut self.racers {
            let state = &mut racer.body.state;
            state.nitro_energy = (state.nitro_energy + 1.0).min(self.params.max_nitro);
            if state.held_item.is_none() {
                state.held_item = HANDOUT_ITEMS.choose(&mut self.rng).copied();
            }
        }
        // Now and then one kart's item is swapped for a bomb.
        if self.rng.random_bool(0.1) {
            let index = self.rng.random_range(0..self.racers.len());
            debug!(kart = %self.racers[index].name, "bomb handed out");
            self.racers[index].body.state.held_item = Some(ItemKind::Bomb);
        }
    }

    fn fire(&mut self, index: usize, output: &ControlOutput) {
        let Some(item) = self.racers[index].body.state.held_item else {
            return;
        };
        let shooter = self.racers[index].snapshot();

        if item == ItemKind::Zipper {
            let state = &mut self.racers[index].body.state;
            state.speed += ZIPPER_BOOST;
            state.held_item = None;
            self.racers[index].items_fired += 1;
            return;
        }

        let range = if item == ItemKind::Bomb { BOMB_PASS_RANGE } else { ITEM_RANGE };
        let target = self.nearest_in_direction(&shooter, output.look_back || item == ItemKind::Bomb, range);

        if item == ItemKind::Bomb {
            let Some(target) = target else {
                return;
            };
            debug!(from = %self.racers[index].name, to = %self.racers[target].name, "bomb passed");
            self.racers[index].body.state.held_item = None;
            self.racers[target].body.state.held_item = Some(ItemKind::Bomb);
            return;
        }

        self.racers[index].body.state.held_item = None;
        self.racers[index].items_fired += 1;
        if let Some(target) = target {
            let victim = &mut self.racers[target];
            victim.body.state.speed *= HIT_SPEED_FACTOR;
            victim.hits_taken += 1;
            debug!(?item, from = %shooter.id, to = %victim.name, "hit");
        }
    }

    /// Closest kart ahead (or behind) on the same lap within `range`.
    fn nearest_in_direction(&self, shooter: &CompetitorSnapshot, backwards: bool, range: f32) -> Option<usize> {
        self.racers
            .iter()
            .enumerate()
            .filter(|(_, r)| r.id() != shooter.id && r.lap == shooter.lap && r.finished_at.is_none())
            .map(|(i, r)| {
                let delta = r.progress - shooter.progress;
                (i, if backwards { -delta } else { delta })
            })
            .filter(|&(_, distance)| distance > 0.0 && distance < range)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    pub fn summary(&self) -> RaceSummary {
        let mut order: Vec<&Racer> = self.racers.iter().collect();
        order.sort_by(|a, b| match (a.finished_at, b.finished_at) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => (b.lap, b.progress)
                .partial_cmp(&(a.lap, a.progress))
                .unwrap_or(std::cmp::Ordering::Equal),
        });
        RaceSummary {
            track_length: self.graph.length(),
            laps: self.laps,
            ticks: self.ticks,
            time: self.time,
            racers: order
                .into_iter()
                .enumerate()
                .map(|(i, r)| RacerSummary {
                    rank: i + 1,
                    name: r.name.clone(),
                    id: r.id().0,
                    laps: r.lap,
                    progress: r.progress,
                    finished_at: r.finished_at,
                    rescues: r.rescues,
                    items_fired: r.items_fired,
                    hits_taken: r.hits_taken,
                })
                .collect(),
        }
    }
}

/// Nearest node, facing along the kart's own route.
fn put_back_on_track(graph: &TrackGraph, racer: &mut Racer) {
    let node = graph.nearest_node(racer.body.state.position);
    let heading = match racer.controller.path().next(node) {
        Some(next) => graph.angle_to_next(node, next),
        None => racer.body.state.heading,
    };
    racer.body.place(graph.node(node).center, heading);
    racer.body.state.rescuing = false;
    debug!(kart = %racer.name, node, "back on track");
}

fn segment_progress(graph: &TrackGraph, racer: &Racer, node: NodeId) -> f32 {
    let base = graph.progress_distance(node);
    match racer.controller.path().next(node) {
        Some(next) => {
            let projection = graph.project(node, Some(next), racer.body.state.position);
            let along = projection.t * graph.distance_to_next(node, next);
            if next == 0 { base + along.min(graph.length() - base) } else { base + along }
        }
        None => base,
    }
}

fn update_progress(graph: &TrackGraph, racer: &mut Racer, laps: u32, time: f32) {
    if racer.finished_at.is_some() {
        return;
    }
    let progress = segment_progress(graph, racer, racer.controller.track_node());
    let length = graph.length();

    if graph.is_closed() && length > 0.0 {
        let jump = progress - racer.progress;
        if jump < -length * 0.5 {
            racer.lap += 1;
            info!(kart = %racer.name, lap = racer.lap, time, "lap completed");
        } else if jump > length * 0.5 {
            racer.lap = racer.lap.saturating_sub(1);
        }
        racer.progress = progress;
        racer.body.state.remaining_distance =
            (laps.saturating_sub(racer.lap) as f32 * length - progress).max(0.0);
        if racer.lap >= laps {
            finish(racer, time);
        }
    } else {
        racer.progress = progress;
        racer.body.state.remaining_distance = (length - progress).max(0.0);
        if racer.body.state.remaining_distance <= 0.0 {
            finish(racer, time);
        }
    }
}

fn finish(racer: &mut Racer, time: f32) {
    racer.finished_at = Some(time);
    racer.body.state.finished = true;
    info!(kart = %racer.name, time, "finished");
}

/// Center of `node`, facing its first successor.
pub fn node_pose(graph: &TrackGraph, node: NodeId) -> (Vec2, f32) {
    let center = graph.node(node).center;
    let heading = graph
        .successors(node)
        .first()
        .map_or(0.0, |&next| graph.angle_to_next(node, next));
    (center, heading)
}
