//! When to fire the held item and when to burn nitro.

use tracing::debug;

use crate::difficulty::{ItemTactic, NitroLevel};
use crate::kart::{CompetitorId, CompetitorSnapshot, ItemKind, KartState};
use crate::nearest::NearestCompetitors;

/// Dwell time after which any held item is fired.
pub const ITEM_DWELL_SECS: f32 = 10.0;
const ANVIL_MIN_HOLD_SECS: f32 = 3.0;
const GUM_MIN_BEHIND: f32 = 3.0;
const GUM_MAX_BEHIND: f32 = 15.0;
const CAKE_RANGE: f32 = 20.0;
const BOWLING_BACK_RANGE: f32 = 30.0;
const BOWLING_FORWARD_RANGE: f32 = 10.0;
const PLUNGER_RANGE: f32 = 30.0;
const BOMB_HANDOFF_RANGE: f32 = 10.0;
/// A faster kart this close behind triggers a defensive zipper.
const ZIPPER_DEFENSE_RANGE: f32 = 10.0;

const NITRO_MAX_SPEED_FRACTION: f32 = 0.95;
const NITRO_LOW_SPEED: f32 = 5.0;
const NITRO_RESERVE: f32 = 2.0;
/// Remaining distance below which the reserve is spent.
const NITRO_SPRINT_DISTANCE: f32 = 100.0;
const NITRO_OVERTAKE_RANGE: f32 = 15.0;
/// Below this speed a zipper is not worth firing in place of nitro.
const ZIPPER_MIN_SPEED: f32 = 1.0;

/// Item part of the tick's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemDecision {
    pub fire: bool,
    pub look_back: bool,
}

impl ItemDecision {
    fn forward() -> Self {
        Self {
            fire: true,
            look_back: false,
        }
    }

    fn backward() -> Self {
        Self {
            fire: true,
            look_back: true,
        }
    }
}

/// Per-tick facts the item and nitro rules look at.
#[derive(Debug, Clone, Copy)]
pub struct ItemContext<'a> {
    pub kart: &'a KartState,
    pub me: CompetitorId,
    pub competitors: &'a [CompetitorSnapshot],
    pub nearest: &'a NearestCompetitors,
    /// No crash predicted and no sharp curve ahead.
    pub road_clear: bool,
}

impl ItemContext<'_> {
    fn snapshot(&self, id: CompetitorId) -> Option<&CompetitorSnapshot> {
        self.competitors.iter().find(|c| c.id == id)
    }

    fn teammate(&self, other: Option<(CompetitorId, f32)>) -> bool {
        let Some((other, _)) = other else {
            return false;
        };
        match (self.snapshot(self.me), self.snapshot(other)) {
            (Some(me), Some(other)) => me.same_team(other),
            _ => false,
        }
    }

    fn can_fire_forward(&self) -> bool {
        !self.teammate(self.nearest.ahead)
    }

    fn can_fire_backward(&self) -> bool {
        !self.teammate(self.nearest.behind)
    }
}

/// Item tactic plus the time the current item has been held.
#[derive(Debug, Clone)]
pub struct ItemPolicy {
    tactic: ItemTactic,
    handle_bomb: bool,
    held_for: f32,
}

impl ItemPolicy {
    pub fn new(tactic: ItemTactic, handle_bomb: bool) -> Self {
        Self {
            tactic,
            handle_bomb,
            held_for: 0.0,
        }
    }

    /// Seconds since the held item was picked up or the last shot.
    pub fn held_for(&self) -> f32 {
        self.held_for
    }

    pub fn reset(&mut self) {
        self.held_for = 0.0;
    }

    /// Advance the dwell timer and decide whether to fire this tick.
    /// The timer restarts after every shot and whenever nothing is held.
    pub fn update(&mut self, dt: f32, ctx: &ItemContext<'_>) -> ItemDecision {
        let Some(item) = ctx.kart.held_item else {
            self.held_for = 0.0;
            return ItemDecision::default();
        };
        self.held_for += dt;

        let decision = match self.tactic {
            ItemTactic::TenSeconds => ItemDecision {
                fire: self.held_for >= ITEM_DWELL_SECS,
                look_back: false,
            },
            ItemTactic::Calculate => self.calculate(item, ctx),
        };

        if decision.fire {
            debug!(kart = %ctx.me, ?item, back = decision.look_back, held = self.held_for, "firing item");
            self.held_for = 0.0;
        }
        decision
    }

    /// Nitro was requested while holding a zipper: fire the zipper instead.
    /// Counts as a shot, so the dwell timer restarts.
    pub fn zipper_for_nitro(&mut self, nitro: bool, kart: &KartState) -> bool {
        let replaced = nitro && kart.held_item == Some(ItemKind::Zipper) && kart.speed > ZIPPER_MIN_SPEED;
        if replaced {
            self.held_for = 0.0;
        }
        replaced
    }

    fn bomb(&self, ctx: &ItemContext<'_>) -> ItemDecision {
        if self.handle_bomb && ctx.nearest.distance_behind() < BOMB_HANDOFF_RANGE && ctx.can_fire_backward() {
            ItemDecision::backward()
        } else {
            ItemDecision::default()
        }
    }

    fn calculate(&self, item: ItemKind, ctx: &ItemContext<'_>) -> ItemDecision {
        let ahead = ctx.nearest.distance_ahead();
        let behind = ctx.nearest.distance_behind();
        let forward = ctx.can_fire_forward();
        let backward = ctx.can_fire_backward();

        let aimed = match item {
            ItemKind::BubbleGum => {
                (backward && behind > GUM_MIN_BEHIND && behind < GUM_MAX_BEHIND).then(ItemDecision::forward)
            }
            ItemKind::Cake => (forward && ahead < CAKE_RANGE).then(ItemDecision::forward),
            ItemKind::Bowling => {
                if behind < ahead && behind < BOWLING_BACK_RANGE && backward {
                    Some(ItemDecision::backward())
                } else {
                    (forward && ahead < BOWLING_FORWARD_RANGE).then(ItemDecision::forward)
                }
            }
            ItemKind::Plunger => {
                if behind < ahead && behind < PLUNGER_RANGE && backward {
                    Some(ItemDecision::backward())
                } else {
                    (forward && ahead < PLUNGER_RANGE).then(ItemDecision::forward)
                }
            }
            ItemKind::Anvil => {
                (self.held_for > ANVIL_MIN_HOLD_SECS && ctx.nearest.rank > 1).then(ItemDecision::forward)
            }
            ItemKind::Zipper => return zipper(ctx),
            ItemKind::Bomb => return self.bomb(ctx),
        };

        aimed.unwrap_or(ItemDecision {
            fire: self.held_for >= ITEM_DWELL_SECS,
            look_back: false,
        })
    }
}

fn zipper(ctx: &ItemContext<'_>) -> ItemDecision {
    ItemDecision {
        fire: ctx.road_clear || zipper_defense(ctx),
        look_back: false,
    }
}

/// A faster kart is closing in from behind.
fn zipper_defense(ctx: &ItemContext<'_>) -> bool {
    let Some((id, distance)) = ctx.nearest.behind else {
        return false;
    };
    distance < ZIPPER_DEFENSE_RANGE
        && ctx
            .snapshot(id)
            .is_some_and(|other| other.velocity.length() > ctx.kart.speed)
}

/// Whether to burn nitro this tick.
pub fn wants_nitro(level: NitroLevel, ctx: &ItemContext<'_>) -> bool {
    let kart = ctx.kart;
    if level == NitroLevel::None
        || kart.finished
        || !kart.on_ground
        || kart.nitro_energy <= 0.0
        || kart.speed > kart.max_speed * NITRO_MAX_SPEED_FRACTION
    {
        return false;
    }
    if kart.speed < NITRO_LOW_SPEED {
        return true;
    }
    if ctx.nearest.is_last() && kart.nitro_energy > NITRO_RESERVE {
        return true;
    }
    match level {
        NitroLevel::None => false,
        NitroLevel::All => true,
        NitroLevel::Some => {
            kart.remaining_distance < NITRO_SPRINT_DISTANCE
                || (kart.nitro_energy > NITRO_RESERVE && ctx.nearest.distance_ahead() < NITRO_OVERTAKE_RANGE)
        }
    }
}
