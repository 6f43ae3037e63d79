//! Simulated server
//!
//! Players random-walk around their spawn and keep the cells within their
//! view radius loaded. Walking back and forth across a cell border makes the
//! edge cells churn, which is exactly what the scheduler is meant to damp.

use crate::core::types::{CellCoord, Tick, WorldId};
use crate::host::{HostEvent, HostView, TickPhase, WorldStatus};
use crate::sim::facility::SimFacility;
use ahash::{AHashMap, AHashSet};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub worlds: Vec<(WorldId, String)>,
    pub players: usize,
    /// Cells loaded around each player, on both axes
    pub view_radius: i32,
    /// How far a player may wander from spawn
    pub roam: i32,
    /// Chance per tick that a player takes a step
    pub step_chance: f64,
    /// Chance that a freshly generated cell holds anything worth protecting
    pub occupied_chance: f64,
    /// Cells per world pinned by some other owner at startup
    pub external_pins: usize,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            worlds: vec![
                (WorldId(0), "Overworld".to_string()),
                (WorldId(-1), "Nether".to_string()),
            ],
            players: 4,
            view_radius: 4,
            roam: 12,
            step_chance: 0.2,
            occupied_chance: 0.03,
            external_pins: 3,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone)]
struct SimPlayer {
    name: String,
    world: WorldId,
    spawn: (i32, i32),
    pos: (i32, i32),
}

#[derive(Debug, Default)]
struct SimWorld {
    name: String,
    loaded: AHashSet<CellCoord>,
    occupants: AHashMap<CellCoord, usize>,
}

pub struct SimHost {
    config: SimConfig,
    worlds: BTreeMap<WorldId, SimWorld>,
    players: Vec<SimPlayer>,
    rng: ChaCha8Rng,
    now: Tick,
}

impl SimHost {
    /// Build the worlds and register the startup external pins on `facility`
    pub fn new(config: SimConfig, facility: &mut SimFacility) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let worlds: BTreeMap<WorldId, SimWorld> = config
            .worlds
            .iter()
            .map(|(id, name)| {
                let world = SimWorld {
                    name: name.clone(),
                    ..SimWorld::default()
                };
                (*id, world)
            })
            .collect();

        let mut players = Vec::with_capacity(config.players);
        if !config.worlds.is_empty() {
            for i in 0..config.players {
                let world = config.worlds[i % config.worlds.len()].0;
                let spawn = (rng.gen_range(-64..=64), rng.gen_range(-64..=64));
                players.push(SimPlayer {
                    name: format!("player{}", i + 1),
                    world,
                    spawn,
                    pos: spawn,
                });
            }
        }

        for (world, _) in &config.worlds {
            for _ in 0..config.external_pins {
                let coord = CellCoord::new(rng.gen_range(-96..=96), rng.gen_range(-96..=96), *world);
                facility.add_external(coord);
            }
        }

        Self {
            config,
            worlds,
            players,
            rng,
            now: 0,
        }
    }

    pub fn now(&self) -> Tick {
        self.now
    }

    pub fn loaded_cells(&self, world: WorldId) -> usize {
        self.worlds.get(&world).map_or(0, |w| w.loaded.len())
    }

    /// Advance one server tick and report what happened
    pub fn step(&mut self, facility: &SimFacility) -> Vec<HostEvent> {
        self.now += 1;
        let now = self.now;
        let mut events = vec![HostEvent::ServerTick {
            now,
            phase: TickPhase::Start,
        }];

        self.move_players();

        let world_ids: Vec<WorldId> = self.worlds.keys().copied().collect();
        for id in world_ids {
            let name = self.worlds[&id].name.clone();
            events.push(HostEvent::WorldTick {
                world: id,
                name: name.clone(),
                phase: TickPhase::Start,
            });
            self.update_world(id, facility, &mut events);
            events.push(HostEvent::WorldTick {
                world: id,
                name,
                phase: TickPhase::End,
            });
        }

        events.push(HostEvent::ServerTick {
            now,
            phase: TickPhase::End,
        });
        events
    }

    fn move_players(&mut self) {
        let roam = self.config.roam;
        for player in &mut self.players {
            if !self.rng.gen_bool(self.config.step_chance) {
                continue;
            }
            let (dx, dz) = match self.rng.gen_range(0..4) {
                0 => (1, 0),
                1 => (-1, 0),
                2 => (0, 1),
                _ => (0, -1),
            };
            let x = (player.pos.0 + dx).clamp(player.spawn.0 - roam, player.spawn.0 + roam);
            let z = (player.pos.1 + dz).clamp(player.spawn.1 - roam, player.spawn.1 + roam);
            player.pos = (x, z);
        }
    }

    fn update_world(&mut self, id: WorldId, facility: &SimFacility, events: &mut Vec<HostEvent>) {
        let radius = self.config.view_radius;
        let mut wanted: AHashSet<CellCoord> = AHashSet::new();
        for player in self.players.iter().filter(|p| p.world == id) {
            let center = CellCoord::new(player.pos.0, player.pos.1, id);
            wanted.insert(center);
            wanted.extend(center.neighbors(radius));
        }

        let Some(world) = self.worlds.get_mut(&id) else {
            return;
        };

        let mut unloading: Vec<CellCoord> = world
            .loaded
            .iter()
            .filter(|coord| !wanted.contains(*coord) && !facility.is_forced(coord))
            .copied()
            .collect();
        unloading.sort();
        for coord in unloading {
            world.loaded.remove(&coord);
            events.push(HostEvent::CellUnloaded {
                coord,
                now: self.now,
            });
        }

        let mut loading: Vec<CellCoord> = wanted
            .into_iter()
            .filter(|coord| !world.loaded.contains(coord))
            .collect();
        loading.sort();
        for coord in loading {
            let occupants = match world.occupants.get(&coord) {
                Some(&n) => n,
                None => {
                    events.push(HostEvent::CellGenerated { coord });
                    let n = if self.rng.gen_bool(self.config.occupied_chance) {
                        self.rng.gen_range(1..=8)
                    } else {
                        0
                    };
                    world.occupants.insert(coord, n);
                    n
                }
            };
            world.loaded.insert(coord);
            events.push(HostEvent::CellLoaded {
                coord,
                now: self.now,
                occupants,
            });
        }
    }

    /// Host state as seen by the reporter
    pub fn view(&self, facility: &SimFacility) -> SimView {
        let worlds = self
            .worlds
            .iter()
            .map(|(id, world)| WorldStatus {
                id: *id,
                name: world.name.clone(),
                loaded_cells: world.loaded.len(),
                forced_cells: facility.forced_in(*id),
            })
            .collect();
        let players = self.players.iter().map(|p| p.name.clone()).collect();
        SimView { worlds, players }
    }
}

/// Owned snapshot of the simulated server
#[derive(Debug, Clone)]
pub struct SimView {
    worlds: Vec<WorldStatus>,
    players: Vec<String>,
}

impl HostView for SimView {
    fn worlds(&self) -> Vec<WorldStatus> {
        self.worlds.clone()
    }

    fn players(&self) -> Vec<String> {
        self.players.clone()
    }
}
