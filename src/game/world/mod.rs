//! Procedural city construction
//!
//! The city is a fixed `BLOCKS_X x BLOCKS_Z` grid of blocks separated by roads,
//! wrapped by an outer ring road. Each block is tagged with a zone kind from a
//! plan table and laid out by a zone-specific routine that reserves ground in the
//! [`PlotRegistry`] before placing anything. The structural output (roads,
//! buildings, parks) depends only on the plan table; the RNG is used for
//! cosmetic choices and the street-level pickup scatter.

pub mod landmarks;
pub mod layout;
pub mod plots;
pub mod roads;

use glam::{Vec2, Vec3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;

use super::physics::{Aabb, PhysicsWorld, StaticTag};
use super::vehicles::{EmergencyKind, VehicleKind};

pub use plots::{BlockKey, PlotRect, PlotRegistry};

pub const BLOCKS_X: usize = 6;
pub const BLOCKS_Z: usize = 6;
pub const CELL: f32 = 120.0;
pub const ROAD: f32 = 28.0;
pub const PLOT: f32 = CELL - 2.0 * ROAD;
pub const FLOOR_H: f32 = 3.4;
pub const ROAD_SURFACE_Y: f32 = 0.035;
pub const TRAFFIC_LIGHT_H: f32 = 2.8;

/// Centre of block 0 along x
pub const START_X: f32 = -(BLOCKS_X as f32 * CELL) / 2.0 + CELL / 2.0;
/// Centre of block 0 along z
pub const START_Z: f32 = -(BLOCKS_Z as f32 * CELL) / 2.0 + CELL / 2.0;
pub const CITY_HALF_X: f32 = BLOCKS_X as f32 * CELL / 2.0;
pub const CITY_HALF_Z: f32 = BLOCKS_Z as f32 * CELL / 2.0;

pub const RING_RADIUS: f32 =
    (if BLOCKS_X > BLOCKS_Z { BLOCKS_X } else { BLOCKS_Z }) as f32 * CELL * 0.65;
pub const RING_WIDTH: f32 = ROAD * 1.2;

/// Centre of block `(ix, iz)`
pub fn block_center(ix: usize, iz: usize) -> (f32, f32) {
    (START_X + ix as f32 * CELL, START_Z + iz as f32 * CELL)
}

/// Zone kind of a block cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    Green,
    Civic,
    Plaza,
    Campus,
    Gateway,
    ResHigh,
    ResMid,
}

/// Zone plan for every block. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldGrid {
    cells: [[ZoneKind; BLOCKS_X]; BLOCKS_Z],
}

impl WorldGrid {
    /// Build a grid from rows indexed by `iz`, each holding `BLOCKS_X` zones
    pub fn from_rows(rows: &[Vec<ZoneKind>]) -> Result<Self, WorldError> {
        if rows.len() != BLOCKS_Z || rows.iter().any(|r| r.len() != BLOCKS_X) {
            return Err(WorldError::PlanShape {
                rows: rows.len(),
                cols: rows.iter().map(Vec::len).max().unwrap_or(0),
            });
        }

        let mut cells = [[ZoneKind::Green; BLOCKS_X]; BLOCKS_Z];
        for (iz, row) in rows.iter().enumerate() {
            cells[iz].copy_from_slice(row);
        }
        Ok(Self { cells })
    }

    pub fn zone(&self, ix: usize, iz: usize) -> ZoneKind {
        self.cells[iz][ix]
    }

    pub fn count(&self, kind: ZoneKind) -> usize {
        self.cells.iter().flatten().filter(|z| **z == kind).count()
    }
}

impl Default for WorldGrid {
    fn default() -> Self {
        use ZoneKind::*;
        Self {
            cells: [
                [ResHigh, Green, Civic, Civic, Green, ResHigh],
                [ResMid, Green, ResMid, ResMid, Green, ResMid],
                [Gateway, Green, Plaza, Plaza, Green, Campus],
                [Gateway, Green, Plaza, Plaza, Green, Campus],
                [ResMid, Green, ResMid, ResMid, Green, ResMid],
                [ResHigh, Green, Civic, Civic, Green, ResHigh],
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Bricks,
    Plaster,
}

#[derive(Debug, Clone, Serialize)]
pub struct Building {
    pub id: usize,
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    pub floors: u32,
    pub kind: BuildingKind,
    pub label: Option<String>,
    pub landmark: bool,
    pub block: Option<BlockKey>,
}

impl Building {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_footprint(self.x, self.z, self.width, self.depth, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkKind {
    Green,
    Tennis,
    Basket,
}

#[derive(Debug, Clone, Serialize)]
pub struct Park {
    pub kind: ParkKind,
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Bench {
    pub x: f32,
    pub z: f32,
    pub heading: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadKind {
    Grid,
    Ring,
    Connector,
}

#[derive(Debug, Clone, Serialize)]
pub struct Road {
    pub kind: RoadKind,
    pub name: String,
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
    /// Only set for the ring road
    pub radius: Option<f32>,
}

impl Road {
    pub fn length(&self) -> f32 {
        self.from.distance(self.to)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Crosswalk {
    pub x: f32,
    pub z: f32,
    /// Stripes run across the x axis road when true
    pub along_x: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StreetLight {
    pub x: f32,
    pub z: f32,
}

/// Pavement and bike lane band around a block
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Sidewalk {
    pub block: BlockKey,
    pub x: f32,
    pub z: f32,
    pub pavement_width: f32,
    pub bike_lane_width: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Wall {
    pub bounds: Aabb,
}

/// Where a signal stands; its phase is simulated by the vehicle system
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrafficLightSite {
    pub x: f32,
    pub z: f32,
    pub heading: f32,
    /// Initial phase timer, staggers neighbouring signals
    pub phase_offset: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ladder {
    pub building: usize,
    pub base: Vec3,
    pub top: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionKind {
    Police,
    Hospital,
    School,
    Fire,
    Mall,
}

impl InstitutionKind {
    pub fn label(self) -> &'static str {
        match self {
            InstitutionKind::Police => "POLICE",
            InstitutionKind::Hospital => "HOSPITAL",
            InstitutionKind::School => "SCHOOL",
            InstitutionKind::Fire => "FIRE",
            InstitutionKind::Mall => "MALL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Institution {
    pub kind: InstitutionKind,
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub depth: f32,
    pub building: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiKind {
    Airport,
    TrainStation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Poi {
    pub kind: PoiKind,
    pub x: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Landmark {
    pub x: f32,
    pub z: f32,
    pub label: String,
}

/// A vehicle parked at world build time
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParkedSpot {
    pub kind: VehicleKind,
    pub x: f32,
    pub z: f32,
    pub heading: f32,
    pub length: f32,
    pub emergency: Option<EmergencyKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupSource {
    Roof,
    Park,
    Street,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PickupSpot {
    pub position: Vec3,
    pub source: PickupSource,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpawnPoints {
    pub enemies: Vec<Vec3>,
    pub pickups: Vec<PickupSpot>,
}

/// Static city produced once per session
#[derive(Debug, Clone, Serialize)]
pub struct WorldState {
    pub grid: WorldGrid,
    pub buildings: Vec<Building>,
    pub parks: Vec<Park>,
    pub benches: Vec<Bench>,
    pub roads: Vec<Road>,
    pub crosswalks: Vec<Crosswalk>,
    pub street_lights: Vec<StreetLight>,
    pub sidewalks: Vec<Sidewalk>,
    pub walls: Vec<Wall>,
    pub traffic_lights: Vec<TrafficLightSite>,
    pub ladders: Vec<Ladder>,
    pub institutions: Vec<Institution>,
    pub pois: Vec<Poi>,
    pub landmarks: Vec<Landmark>,
    pub parked: Vec<ParkedSpot>,
    pub spawns: SpawnPoints,
    pub ring_radius: f32,
    #[serde(skip)]
    pub plots: PlotRegistry,
}

impl WorldState {
    fn empty(grid: WorldGrid) -> Self {
        Self {
            grid,
            buildings: Vec::new(),
            parks: Vec::new(),
            benches: Vec::new(),
            roads: Vec::new(),
            crosswalks: Vec::new(),
            street_lights: Vec::new(),
            sidewalks: Vec::new(),
            walls: Vec::new(),
            traffic_lights: Vec::new(),
            ladders: Vec::new(),
            institutions: Vec::new(),
            pois: Vec::new(),
            landmarks: Vec::new(),
            parked: Vec::new(),
            spawns: SpawnPoints::default(),
            ring_radius: RING_RADIUS,
            plots: PlotRegistry::new(),
        }
    }

    pub fn institution(&self, kind: InstitutionKind) -> Option<&Institution> {
        self.institutions.iter().find(|i| i.kind == kind)
    }

    pub fn building(&self, id: usize) -> Option<&Building> {
        self.buildings.get(id)
    }
}

/// Building placement request
#[derive(Debug, Clone)]
pub struct BuildingSpec {
    pub x: f32,
    pub z: f32,
    pub floors: u32,
    pub width: f32,
    pub depth: f32,
    pub label: Option<&'static str>,
    pub landmark: bool,
    pub plot: Option<BlockKey>,
}

impl BuildingSpec {
    pub fn new(x: f32, z: f32, floors: u32, width: f32, depth: f32) -> Self {
        Self {
            x,
            z,
            floors,
            width,
            depth,
            label: None,
            landmark: false,
            plot: None,
        }
    }

    /// Reserve the footprint in this block before placing
    pub fn in_plot(mut self, key: BlockKey) -> Self {
        self.plot = Some(key);
        self
    }

    pub fn labelled(mut self, label: &'static str, landmark: bool) -> Self {
        self.label = Some(label);
        self.landmark = landmark;
        self
    }
}

/// Generates the static city and registers its collision boxes
pub struct WorldBuilder<'a> {
    physics: &'a mut PhysicsWorld,
    rng: &'a mut ChaCha8Rng,
    pickup_pool: usize,
    world: WorldState,
}

impl<'a> WorldBuilder<'a> {
    pub fn new(
        grid: WorldGrid,
        physics: &'a mut PhysicsWorld,
        rng: &'a mut ChaCha8Rng,
        pickup_pool: usize,
    ) -> Self {
        Self {
            physics,
            rng,
            pickup_pool,
            world: WorldState::empty(grid),
        }
    }

    /// Run every construction pass in order and hand back the finished world
    pub fn generate(mut self) -> Result<WorldState, WorldError> {
        self.lay_grid_roads();
        self.layout_blocks();
        self.place_extra_parks();
        self.place_traffic_lights();
        self.lay_ring_road();
        self.place_pois();
        self.place_institutions();
        self.build_perimeter_walls();
        self.place_parked_fleet();
        self.place_spawn_points();

        if self.world.spawns.enemies.is_empty() {
            return Err(WorldError::NoSpawnPoints);
        }

        debug!(
            buildings = self.world.buildings.len(),
            parks = self.world.parks.len(),
            roads = self.world.roads.len(),
            reserved = self.world.plots.total_rects(),
            "World generated"
        );

        Ok(self.world)
    }

    /// Place a building. Returns `None` when its plot reservation is rejected.
    pub(crate) fn add_building(&mut self, spec: BuildingSpec) -> Option<usize> {
        if let Some(key) = spec.plot {
            let rect = PlotRect::centered(spec.x, spec.z, spec.width, spec.depth);
            if !self.world.plots.reserve(key, rect) {
                debug!(ix = key.ix, iz = key.iz, x = spec.x, z = spec.z, "Building placement skipped");
                return None;
            }
        }

        let kind = if self.rng.gen_bool(0.5) {
            BuildingKind::Bricks
        } else {
            BuildingKind::Plaster
        };

        let id = self.world.buildings.len();
        let building = Building {
            id,
            x: spec.x,
            z: spec.z,
            width: spec.width,
            depth: spec.depth,
            height: spec.floors as f32 * FLOOR_H,
            floors: spec.floors,
            kind,
            label: spec.label.map(str::to_string),
            landmark: spec.landmark,
            block: spec.plot,
        };

        self.physics.add_static(building.bounds(), StaticTag::Building(id));
        self.world.ladders.push(Ladder {
            building: id,
            base: Vec3::new(building.x, 0.0, building.z - building.depth * 0.5 - 0.3),
            top: building.height,
        });
        if let (Some(label), true) = (spec.label, spec.landmark) {
            self.world.landmarks.push(Landmark {
                x: spec.x,
                z: spec.z,
                label: label.to_string(),
            });
        }
        self.world.buildings.push(building);
        Some(id)
    }
}

/// World generation errors
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Zone plan must be {}x{} blocks, got {rows} rows (widest {cols})", BLOCKS_Z, BLOCKS_X)]
    PlanShape { rows: usize, cols: usize },

    #[error("World has no enemy spawn points")]
    NoSpawnPoints,
}
