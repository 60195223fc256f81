//! A one-level cave exercising every delve component.
//!
//! Demonstrates: cellular-automata cave generation, cached FOV per vision
//! kind, sectors per movement kind, portal-aware chasing, retreat paths and a
//! bucketed monster index over an arena.

use delve_core::{LevelId, Point, Position, Range};
use delve_paths::{
    AstarPather, LevelShortestPath, Pather, Portals, RetreatConfig, SearchContext, SectorCache,
    ShortestPath, WeightedPather, chebyshev,
};
use delve_rl::{Arena, BucketMap, BucketMapError, Handle, VisionCache};
use rand::{Rng, RngExt, SeedableRng};

pub const WIDTH: i32 = 60;
pub const HEIGHT: i32 = 22;
pub const LEVEL: LevelId = LevelId(1);
pub const SIGHT: i32 = 8;

const BUCKET_SIZE: i32 = 8;

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Terrain {
    Wall,
    Floor,
    Water,
}

/// How a creature moves; each kind partitions the cave differently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Movement {
    Walk,
    Swim,
}

impl Movement {
    pub fn passable(self, t: Terrain) -> bool {
        match (self, t) {
            (_, Terrain::Floor) => true,
            (Movement::Swim, Terrain::Water) => true,
            _ => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Sense {
    Eyes,
}

pub struct Cave {
    bounds: Range,
    tiles: Vec<Terrain>,
}

impl Cave {
    /// Random fill followed by smoothing passes: a cell becomes wall with at
    /// least 5 walls around it, or when its 5x5 neighborhood is nearly empty.
    /// Out-of-bounds cells count as walls.
    pub fn generate(rng: &mut impl Rng, width: i32, height: i32) -> Self {
        let bounds = Range::new(0, 0, width, height);
        let mut cave = Cave {
            bounds,
            tiles: bounds
                .iter()
                .map(|_| {
                    if rng.random_range(0..100) < 45 {
                        Terrain::Wall
                    } else {
                        Terrain::Floor
                    }
                })
                .collect(),
        };
        for rep in 0..5 {
            let next: Vec<Terrain> = bounds
                .iter()
                .map(|p| {
                    let near = cave.count_walls(p, 1);
                    let far = cave.count_walls(p, 2);
                    if near >= 5 || (rep < 3 && far <= 2) {
                        Terrain::Wall
                    } else {
                        Terrain::Floor
                    }
                })
                .collect();
            cave.tiles = next;
        }
        // A few pools.
        for _ in 0..3 {
            let c = Point::new(rng.random_range(0..width), rng.random_range(0..height));
            for p in Range::new(c.x - 2, c.y - 1, c.x + 3, c.y + 2).intersect(bounds) {
                if cave.at(p) == Some(Terrain::Floor) {
                    cave.set(p, Terrain::Water);
                }
            }
        }
        cave
    }

    fn count_walls(&self, center: Point, radius: i32) -> i32 {
        let mut count = 0;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if (dx, dy) != (0, 0)
                    && self.at(center.shift(dx, dy)).is_none_or(|t| t == Terrain::Wall)
                {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn bounds(&self) -> Range {
        self.bounds
    }

    pub fn at(&self, p: Point) -> Option<Terrain> {
        self.bounds.index(p).map(|i| self.tiles[i])
    }

    pub fn set(&mut self, p: Point, t: Terrain) {
        if let Some(i) = self.bounds.index(p) {
            self.tiles[i] = t;
        }
    }

    pub fn blocks_sight(&self, p: Point) -> bool {
        self.at(p).is_none_or(|t| t == Terrain::Wall)
    }
}

// ---------------------------------------------------------------------------
// Cave pather
// ---------------------------------------------------------------------------

struct CavePather<'a> {
    cave: &'a Cave,
    movement: Movement,
}

impl Pather for CavePather<'_> {
    fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
        for n in p.neighbors_8() {
            if self.cave.bounds.contains(n) {
                buf.push(n);
            }
        }
    }
}

impl WeightedPather for CavePather<'_> {
    fn entry_cost(&self, p: Point) -> Option<f64> {
        let t = self.cave.at(p)?;
        if !self.movement.passable(t) {
            return None;
        }
        Some(if t == Terrain::Water { 2.0 } else { 1.0 })
    }
}

impl AstarPather for CavePather<'_> {
    fn estimate(&self, from: Point, to: Point) -> f64 {
        chebyshev(from, to) as f64
    }
}

// ---------------------------------------------------------------------------
// Demo state
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Monster {
    pub pos: Point,
    pub ch: char,
    pub movement: Movement,
}

pub struct Demo {
    pub cave: Cave,
    pub player: Point,
    pub monsters: Arena<Monster>,
    index: BucketMap<Handle>,
    sectors: SectorCache<Movement>,
    vision: VisionCache<Sense>,
    portals: Portals,
    ctx: SearchContext,
}

impl Demo {
    pub fn new(seed: u64) -> Result<Self, BucketMapError> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let cave = Cave::generate(&mut rng, WIDTH, HEIGHT);
        let bounds = cave.bounds();

        let mut sectors = SectorCache::new(bounds);
        let walk = sectors.get_or_build(&Movement::Walk, |p| {
            cave.at(p).is_some_and(|t| Movement::Walk.passable(t))
        });
        let main = walk.largest();
        let mut main_cells: Vec<Point> = bounds
            .iter()
            .filter(|&p| main.is_some() && walk.sector(p) == main)
            .collect();
        if main_cells.is_empty() {
            main_cells.push(Point::new(WIDTH / 2, HEIGHT / 2));
        }
        let player = main_cells[0];

        // A portal between the two far ends of the main region.
        let mut portals = Portals::new(LEVEL, bounds);
        let far = main_cells[main_cells.len() - 1];
        if far != player {
            portals.link(player, far);
            sectors.add_extra_connection(player, far);
        }

        let mut monsters = Arena::new();
        let mut index = BucketMap::new(bounds, BUCKET_SIZE)?;
        let chars = ['g', 'k', 'r', 's', 'z'];
        let mut attempts = 0;
        while monsters.len() < 6 && attempts < 500 {
            attempts += 1;
            let p = Point::new(rng.random_range(0..WIDTH), rng.random_range(0..HEIGHT));
            let movement = if monsters.len() % 3 == 2 {
                Movement::Swim
            } else {
                Movement::Walk
            };
            if !cave.at(p).is_some_and(|t| movement.passable(t))
                || chebyshev(p, player) < 5
                || monsters.iter().any(|(_, m): (Handle, &Monster)| m.pos == p)
            {
                continue;
            }
            let h = monsters.insert(Monster {
                pos: p,
                ch: chars[monsters.len() % chars.len()],
                movement,
            });
            index.add_element(p, h);
        }

        let mut ctx = SearchContext::new(bounds);
        {
            let pather = CavePather {
                cave: &cave,
                movement: Movement::Walk,
            };
            portals.update_distances(&mut ctx, &pather, 40.0);
        }

        let mut vision = VisionCache::new(bounds, SIGHT);
        vision.get_or_build(&Sense::Eyes, |p| cave.blocks_sight(p));

        Ok(Demo {
            cave,
            player,
            monsters,
            index,
            sectors,
            vision,
            portals,
            ctx,
        })
    }

    pub fn portals(&self) -> &Portals {
        &self.portals
    }

    pub fn sectors(&mut self, movement: Movement) -> &mut delve_paths::Sectors {
        let cave = &self.cave;
        self.sectors
            .get_or_build(&movement, |p| cave.at(p).is_some_and(|t| movement.passable(t)))
    }

    /// Whether the player sees `p`.
    pub fn player_sees(&mut self, p: Point) -> bool {
        let cave = &self.cave;
        let player = self.player;
        self.vision
            .get_or_build(&Sense::Eyes, |q| cave.blocks_sight(q))
            .can_see(player, p)
    }

    /// Monsters within `radius` of the player, nearest first.
    pub fn nearby_monsters(&self, radius: i32) -> Vec<Handle> {
        let p = self.player;
        let area = Range::new(p.x - radius, p.y - radius, p.x + radius + 1, p.y + radius + 1);
        let mut found: Vec<Handle> = self
            .index
            .get_elements(area)
            .into_iter()
            .filter(|&h| {
                self.monsters
                    .get(h)
                    .is_some_and(|m| chebyshev(m.pos, p) <= radius)
            })
            .collect();
        found.sort_by_key(|&h| self.monsters.get(h).map_or(i32::MAX, |m| chebyshev(m.pos, p)));
        found
    }

    /// Path for monster `h` toward the player, gated by its sectors.
    pub fn chase(&mut self, h: Handle) -> Option<LevelShortestPath> {
        let m = self.monsters.get(h)?.clone();
        self.sectors(m.movement);
        let pather = CavePather {
            cave: &self.cave,
            movement: m.movement,
        };
        Some(LevelShortestPath::new(
            &mut self.ctx,
            &pather,
            &self.portals,
            self.sectors.get(&m.movement),
            Position::new(LEVEL, self.player),
            Position::new(LEVEL, m.pos),
        ))
    }

    /// Retreat path for monster `h` away from the player.
    pub fn flee(&mut self, h: Handle) -> Option<ShortestPath> {
        let m = self.monsters.get(h)?.clone();
        let pather = CavePather {
            cave: &self.cave,
            movement: m.movement,
        };
        Some(ShortestPath::retreat(
            &mut self.ctx,
            &pather,
            self.player,
            m.pos,
            -1.2,
            &RetreatConfig::default(),
        ))
    }

    /// Move monster `h` one step along `path`.
    pub fn step_monster(&mut self, h: Handle, path: &mut LevelShortestPath) -> bool {
        let Some(m) = self.monsters.get_mut(h) else {
            return false;
        };
        let here = Position::new(LEVEL, m.pos);
        if !path.is_reachable(here) {
            return false;
        }
        let Some(next) = path.next_move(here) else {
            return false;
        };
        let from = m.pos;
        m.pos = next.pos;
        self.index.move_element(from, next.pos, h);
        true
    }

    /// Turn the wall at `p` into floor, keeping every cache in step.
    pub fn dig(&mut self, p: Point) {
        if self.cave.at(p) != Some(Terrain::Wall) {
            return;
        }
        self.cave.set(p, Terrain::Floor);
        let cave = &self.cave;
        self.sectors
            .square_changed(p, |mv, q| cave.at(q).is_some_and(|t| mv.passable(t)));
        self.vision
            .square_changed(p, |_, q| cave.blocks_sight(q));
    }

    /// ASCII rendering: `@` player, monster letters, `*` path, `O` portals,
    /// and floor outside the player's view as `,`.
    pub fn render(&mut self, path: &[Point]) -> String {
        let mut out = String::with_capacity(((WIDTH + 1) * HEIGHT) as usize);
        let bounds = self.cave.bounds();
        let monsters: Vec<(Point, char)> = self.monsters.iter().map(|(_, m)| (m.pos, m.ch)).collect();
        for y in bounds.min.y..bounds.max.y {
            for x in bounds.min.x..bounds.max.x {
                let p = Point::new(x, y);
                let ch = if p == self.player {
                    '@'
                } else if let Some(&(_, c)) = monsters.iter().find(|(q, _)| *q == p) {
                    c
                } else if self.portals.other_end(p).is_some() {
                    'O'
                } else if path.contains(&p) {
                    '*'
                } else {
                    match self.cave.at(p) {
                        Some(Terrain::Wall) | None => '#',
                        Some(Terrain::Water) => '~',
                        Some(Terrain::Floor) if self.player_sees(p) => '.',
                        Some(Terrain::Floor) => ',',
                    }
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}
