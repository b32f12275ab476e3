//! # Celestial Chunk Generator
//!
//! `generate` is a pure function of `(UniverseSeed, ChunkIndex, tables)`.
//! It touches no shared state and can run on any thread.
//!
//! ## Passes
//!
//! 1. **Systems**: every cell of the chunk gets its own ChaCha stream
//!    seeded from `(seed, x, y)`. The stream rolls existence, depth (`z`),
//!    type, name and then the whole planet / satellite tree.
//! 2. **Constellations**: a chunk-seeded stream walks between systems of the
//!    chunk, placing lines that respect length and angle limits.
//!
//! Because each cell owns its stream, a system never depends on its
//! neighbours, and regenerating a chunk is byte-identical.

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::chunk::{CelestialChunk, CelestialPlanet, CelestialSystem, ChunkIndex, ConstellationLine};
use crate::coordinate::{CelestialCoordinate, SystemLocation};
use crate::noise::{NoiseField, UniverseSeed};
use crate::parameters::{CelestialParameters, FieldValue, OrbitGeometry, VisitableParameters};
use crate::tables::{
    BodyType, GenerationTables, OrbitRegion, SystemType, VisitableTemplate, WeightedName,
};

/// Sub-seed purposes. Changing any of these changes the universe.
const SYSTEM_STREAM: u64 = 0x5359_5354;
const CONSTELLATION_STREAM: u64 = 0x434f_4e53;
const TYPE_NOISE_STREAM: u64 = 0x5459_5045;
const BODY_SEED_STREAM: u64 = 0x424f_4459;

/// Field key holding the orbit region name of a planet.
pub const ORBIT_REGION_FIELD: &str = "orbit_region";

/// Deterministic generator of celestial chunks.
pub struct CelestialChunkGenerator {
    tables: Arc<GenerationTables>,
    seed: UniverseSeed,
    type_noise: NoiseField,
}

impl CelestialChunkGenerator {
    /// Creates a generator over validated tables.
    #[must_use]
    pub fn new(tables: Arc<GenerationTables>, seed: UniverseSeed) -> Self {
        Self {
            type_noise: NoiseField::new(seed.derive(TYPE_NOISE_STREAM), tables.system_type_noise),
            tables,
            seed,
        }
    }

    /// The tables this generator reads.
    #[inline]
    #[must_use]
    pub fn tables(&self) -> &GenerationTables {
        &self.tables
    }

    /// The universe seed.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> UniverseSeed {
        self.seed
    }

    /// Generates every system of a chunk plus its constellations.
    #[must_use]
    pub fn generate(&self, index: ChunkIndex) -> CelestialChunk {
        let region = index.region(self.tables.chunk_size);
        let mut chunk = CelestialChunk::new(index);

        for y in region.min_y..region.max_y {
            for x in region.min_x..region.max_x {
                if let Some(system) = self.generate_system(x, y) {
                    chunk.systems.insert(system.parameters.coordinate.location(), system);
                }
            }
        }

        chunk.constellations = self.generate_constellations(&chunk);

        tracing::debug!(
            "Generated celestial chunk ({}, {}): {} systems, {} bodies, {} constellation lines",
            index.x,
            index.y,
            chunk.systems.len(),
            chunk.body_count(),
            chunk.constellations.len()
        );

        chunk
    }

    /// Generates the system in cell `(x, y)`, if the cell holds one.
    #[must_use]
    pub fn generate_system(&self, x: i32, y: i32) -> Option<CelestialSystem> {
        let tables = &*self.tables;
        let [xy_lo, xy_hi] = tables.xy_coord_range;
        if x < xy_lo || x > xy_hi || y < xy_lo || y > xy_hi {
            return None;
        }

        let cell_seed = self.seed.derive(SYSTEM_STREAM).mix(&[x, y]);
        let mut rng = ChaCha8Rng::seed_from_u64(cell_seed.value());
        if !roll(&mut rng, tables.system_probability) {
            return None;
        }

        let [z_lo, z_hi] = tables.z_coord_range;
        let location = SystemLocation::new(x, y, rng.gen_range(z_lo..=z_hi));
        if location.is_origin() {
            return None;
        }

        let type_name = self.pick_system_type(x, y, &mut rng)?;
        let system_type = tables.system_types.get(type_name)?;

        let coordinate = CelestialCoordinate::system_at(location);
        let name = self.system_name(&mut rng);
        let body_seed = self.body_seed(&coordinate);
        let mut parameters = CelestialParameters::new(coordinate, body_seed, name, type_name);
        parameters.imagery.clone_from(&system_type.imagery);
        parameters.fields.clone_from(&system_type.fields);

        let planets = if tables.max_orbital_depth >= 1 {
            self.generate_planets(&mut rng, &parameters, system_type)
        } else {
            BTreeMap::new()
        };

        Some(CelestialSystem { parameters, planets })
    }

    /// Seed handed to downstream generators for one body.
    #[must_use]
    pub fn body_seed(&self, coordinate: &CelestialCoordinate) -> u64 {
        let SystemLocation { x, y, z } = coordinate.location();
        self.seed
            .derive(BODY_SEED_STREAM)
            .mix(&[x, y, z, coordinate.planet_orbit(), coordinate.satellite_orbit()])
            .value()
    }

    fn pick_system_type(&self, x: i32, y: i32, rng: &mut ChaCha8Rng) -> Option<&str> {
        let value = self.type_noise.value_at(x, y);

        let bins = &self.tables.system_type_bins;
        let bin = bins.iter().find(|bin| value <= bin.max_noise).or_else(|| bins.last())?;
        pick_weighted(&bin.types, rng)
    }

    fn system_name(&self, rng: &mut ChaCha8Rng) -> String {
        let naming = &self.tables.naming;
        let prefix = pick_uniform(&naming.system_prefixes, rng).unwrap_or("Unnamed");
        let name = pick_uniform(&naming.system_names, rng).unwrap_or("System");
        if roll(rng, naming.numbered_probability) {
            format!("{prefix} {name} {}", rng.gen_range(1..=999))
        } else {
            format!("{prefix} {name}")
        }
    }

    fn generate_planets(
        &self,
        rng: &mut ChaCha8Rng,
        system: &CelestialParameters,
        system_type: &SystemType,
    ) -> BTreeMap<i32, CelestialPlanet> {
        let tables = &*self.tables;
        let mut planets = BTreeMap::new();

        for region in &system_type.orbit_regions {
            let [first, last] = region.orbit_range;
            for orbit in first..=last.min(tables.planet_orbit_count) {
                // Overlapping regions: the inner region owns the orbit.
                if planets.contains_key(&orbit) || !roll(rng, region.body_probability) {
                    continue;
                }
                let Some(type_name) = pick_weighted(&region.planet_types, rng) else {
                    continue;
                };
                let Some(body_type) = tables.planetary_types.get(type_name) else {
                    continue;
                };
                let Ok(coordinate) = system.coordinate.child(orbit) else {
                    continue;
                };

                let numeral = suffix(&tables.naming.planet_suffixes, orbit);
                let name = format!("{} {numeral}", system.name);
                let mut parameters = self.body_parameters(
                    rng,
                    coordinate,
                    name,
                    type_name,
                    body_type,
                    tables.planet_orbit_spacing,
                );
                parameters
                    .fields
                    .insert(ORBIT_REGION_FIELD.to_string(), FieldValue::Text(region.name.clone()));

                let satellites = if tables.max_orbital_depth >= 2 {
                    self.generate_satellites(rng, &parameters, region)
                } else {
                    BTreeMap::new()
                };

                planets.insert(orbit, CelestialPlanet { parameters, satellites });
            }
        }

        planets
    }

    fn generate_satellites(
        &self,
        rng: &mut ChaCha8Rng,
        planet: &CelestialParameters,
        region: &OrbitRegion,
    ) -> BTreeMap<i32, CelestialParameters> {
        let tables = &*self.tables;
        let mut satellites = BTreeMap::new();

        for orbit in 1..=tables.satellite_orbit_count {
            if !roll(rng, region.satellite_probability) {
                continue;
            }
            let Some(type_name) = pick_weighted(&region.satellite_types, rng) else {
                continue;
            };
            let Some(body_type) = tables.satellite_types.get(type_name) else {
                continue;
            };
            let Ok(coordinate) = planet.coordinate.child(orbit) else {
                continue;
            };

            let letter = suffix(&tables.naming.satellite_suffixes, orbit);
            let name = format!("{} {letter}", planet.name);
            let parameters = self.body_parameters(
                rng,
                coordinate,
                name,
                type_name,
                body_type,
                tables.satellite_orbit_spacing,
            );
            satellites.insert(orbit, parameters);
        }

        satellites
    }

    fn body_parameters(
        &self,
        rng: &mut ChaCha8Rng,
        coordinate: CelestialCoordinate,
        name: String,
        type_name: &str,
        body_type: &BodyType,
        spacing: f32,
    ) -> CelestialParameters {
        let orbit_number = coordinate.orbit_number();
        let body_seed = self.body_seed(&coordinate);
        let mut parameters = CelestialParameters::new(coordinate, body_seed, name, type_name);
        parameters.imagery.clone_from(&body_type.imagery);
        parameters.fields.clone_from(&body_type.fields);
        parameters.orbit = Some(OrbitGeometry {
            orbit_number,
            radius: (orbit_number as f32 + rng.gen_range(-0.25f32..=0.25)) * spacing,
            phase: rng.gen_range(0.0..TAU),
        });
        parameters.visitable =
            body_type.visitable.as_ref().map(|template| visitable(rng, template));
        parameters
    }

    fn generate_constellations(&self, chunk: &CelestialChunk) -> Vec<ConstellationLine> {
        let rules = &self.tables.constellations;
        let candidates: Vec<(i32, i32)> = chunk.systems.keys().map(|loc| loc.xy()).collect();
        if candidates.len() < 2 {
            return Vec::new();
        }

        let mut rng = ChaCha8Rng::seed_from_u64(
            self.seed
                .derive(CONSTELLATION_STREAM)
                .mix(&[chunk.index.x, chunk.index.y])
                .value(),
        );
        if !roll(&mut rng, rules.probability) {
            return Vec::new();
        }

        let [min_lines, max_lines] = rules.line_count_range;
        let target = rng.gen_range(min_lines..=max_lines) as usize;
        let max_cos = rules.min_line_closeness.cos();

        let mut lines: Vec<ConstellationLine> = Vec::with_capacity(target);
        let mut current = candidates[rng.gen_range(0..candidates.len())];
        let mut failures = 0;

        while lines.len() < target && failures < rules.max_tries {
            let next = candidates[rng.gen_range(0..candidates.len())];
            let line = ConstellationLine { start: current, end: next };
            if line_fits(&line, &lines, rules.min_line_length, rules.max_line_length, max_cos) {
                lines.push(line);
                current = next;
                failures = 0;
            } else {
                failures += 1;
            }
        }

        lines
    }
}

fn line_fits(
    line: &ConstellationLine,
    existing: &[ConstellationLine],
    min_len: f64,
    max_len: f64,
    max_cos: f64,
) -> bool {
    if line.start == line.end {
        return false;
    }
    let length = distance(line.start, line.end);
    if length < min_len || length > max_len {
        return false;
    }

    existing.iter().all(|other| {
        if other.same_segment(line) {
            return false;
        }
        // Lines meeting at a star must open at least `min_line_closeness`.
        let shared = [line.start, line.end]
            .into_iter()
            .find(|p| *p == other.start || *p == other.end);
        match shared {
            None => true,
            Some(vertex) => {
                let a = if line.start == vertex { line.end } else { line.start };
                let b = if other.start == vertex { other.end } else { other.start };
                cos_at(vertex, a, b) <= max_cos
            }
        }
    })
}

fn distance(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = f64::from(b.0) - f64::from(a.0);
    let dy = f64::from(b.1) - f64::from(a.1);
    (dx * dx + dy * dy).sqrt()
}

fn cos_at(vertex: (i32, i32), a: (i32, i32), b: (i32, i32)) -> f64 {
    let (ax, ay) = (f64::from(a.0) - f64::from(vertex.0), f64::from(a.1) - f64::from(vertex.1));
    let (bx, by) = (f64::from(b.0) - f64::from(vertex.0), f64::from(b.1) - f64::from(vertex.1));
    (ax * bx + ay * by) / (distance(vertex, a) * distance(vertex, b))
}

fn visitable(rng: &mut ChaCha8Rng, template: &VisitableTemplate) -> VisitableParameters {
    VisitableParameters {
        world_type: template.world_type.clone(),
        threat_level: roll_range(rng, template.threat_range),
        world_size: template.world_size,
        gravity: roll_range(rng, template.gravity_range),
        primary_biome: pick_uniform(&template.biomes, rng).unwrap_or("barren").to_string(),
    }
}

fn suffix(suffixes: &[String], orbit: i32) -> String {
    usize::try_from(orbit - 1)
        .ok()
        .and_then(|i| suffixes.get(i))
        .cloned()
        .unwrap_or_else(|| orbit.to_string())
}

/// Rolls a probability; values outside `[0, 1]` saturate.
pub(crate) fn roll<R: Rng>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

fn roll_range<R: Rng>(rng: &mut R, [lo, hi]: [f32; 2]) -> f32 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}

/// Weighted pick; `None` if every weight is zero.
pub(crate) fn pick_weighted<'a, R: Rng>(pool: &'a [WeightedName], rng: &mut R) -> Option<&'a str> {
    let total: f64 = pool.iter().map(|e| e.weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut remaining = rng.gen::<f64>() * total;
    for entry in pool {
        let weight = entry.weight.max(0.0);
        if remaining < weight {
            return Some(entry.name.as_str());
        }
        remaining -= weight;
    }
    pool.iter().rev().find(|e| e.weight > 0.0).map(|e| e.name.as_str())
}

pub(crate) fn pick_uniform<'a, R: Rng>(pool: &'a [String], rng: &mut R) -> Option<&'a str> {
    if pool.is_empty() {
        None
    } else {
        Some(pool[rng.gen_range(0..pool.len())].as_str())
    }
}
