//! # Generation Tables
//!
//! Immutable configuration consumed by the chunk generator: type weights,
//! orbit-region tables, naming pools and constellation limits.
//!
//! Tables are resolved once at startup (from TOML or the built-in default
//! universe), validated, and then shared as `Arc<GenerationTables>`. Nothing
//! mutates them afterwards; changing them changes the universe.
//!
//! ## Example
//!
//! ```toml
//! chunk_size = 64
//! system_probability = 0.01
//!
//! [[system_type_bins]]
//! max_noise = 1.0
//! types = [{ weight = 1.0, name = "yellow" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CelestialError, CelestialResult};
use crate::parameters::FieldValue;

/// One entry of a weighted pick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedName {
    /// Relative weight (non-negative).
    pub weight: f64,
    /// Type name the entry resolves to.
    pub name: String,
}

impl WeightedName {
    /// Creates a weighted entry.
    #[must_use]
    pub fn new(weight: f64, name: impl Into<String>) -> Self {
        Self { weight, name: name.into() }
    }
}

/// Octaved simplex settings for system type clustering.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Base frequency in cells.
    pub frequency: f64,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude decay per octave.
    pub persistence: f64,
    /// Frequency growth per octave.
    pub lacunarity: f64,
}

/// Noise band mapped to a weighted list of system types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemTypeBin {
    /// Upper bound of the noise band (bins are sorted ascending).
    pub max_noise: f64,
    /// System types chosen inside this band.
    pub types: Vec<WeightedName>,
}

/// Range of orbits with shared body odds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitRegion {
    /// Region label, copied into the body's fields.
    pub name: String,
    /// Inclusive orbit range.
    pub orbit_range: [i32; 2],
    /// Chance that an orbit in this region holds a planet.
    pub body_probability: f64,
    /// Planetary types for this region.
    pub planet_types: Vec<WeightedName>,
    /// Chance that a satellite orbit around such a planet is occupied.
    #[serde(default)]
    pub satellite_probability: f64,
    /// Satellite types for planets of this region.
    #[serde(default)]
    pub satellite_types: Vec<WeightedName>,
}

/// A system (star) type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemType {
    /// Imagery keys for the star.
    #[serde(default)]
    pub imagery: Vec<String>,
    /// Extra fields copied into the system parameters.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Orbit regions, inner to outer.
    #[serde(default)]
    pub orbit_regions: Vec<OrbitRegion>,
}

/// Template for the visitable descriptor of a body type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisitableTemplate {
    /// World template name.
    pub world_type: String,
    /// Inclusive threat level range.
    pub threat_range: [f32; 2],
    /// World size in tiles.
    pub world_size: [u32; 2],
    /// Inclusive gravity range.
    pub gravity_range: [f32; 2],
    /// Biome pool; one is picked per world.
    pub biomes: Vec<String>,
}

/// A planetary or satellite type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyType {
    /// Imagery keys.
    #[serde(default)]
    pub imagery: Vec<String>,
    /// Extra fields copied into the body parameters.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    /// Present if bodies of this type can be entered.
    #[serde(default)]
    pub visitable: Option<VisitableTemplate>,
}

/// Constellation line limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstellationTables {
    /// Chance that a chunk carries a constellation.
    pub probability: f64,
    /// Inclusive range of lines per constellation.
    pub line_count_range: [u32; 2],
    /// Failed placements before a constellation is abandoned.
    pub max_tries: u32,
    /// Minimum line length in cells.
    pub min_line_length: f64,
    /// Maximum line length in cells.
    pub max_line_length: f64,
    /// Minimum angle, in radians, between two lines sharing a star.
    pub min_line_closeness: f64,
}

/// Name pools.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NamingTables {
    /// First word of a system name.
    pub system_prefixes: Vec<String>,
    /// Second word of a system name.
    pub system_names: Vec<String>,
    /// Chance that a catalog number is appended to the system name.
    pub numbered_probability: f64,
    /// Planet suffix by orbit (1-based); falls back to the orbit number.
    pub planet_suffixes: Vec<String>,
    /// Satellite suffix by orbit (1-based); falls back to the orbit number.
    pub satellite_suffixes: Vec<String>,
}

/// Complete generation configuration of a universe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationTables {
    /// Side of a chunk in cells.
    pub chunk_size: i32,
    /// Inclusive valid range of the X and Y axes.
    pub xy_coord_range: [i32; 2],
    /// Inclusive range systems roll their Z from.
    pub z_coord_range: [i32; 2],
    /// Number of planetary orbit slots.
    pub planet_orbit_count: i32,
    /// Number of satellite orbit slots around a planet.
    pub satellite_orbit_count: i32,
    /// 0 = bare stars, 1 = planets, 2 = planets and satellites.
    pub max_orbital_depth: u32,
    /// Chance that a cell holds a system.
    pub system_probability: f64,
    /// Distance between planetary orbits.
    pub planet_orbit_spacing: f32,
    /// Distance between satellite orbits.
    pub satellite_orbit_spacing: f32,
    /// Clustering noise for system types.
    pub system_type_noise: NoiseSettings,
    /// Noise bands, ascending by `max_noise`.
    pub system_type_bins: Vec<SystemTypeBin>,
    /// System types by name.
    pub system_types: BTreeMap<String, SystemType>,
    /// Planetary types by name.
    pub planetary_types: BTreeMap<String, BodyType>,
    /// Satellite types by name.
    pub satellite_types: BTreeMap<String, BodyType>,
    /// Constellation limits.
    pub constellations: ConstellationTables,
    /// Name pools.
    pub naming: NamingTables,
}

impl GenerationTables {
    /// Parses and validates tables from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` on syntax errors or failed validation.
    pub fn from_toml_str(text: &str) -> CelestialResult<Self> {
        let tables: Self = toml::from_str(text)
            .map_err(|e| CelestialError::InvalidConfig(format!("generation tables: {e}")))?;
        tables.validate()?;
        Ok(tables)
    }

    /// Reads, parses and validates tables from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> CelestialResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CelestialError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first problem found.
    pub fn validate(&self) -> CelestialResult<()> {
        let invalid = |msg: String| Err(CelestialError::InvalidConfig(msg));

        if self.chunk_size <= 0 {
            return invalid(format!("chunk_size must be positive, got {}", self.chunk_size));
        }
        let ranges = [
            ("xy_coord_range", self.xy_coord_range),
            ("z_coord_range", self.z_coord_range),
        ];
        for (label, [lo, hi]) in ranges {
            if lo > hi {
                return invalid(format!("{label} is inverted: [{lo}, {hi}]"));
            }
        }
        if self.planet_orbit_count < 0 || self.satellite_orbit_count < 0 {
            return invalid("orbit counts must not be negative".into());
        }
        if self.max_orbital_depth > 2 {
            return invalid(format!("max_orbital_depth {} exceeds 2", self.max_orbital_depth));
        }
        check_probability("system_probability", self.system_probability)?;
        check_probability("constellations.probability", self.constellations.probability)?;
        check_probability("naming.numbered_probability", self.naming.numbered_probability)?;

        if self.system_type_bins.is_empty() {
            return invalid("system_type_bins is empty".into());
        }
        if self.system_type_bins.windows(2).any(|w| w[0].max_noise > w[1].max_noise) {
            return invalid("system_type_bins must be sorted by max_noise".into());
        }
        for bin in &self.system_type_bins {
            check_pool("system_type_bins", &bin.types, &self.system_types)?;
        }

        for (name, system) in &self.system_types {
            for region in &system.orbit_regions {
                let [first, last] = region.orbit_range;
                if first < 1 || first > last || last > self.planet_orbit_count {
                    return invalid(format!(
                        "system type {name}: orbit region {} range [{first}, {last}] \
                         outside 1..={}",
                        region.name, self.planet_orbit_count
                    ));
                }
                check_probability("body_probability", region.body_probability)?;
                check_probability("satellite_probability", region.satellite_probability)?;
                check_pool(&region.name, &region.planet_types, &self.planetary_types)?;
                check_pool(&region.name, &region.satellite_types, &self.satellite_types)?;
            }
        }

        let lines = &self.constellations;
        if lines.line_count_range[0] > lines.line_count_range[1] {
            return invalid("constellations.line_count_range is inverted".into());
        }
        if lines.min_line_length < 0.0 || lines.min_line_length > lines.max_line_length {
            return invalid("constellation line length bounds are inconsistent".into());
        }

        if self.naming.system_prefixes.is_empty() || self.naming.system_names.is_empty() {
            return invalid("naming pools must not be empty".into());
        }

        Ok(())
    }
}

fn check_probability(label: &str, value: f64) -> CelestialResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CelestialError::InvalidConfig(format!("{label} = {value} is not a probability")))
    }
}

fn check_pool<T>(
    label: &str,
    pool: &[WeightedName],
    known: &BTreeMap<String, T>,
) -> CelestialResult<()> {
    for entry in pool {
        if entry.weight.is_nan() || entry.weight < 0.0 {
            return Err(CelestialError::InvalidConfig(format!(
                "{label}: negative weight for {}",
                entry.name
            )));
        }
        if !known.contains_key(&entry.name) {
            return Err(CelestialError::InvalidConfig(format!(
                "{label}: unknown type {}",
                entry.name
            )));
        }
    }
    Ok(())
}

impl Default for GenerationTables {
    /// The stock universe.
    fn default() -> Self {
        let star = |imagery: &str, temperature: i64, regions: Vec<OrbitRegion>| SystemType {
            imagery: vec![format!("stars/{imagery}")],
            fields: BTreeMap::from([("temperature".to_string(), FieldValue::Integer(temperature))]),
            orbit_regions: regions,
        };

        let standard_regions = || {
            vec![
                OrbitRegion {
                    name: "inner".into(),
                    orbit_range: [1, 3],
                    body_probability: 0.5,
                    planet_types: weights(&[(3.0, "barren"), (2.0, "desert"), (1.0, "magma")]),
                    satellite_probability: 0.2,
                    satellite_types: weights(&[(1.0, "moon"), (1.0, "asteroid")]),
                },
                OrbitRegion {
                    name: "habitable".into(),
                    orbit_range: [4, 6],
                    body_probability: 0.6,
                    planet_types: weights(&[
                        (2.0, "garden"),
                        (1.0, "ocean"),
                        (2.0, "forest"),
                        (1.0, "barren"),
                    ]),
                    satellite_probability: 0.3,
                    satellite_types: weights(&[(2.0, "moon")]),
                },
                OrbitRegion {
                    name: "outer".into(),
                    orbit_range: [7, 10],
                    body_probability: 0.5,
                    planet_types: weights(&[(3.0, "gas_giant"), (1.0, "tundra"), (2.0, "ice")]),
                    satellite_probability: 0.6,
                    satellite_types: weights(&[
                        (2.0, "moon"),
                        (2.0, "ice_moon"),
                        (1.0, "asteroid"),
                    ]),
                },
            ]
        };

        let system_types = BTreeMap::from([
            ("red".to_string(), star("red", 3_200, standard_regions())),
            ("yellow".to_string(), star("yellow", 5_800, standard_regions())),
            ("white".to_string(), star("white", 8_500, standard_regions())),
            ("blue".to_string(), star("blue", 20_000, standard_regions())),
            ("black_hole".to_string(), star("black_hole", 0, Vec::new())),
        ]);

        let planetary_types = BTreeMap::from([
            body("barren", Some(world("barren", [1.0, 3.0], [0.6, 1.2], &["rock", "crater"]))),
            body("desert", Some(world("desert", [2.0, 4.0], [0.8, 1.1], &["dunes", "mesa"]))),
            body("magma", Some(world("magma", [5.0, 7.0], [0.9, 1.4], &["lava", "obsidian"]))),
            body("garden", Some(world("garden", [1.0, 2.0], [0.9, 1.1], &["meadow", "savanna"]))),
            body("ocean", Some(world("ocean", [2.0, 3.0], [0.9, 1.0], &["reef", "archipelago"]))),
            body("forest", Some(world("forest", [1.0, 3.0], [0.9, 1.1], &["forest", "jungle"]))),
            body("tundra", Some(world("tundra", [3.0, 5.0], [0.8, 1.2], &["snow", "taiga"]))),
            body("ice", Some(world("ice", [3.0, 5.0], [0.7, 1.0], &["glacier", "ice"]))),
            body("gas_giant", None),
        ]);

        let satellite_types = BTreeMap::from([
            body("moon", Some(world("moon", [1.0, 4.0], [0.2, 0.5], &["regolith"]))),
            body("ice_moon", Some(world("ice_moon", [2.0, 5.0], [0.2, 0.4], &["ice"]))),
            body("asteroid", Some(world("asteroid", [1.0, 6.0], [0.05, 0.2], &["asteroid_field"]))),
        ]);

        Self {
            chunk_size: 64,
            xy_coord_range: [-100_000_000, 100_000_000],
            z_coord_range: [-10_000_000, 10_000_000],
            planet_orbit_count: 10,
            satellite_orbit_count: 4,
            max_orbital_depth: 2,
            system_probability: 0.01,
            planet_orbit_spacing: 12.0,
            satellite_orbit_spacing: 1.5,
            system_type_noise: NoiseSettings {
                frequency: 1.0 / 256.0,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            system_type_bins: vec![
                SystemTypeBin {
                    max_noise: -0.3,
                    types: weights(&[(6.0, "red"), (2.0, "yellow"), (1.0, "white")]),
                },
                SystemTypeBin {
                    max_noise: 0.3,
                    types: weights(&[(5.0, "yellow"), (2.0, "red"), (2.0, "white"), (1.0, "blue")]),
                },
                SystemTypeBin {
                    max_noise: 1.0,
                    types: weights(&[
                        (4.0, "blue"),
                        (3.0, "white"),
                        (1.0, "yellow"),
                        (0.2, "black_hole"),
                    ]),
                },
            ],
            system_types,
            planetary_types,
            satellite_types,
            constellations: ConstellationTables {
                probability: 0.4,
                line_count_range: [3, 7],
                max_tries: 30,
                min_line_length: 6.0,
                max_line_length: 40.0,
                min_line_closeness: 0.5,
            },
            naming: NamingTables {
                system_prefixes: strings(&[
                    "Alpha", "Beta", "Gamma", "Delta", "Sigma", "Tau", "Omicron", "Zeta",
                ]),
                system_names: strings(&[
                    "Nesta", "Vorl", "Ixion", "Kepra", "Maelis", "Orun", "Taphor", "Yrsa", "Calder",
                    "Huvane",
                ]),
                numbered_probability: 0.3,
                planet_suffixes: strings(&[
                    "I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X",
                ]),
                satellite_suffixes: strings(&["a", "b", "c", "d", "e", "f"]),
            },
        }
    }
}

fn weights(entries: &[(f64, &str)]) -> Vec<WeightedName> {
    entries.iter().map(|&(w, name)| WeightedName::new(w, name)).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

fn body(name: &str, visitable: Option<VisitableTemplate>) -> (String, BodyType) {
    (
        name.to_string(),
        BodyType {
            imagery: vec![format!("bodies/{name}")],
            fields: BTreeMap::new(),
            visitable,
        },
    )
}

fn world(
    world_type: &str,
    threat: [f32; 2],
    gravity: [f32; 2],
    biomes: &[&str],
) -> VisitableTemplate {
    VisitableTemplate {
        world_type: world_type.to_string(),
        threat_range: threat,
        world_size: [3000, 2000],
        gravity_range: gravity,
        biomes: strings(biomes),
    }
}
