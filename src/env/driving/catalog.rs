//! Scenario descriptors and the catalog that holds them.

use std::{collections::HashMap, fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogLoadError, ConfigurationError, UnknownScenarioError};

use super::backend::{GeoLocation, Location, Rotation, Transform};

/// Category of a scenario. The discriminant is the observation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Situation {
    Road = 0,
    Roundabout = 1,
    Junction = 2,
    Tunnel = 3,
}

impl Situation {
    pub const ALL: [Situation; 4] = [
        Situation::Road,
        Situation::Roundabout,
        Situation::Junction,
        Situation::Tunnel,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl FromStr for Situation {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Road" => Ok(Situation::Road),
            "Roundabout" => Ok(Situation::Roundabout),
            "Junction" => Ok(Situation::Junction),
            "Tunnel" => Ok(Situation::Tunnel),
            other => Err(ConfigurationError::UnknownSituation(other.to_string())),
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficDensity {
    None,
    Low,
    High,
}

impl FromStr for TrafficDensity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(TrafficDensity::None),
            "Low" => Ok(TrafficDensity::Low),
            "High" => Ok(TrafficDensity::High),
            other => Err(ConfigurationError::UnknownTrafficDensity(other.to_string())),
        }
    }
}

/// Target of a scenario, in both coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPosition {
    pub local: Location,
    pub geodetic: GeoLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDescriptor {
    pub name: String,
    pub situation: Situation,
    pub map: String,
    pub weather: String,
    pub initial_pose: Transform,
    pub target: TargetPosition,
    pub traffic_density: TrafficDensity,
}

// On-disk layout of one scenario entry.
#[derive(Debug, Deserialize)]
struct ScenarioEntry {
    map_name: String,
    weather_condition: String,
    situation: String,
    initial_position: Location,
    #[serde(default)]
    initial_rotation: Rotation,
    target_position: Location,
    target_gnss: GeoLocation,
    #[serde(default = "default_density")]
    traffic_density: String,
}

fn default_density() -> String {
    "None".to_string()
}

impl ScenarioEntry {
    fn into_descriptor(self, name: String) -> Result<ScenarioDescriptor, CatalogLoadError> {
        let parse_err = |source| CatalogLoadError::Descriptor {
            name: name.clone(),
            source,
        };
        let situation = self.situation.parse().map_err(parse_err)?;
        let traffic_density = self.traffic_density.parse().map_err(parse_err)?;

        Ok(ScenarioDescriptor {
            name,
            situation,
            map: self.map_name,
            weather: self.weather_condition,
            initial_pose: Transform {
                location: self.initial_position,
                rotation: self.initial_rotation,
            },
            target: TargetPosition {
                local: self.target_position,
                geodetic: self.target_gnss,
            },
            traffic_density,
        })
    }
}

/// Scenarios keyed by name, in the order of the backing file.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: Vec<ScenarioDescriptor>,
    index: HashMap<String, usize>,
}

impl ScenarioCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogLoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, CatalogLoadError> {
        // serde_json keeps object keys in file order with `preserve_order`
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;

        let scenarios = raw
            .into_iter()
            .map(|(name, value)| {
                let entry: ScenarioEntry = serde_json::from_value(value)?;
                entry.into_descriptor(name)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_descriptors(scenarios))
    }

    pub fn from_descriptors(scenarios: Vec<ScenarioDescriptor>) -> Self {
        let mut catalog = Self::default();
        for descriptor in scenarios {
            match catalog.index.get(&descriptor.name) {
                Some(&i) => catalog.scenarios[i] = descriptor,
                None => {
                    catalog
                        .index
                        .insert(descriptor.name.clone(), catalog.scenarios.len());
                    catalog.scenarios.push(descriptor);
                }
            }
        }

        catalog
    }

    /// Keeps only the given situations. An empty set keeps everything.
    pub fn filter(&self, situations: &[Situation]) -> Self {
        if situations.is_empty() {
            return self.clone();
        }

        Self::from_descriptors(
            self.scenarios
                .iter()
                .filter(|d| situations.contains(&d.situation))
                .cloned()
                .collect(),
        )
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<&ScenarioDescriptor, UnknownScenarioError> {
        self.index
            .get(name)
            .map(|&i| &self.scenarios[i])
            .ok_or_else(|| UnknownScenarioError(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScenarioDescriptor> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
