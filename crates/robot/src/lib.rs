//! Robot description loading and validation.
//!
//! The description file is TOML:
//!
//! ```toml
//! [robot]
//! radius = 1.0      # meters
//! velocity = 1.0    # m/s
//! mass = 120.0      # optional, unused by the planning core
//!
//! [sensor]
//! range = 20.0
//! fov = 6.28
//! pose = { x = 0.1, y = 0.2, z = 0.7, t = 0.0 }
//!
//! [antenna]         # optional, enables communication queries
//! range = 50.0
//! pose = { x = 0.0, y = 0.0, z = 1.2, t = 0.0 }
//!
//! [cost]            # seconds-per-meter weight per terrain class
//! FLAT = 0.0
//! ROUGH = 5.0
//! SLOPE = 3.0
//! ```

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Pose;

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("failed to read robot description: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse robot description: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize robot description: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("robot.{0} must be positive")]
    NonPositive(&'static str),
    #[error("sensor.{0} must be positive")]
    NonPositiveSensor(&'static str),
    #[error("antenna.range must be positive")]
    NonPositiveAntenna,
    #[error("sensor.fov must lie in (0, 2*pi]")]
    FovOutOfRange,
    #[error("cost.{0} must be non-negative")]
    NegativeCost(String),
}

/// Exteroceptive sensor mounted on the body.
///
/// Scalar fields come before the pose table so the description can be
/// written back as TOML.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorModel {
    /// Maximum range in meters
    pub range: f64,
    /// Field of view in radians
    pub fov: f64,
    /// Mount pose relative to the body frame
    pub pose: Pose,
}

/// Communication antenna mounted on the body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AntennaModel {
    pub range: f64,
    pub pose: Pose,
}

/// Robot description consumed by the planning core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotModel {
    /// Body radius in meters
    pub radius: f64,
    /// Nominal forward velocity in m/s
    pub velocity: f64,
    /// Mass in kg; carried for completeness, unused by planning
    pub mass: Option<f64>,
    /// Terrain class name → traversal weight
    pub costs: BTreeMap<String, f64>,
    pub sensor: Option<SensorModel>,
    pub antenna: Option<AntennaModel>,
}

/// On-disk layout of the description file.
#[derive(Debug, Serialize, Deserialize)]
struct FileModel {
    robot: BodySection,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensor: Option<SensorModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    antenna: Option<AntennaModel>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    cost: BTreeMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BodySection {
    radius: f64,
    velocity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    mass: Option<f64>,
}

impl RobotModel {
    /// Minimal model for planning-only use.
    pub fn new(radius: f64, velocity: f64) -> Self {
        Self {
            radius,
            velocity,
            mass: None,
            costs: BTreeMap::new(),
            sensor: None,
            antenna: None,
        }
    }

    /// Load and validate a TOML description file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RobotError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML description.
    pub fn from_toml_str(text: &str) -> Result<Self, RobotError> {
        let file: FileModel = toml::from_str(text)?;
        let model = Self {
            radius: file.robot.radius,
            velocity: file.robot.velocity,
            mass: file.robot.mass,
            costs: file.cost,
            sensor: file.sensor,
            antenna: file.antenna,
        };
        model.validate()?;
        Ok(model)
    }

    /// Write the description back to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RobotError> {
        let file = FileModel {
            robot: BodySection {
                radius: self.radius,
                velocity: self.velocity,
                mass: self.mass,
            },
            sensor: self.sensor,
            antenna: self.antenna,
            cost: self.costs.clone(),
        };
        std::fs::write(path, toml::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Check the numeric constraints of the description format.
    pub fn validate(&self) -> Result<(), RobotError> {
        if self.radius <= 0.0 {
            return Err(RobotError::NonPositive("radius"));
        }
        if self.velocity <= 0.0 {
            return Err(RobotError::NonPositive("velocity"));
        }
        if let Some(mass) = self.mass {
            if mass <= 0.0 {
                return Err(RobotError::NonPositive("mass"));
            }
        }
        if let Some(sensor) = &self.sensor {
            if sensor.range <= 0.0 {
                return Err(RobotError::NonPositiveSensor("range"));
            }
            if sensor.fov <= 0.0 || sensor.fov > 2.0 * PI {
                return Err(RobotError::FovOutOfRange);
            }
        }
        if let Some(antenna) = &self.antenna {
            if antenna.range <= 0.0 {
                return Err(RobotError::NonPositiveAntenna);
            }
        }
        for (class, weight) in &self.costs {
            if *weight < 0.0 {
                return Err(RobotError::NegativeCost(class.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FULL: &str = r#"
        [robot]
        radius = 1.0
        velocity = 2.0
        mass = 120.0

        [sensor]
        range = 20.0
        fov = 6.28
        pose = { x = 0.1, y = 0.2, z = 0.7, t = 0.0 }

        [antenna]
        range = 50.0
        pose = { x = 0.0, y = 0.0, z = 1.2, t = 0.0 }

        [cost]
        FLAT = 0.0
        ROUGH = 5.0
        SLOPE = 3.0
    "#;

    #[test]
    fn test_parse_full_description() {
        let model = RobotModel::from_toml_str(FULL).unwrap();
        assert_relative_eq!(model.radius, 1.0);
        assert_relative_eq!(model.velocity, 2.0);
        assert_relative_eq!(model.mass.unwrap(), 120.0);
        let sensor = model.sensor.unwrap();
        assert_relative_eq!(sensor.range, 20.0);
        assert_relative_eq!(sensor.pose.z, 0.7);
        assert!(model.antenna.is_some());
        assert_relative_eq!(model.costs["ROUGH"], 5.0);
        assert_eq!(model.costs.len(), 3);
    }

    #[test]
    fn test_parse_minimal_description() {
        let model = RobotModel::from_toml_str(
            "[robot]\nradius = 0.5\nvelocity = 1.5\n",
        )
        .unwrap();
        assert!(model.sensor.is_none());
        assert!(model.antenna.is_none());
        assert!(model.costs.is_empty());
    }

    #[test]
    fn test_reject_non_positive_radius() {
        let err = RobotModel::from_toml_str("[robot]\nradius = 0.0\nvelocity = 1.0\n")
            .unwrap_err();
        assert!(matches!(err, RobotError::NonPositive("radius")));
    }

    #[test]
    fn test_reject_non_positive_velocity() {
        let err = RobotModel::from_toml_str("[robot]\nradius = 1.0\nvelocity = -2.0\n")
            .unwrap_err();
        assert!(matches!(err, RobotError::NonPositive("velocity")));
    }

    #[test]
    fn test_reject_fov_out_of_range() {
        let text = r#"
            [robot]
            radius = 1.0
            velocity = 1.0

            [sensor]
            range = 10.0
            fov = 7.0
            pose = { x = 0.0, y = 0.0, z = 0.0, t = 0.0 }
        "#;
        assert!(matches!(
            RobotModel::from_toml_str(text).unwrap_err(),
            RobotError::FovOutOfRange
        ));
    }

    #[test]
    fn test_reject_negative_cost_weight() {
        let text = "[robot]\nradius = 1.0\nvelocity = 1.0\n\n[cost]\nROUGH = -1.0\n";
        assert!(matches!(
            RobotModel::from_toml_str(text).unwrap_err(),
            RobotError::NegativeCost(_)
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robot.toml");

        let model = RobotModel::from_toml_str(FULL).unwrap();
        model.save(&path).unwrap();
        let reloaded = RobotModel::load(&path).unwrap();

        assert_relative_eq!(reloaded.radius, model.radius);
        assert_relative_eq!(reloaded.velocity, model.velocity);
        assert_relative_eq!(reloaded.mass.unwrap(), model.mass.unwrap());
        assert_relative_eq!(
            reloaded.sensor.unwrap().pose.theta,
            model.sensor.unwrap().pose.theta
        );
        assert_eq!(reloaded.costs, model.costs);
        assert_relative_eq!(
            reloaded.antenna.unwrap().range,
            model.antenna.unwrap().range
        );
    }

    #[test]
    fn test_missing_robot_section_is_parse_error() {
        assert!(matches!(
            RobotModel::from_toml_str("[sensor]\nrange = 1.0\n").unwrap_err(),
            RobotError::Parse(_)
        ));
    }
}
