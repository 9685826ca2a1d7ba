//! Shared fixtures: 9x9 terrain rasters and robot descriptions.

use raster::Raster;
use robot::RobotModel;

pub const FLAT: &str = "FLAT";
pub const OBSTACLE: &str = "OBSTACLE";
pub const NO_3D_CLASS: &str = "NO_3D_CLASS";

/// 9x9 classification raster, FLAT probability 1 everywhere.
pub fn flat_region() -> Raster {
    let mut region = Raster::new(3, 9, 9);
    region.set_band_name(0, FLAT);
    region.set_band_name(1, OBSTACLE);
    region.set_band_name(2, NO_3D_CLASS);
    region.band_mut(FLAT).unwrap().fill(1.0);
    region
}

/// Mark one cell as an obstacle with the given confidence.
pub fn add_obstacle(region: &mut Raster, u: usize, v: usize, confidence: f32) {
    let idx = u + v * 9;
    region.band_mut(FLAT).unwrap()[idx] = 1.0 - confidence;
    region.band_mut(OBSTACLE).unwrap()[idx] = confidence;
}

/// Mark one cell as unknown terrain.
pub fn add_unknown(region: &mut Raster, u: usize, v: usize) {
    let idx = u + v * 9;
    region.band_mut(FLAT).unwrap()[idx] = 0.0;
    region.band_mut(NO_3D_CLASS).unwrap()[idx] = 1.0;
}

/// The planning scenario: an obstacle wall on row 5, columns 1..8,
/// leaving a gap along the west border.
pub fn walled_region() -> Raster {
    let mut region = flat_region();
    for u in 1..8 {
        add_obstacle(&mut region, u, 5, 0.8);
    }
    region
}

/// The exploration scenario: unknown strips at the top and bottom, a
/// three-cell obstacle wall in the middle, and an obstacle below the
/// seed inside the bottom strip.
pub fn exploration_region() -> Raster {
    let mut region = flat_region();
    for u in 0..9 {
        add_unknown(&mut region, u, 0);
        add_unknown(&mut region, u, 8);
    }
    for u in 3..=5 {
        add_obstacle(&mut region, u, 5, 0.8);
    }
    add_obstacle(&mut region, 4, 8, 0.8);
    region
}

/// 9x9 elevation model with a wall along column 5 and three bumps.
pub fn wall_dtm() -> Raster {
    let mut dtm = Raster::new(2, 9, 9);
    dtm.set_band_name(0, "Z_MAX");
    dtm.set_band_name(1, "N_POINTS");
    let z = dtm.band_mut("Z_MAX").unwrap();
    z.fill(0.5);
    for v in 0..9 {
        z[5 + v * 9] = 1.3;
    }
    z[8] = 1.9;
    z[8 + 8 * 9] = 1.1;
    z[5 * 9] = 0.6;
    let n = dtm.band_mut("N_POINTS").unwrap();
    n.fill(5.0);
    for v in 0..9 {
        n[3 + v * 9] = 0.0;
    }
    n[8 + 5 * 9] = 0.0;
    dtm
}

/// Unit robot used by the planning scenarios.
pub fn unit_robot() -> RobotModel {
    RobotModel::from_toml_str(
        r#"
        [robot]
        radius = 1.0
        velocity = 1.0

        [sensor]
        range = 20.0
        fov = 6.28
        pose = { x = 0.1, y = 0.2, z = 0.7, t = 0.0 }

        [cost]
        FLAT = 0.0
        "#,
    )
    .unwrap()
}
