//! Shared geometric types for the navigation stack.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 2D point in map coordinates (meters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance. Cheaper than `distance` when only
    /// comparing candidates.
    pub fn distance_sq(&self, other: &Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Point2) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

/// 3D point (meters). Used for visibility and communication queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Drop the z component.
    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Pose relative to a parent frame: position plus heading.
///
/// Configuration files spell the heading `t` (see the robot description
/// format), hence the serde rename.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Heading in radians
    #[serde(rename = "t")]
    pub theta: f64,
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// An ordered sequence of waypoints.
///
/// A deque so that predecessor-chain reconstruction can push to the
/// front without reversing.
pub type Path = VecDeque<Point2>;

/// Render a path as `[x,y] -> [x,y] -> ...` for logs.
pub fn path_to_string(path: &Path) -> String {
    let mut out = String::new();
    let mut arrow = "";
    for p in path {
        out.push_str(arrow);
        out.push_str(&p.to_string());
        arrow = " -> ";
    }
    out
}

/// Fold an angle into (−π, π].
pub fn angle_wrap(mut a: f64) -> f64 {
    while a > PI {
        a -= 2.0 * PI;
    }
    while a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// Bearing from `a` to `b` in the image-oriented frame (y grows
/// downward), folded into (−π, π].
pub fn yaw_angle(a: &Point2, b: &Point2) -> f64 {
    angle_wrap((b.y - a.y).atan2(a.x - b.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_point2_distance() {
        let a = Point2::new(1.0, 1.0);
        let b = Point2::new(4.0, 5.0);
        assert_relative_eq!(a.distance_sq(&b), 25.0);
        assert_relative_eq!(a.distance(&b), 5.0);
        assert_relative_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_point3_distance() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 3.0, 6.0);
        assert_relative_eq!(a.distance(&b), 7.0);
    }

    #[test]
    fn test_point2_serde_roundtrip() {
        let p = Point2::new(100.5, -50.25);
        let json = serde_json::to_string(&p).unwrap();
        let decoded: Point2 = serde_json::from_str(&json).unwrap();
        assert_relative_eq!(decoded.x, p.x);
        assert_relative_eq!(decoded.y, p.y);
    }

    #[test]
    fn test_pose_serde_heading_field() {
        let json = r#"{"x":0.1,"y":0.2,"z":0.7,"t":1.5}"#;
        let pose: Pose = serde_json::from_str(json).unwrap();
        assert_relative_eq!(pose.z, 0.7);
        assert_relative_eq!(pose.theta, 1.5);
    }

    #[test]
    fn test_angle_wrap() {
        assert_relative_eq!(angle_wrap(0.0), 0.0);
        assert_relative_eq!(angle_wrap(3.0 * PI), PI);
        assert_relative_eq!(angle_wrap(-3.0 * PI), PI);
        assert_relative_eq!(angle_wrap(PI + 0.5), -PI + 0.5, epsilon = 1e-12);
        // -π maps to the open end of the interval
        assert_relative_eq!(angle_wrap(-PI), PI);
    }

    #[test]
    fn test_yaw_angle_axes() {
        let o = Point2::new(0.0, 0.0);
        // straight "down" in image coordinates
        assert_relative_eq!(yaw_angle(&o, &Point2::new(0.0, 1.0)), PI / 2.0);
        // straight "up"
        assert_relative_eq!(yaw_angle(&o, &Point2::new(0.0, -1.0)), -PI / 2.0);
        // along +x: atan2(0, -1)
        assert_relative_eq!(yaw_angle(&o, &Point2::new(1.0, 0.0)), PI);
    }

    #[test]
    fn test_yaw_angle_is_translation_invariant() {
        let a = Point2::new(3.0, -2.0);
        let b = Point2::new(5.5, 0.5);
        let shift = Point2::new(-7.0, 11.0);
        let a2 = Point2::new(a.x + shift.x, a.y + shift.y);
        let b2 = Point2::new(b.x + shift.x, b.y + shift.y);
        assert_relative_eq!(yaw_angle(&a, &b), yaw_angle(&a2, &b2));
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Point2::new(-1.5, 2.0);
        let b = Point2::new(4.0, -3.5);
        assert_relative_eq!(a.distance(&b), b.distance(&a));
        assert_relative_eq!(a.distance_sq(&b), a.distance(&b) * a.distance(&b));
    }

    #[test]
    fn test_path_push_front() {
        let mut path = Path::new();
        path.push_front(Point2::new(2.0, 2.0));
        path.push_front(Point2::new(1.0, 1.0));
        assert_eq!(path.front().unwrap().x, 1.0);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Point2::new(1.0, 2.5).to_string(), "[1,2.5]");
        assert_eq!(Point3::new(1.0, 2.0, 3.0).to_string(), "[1,2,3]");

        let path: Path = [Point2::new(0.0, 0.5), Point2::new(1.0, 1.5)]
            .into_iter()
            .collect();
        assert_eq!(path_to_string(&path), "[0,0.5] -> [1,1.5]");
        assert_eq!(path_to_string(&Path::new()), "");
    }
}
