//! Pawprint footprints and region containment tests.
//!
//! The mask builder only sees the [`Footprint`] trait. [`Pawprint`] is the
//! concrete footprint stored on disk: sky regions (circles or polygons in
//! RA/Dec), proper-motion polygons and colour-magnitude polygons.

use std::fmt;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Region-containment predicates exposed by a stream footprint.
///
/// Point tests return `false` when the footprint defines no region of the
/// matching kind.
pub trait Footprint: fmt::Debug + Send + Sync {
    /// Total number of regions over all selection spaces
    fn region_count(&self) -> usize;

    /// Whether a sky position (degrees) lies inside any sky region
    fn point_in_region(&self, ra: f64, dec: f64) -> bool;

    /// Whether a proper motion (mas/yr) lies inside any proper-motion region
    fn pm_in_region(&self, _pmra: f64, _pmdec: f64) -> bool {
        false
    }

    /// Whether a (colour, magnitude) pair lies inside any colour-magnitude region
    fn cmd_in_region(&self, _color: f64, _mag: f64) -> bool {
        false
    }
}

/// Unit vector on the celestial sphere for an RA/Dec position in degrees
fn unit_vector(ra_deg: f64, dec_deg: f64) -> Vector3<f64> {
    let (ra, dec) = (ra_deg.to_radians(), dec_deg.to_radians());
    Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
}

/// Great-circle separation between two sky positions, in degrees
pub fn angular_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let a = unit_vector(ra1, dec1);
    let b = unit_vector(ra2, dec2);
    // atan2 form stays accurate for nearly coincident points
    a.cross(&b).norm().atan2(a.dot(&b)).to_degrees()
}

/// Wrap an RA difference into [-180, 180)
fn wrap_ra_offset(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Even-odd ray casting test for a closed planar polygon
fn polygon_contains(vertices: &[[f64; 2]], x: f64, y: f64) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let [xi, yi] = vertices[i];
        let [xj, yj] = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A closed polygon in a flat 2D selection space (proper motion or colour-magnitude)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarPolygon {
    pub vertices: Vec<[f64; 2]>,
}

impl PlanarPolygon {
    pub fn new(vertices: Vec<[f64; 2]>) -> Self {
        Self { vertices }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        polygon_contains(&self.vertices, x, y)
    }
}

/// A bounded region on the sky
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkyRegion {
    /// Cone around a centre, all values in degrees
    Circle { ra: f64, dec: f64, radius: f64 },
    /// Polygon with (ra, dec) vertices in degrees. RA is unwrapped around the
    /// first vertex, so polygons may straddle RA = 0.
    Polygon { vertices: Vec<[f64; 2]> },
}

impl SkyRegion {
    pub fn contains(&self, ra: f64, dec: f64) -> bool {
        match self {
            SkyRegion::Circle {
                ra: ra0,
                dec: dec0,
                radius,
            } => angular_separation_deg(*ra0, *dec0, ra, dec) <= *radius,
            SkyRegion::Polygon { vertices } => {
                let Some(&[ra_ref, _]) = vertices.first() else {
                    return false;
                };
                let unwrapped: Vec<[f64; 2]> = vertices
                    .iter()
                    .map(|&[v_ra, v_dec]| [wrap_ra_offset(v_ra - ra_ref), v_dec])
                    .collect();
                polygon_contains(&unwrapped, wrap_ra_offset(ra - ra_ref), dec)
            }
        }
    }
}

/// Footprint of one stream, identified by (stream_id, pawprint_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pawprint {
    pub stream_id: String,
    pub pawprint_id: String,
    #[serde(default)]
    pub sky: Vec<SkyRegion>,
    #[serde(default)]
    pub proper_motion: Vec<PlanarPolygon>,
    /// Polygons in (gaia_g - gaia_rp, gaia_g) space
    #[serde(default)]
    pub color_magnitude: Vec<PlanarPolygon>,
}

impl Pawprint {
    /// Create a pawprint with no regions
    pub fn new(stream_id: impl Into<String>, pawprint_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            pawprint_id: pawprint_id.into(),
            sky: Vec::new(),
            proper_motion: Vec::new(),
            color_magnitude: Vec::new(),
        }
    }

    pub fn with_sky_region(mut self, region: SkyRegion) -> Self {
        self.sky.push(region);
        self
    }

    pub fn with_pm_region(mut self, region: PlanarPolygon) -> Self {
        self.proper_motion.push(region);
        self
    }

    pub fn with_cmd_region(mut self, region: PlanarPolygon) -> Self {
        self.color_magnitude.push(region);
        self
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Footprint for Pawprint {
    fn region_count(&self) -> usize {
        self.sky.len() + self.proper_motion.len() + self.color_magnitude.len()
    }

    fn point_in_region(&self, ra: f64, dec: f64) -> bool {
        self.sky.iter().any(|region| region.contains(ra, dec))
    }

    fn pm_in_region(&self, pmra: f64, pmdec: f64) -> bool {
        self.proper_motion
            .iter()
            .any(|region| region.contains(pmra, pmdec))
    }

    fn cmd_in_region(&self, color: f64, mag: f64) -> bool {
        self.color_magnitude
            .iter()
            .any(|region| region.contains(color, mag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn unit_square() -> Vec<[f64; 2]> {
        vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
    }

    #[test]
    fn test_angular_separation() {
        assert_relative_eq!(angular_separation_deg(10.0, 0.0, 20.0, 0.0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(angular_separation_deg(0.0, 90.0, 123.0, 90.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(angular_separation_deg(359.5, 0.0, 0.5, 0.0), 1.0, epsilon = 1e-9);
    }

    #[rstest]
    #[case(0.5, 0.5, true)]
    #[case(1.5, 0.5, false)]
    #[case(0.5, -0.1, false)]
    #[case(0.99, 0.99, true)]
    fn test_planar_polygon(#[case] x: f64, #[case] y: f64, #[case] expected: bool) {
        let poly = PlanarPolygon::new(unit_square());
        assert_eq!(poly.contains(x, y), expected);
    }

    #[test]
    fn test_degenerate_polygon_contains_nothing() {
        let poly = PlanarPolygon::new(vec![[0.0, 0.0], [1.0, 1.0]]);
        assert!(!poly.contains(0.5, 0.5));
    }

    #[test]
    fn test_circle_region() {
        let region = SkyRegion::Circle {
            ra: 150.0,
            dec: 20.0,
            radius: 0.5,
        };
        assert!(region.contains(150.1, 20.1));
        assert!(!region.contains(151.0, 20.0));
    }

    #[test]
    fn test_sky_polygon_across_ra_zero() {
        let region = SkyRegion::Polygon {
            vertices: vec![[358.0, -2.0], [2.0, -2.0], [2.0, 2.0], [358.0, 2.0]],
        };
        assert!(region.contains(0.0, 0.0));
        assert!(region.contains(359.0, 1.0));
        assert!(region.contains(1.0, -1.0));
        assert!(!region.contains(180.0, 0.0));
        assert!(!region.contains(3.0, 0.0));
    }

    #[test]
    fn test_empty_pawprint_selects_nothing() {
        let pawprint = Pawprint::new("S1", "P1");
        assert_eq!(pawprint.region_count(), 0);
        assert!(!pawprint.point_in_region(0.0, 0.0));
        assert!(!pawprint.pm_in_region(0.0, 0.0));
        assert!(!pawprint.cmd_in_region(0.0, 0.0));
    }

    #[test]
    fn test_any_region_matches() {
        let pawprint = Pawprint::new("S1", "P1")
            .with_sky_region(SkyRegion::Circle {
                ra: 10.0,
                dec: 10.0,
                radius: 1.0,
            })
            .with_sky_region(SkyRegion::Circle {
                ra: 50.0,
                dec: -10.0,
                radius: 1.0,
            });
        assert_eq!(pawprint.region_count(), 2);
        assert!(pawprint.point_in_region(10.0, 10.5));
        assert!(pawprint.point_in_region(50.0, -10.5));
        assert!(!pawprint.point_in_region(30.0, 0.0));
    }

    #[test]
    fn test_pawprint_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pawprint.json");

        let pawprint = Pawprint::new("GD-1", "base")
            .with_sky_region(SkyRegion::Polygon {
                vertices: vec![[140.0, 20.0], [160.0, 20.0], [160.0, 40.0]],
            })
            .with_pm_region(PlanarPolygon::new(unit_square()))
            .with_cmd_region(PlanarPolygon::new(vec![[0.5, 15.0], [1.0, 15.0], [1.0, 20.0]]));

        pawprint.save_to_file(&path).unwrap();
        let loaded = Pawprint::load_from_file(&path).unwrap();
        assert_eq!(loaded, pawprint);
    }

    #[test]
    fn test_missing_region_lists_default_to_empty() {
        let json = r#"{"stream_id": "S1", "pawprint_id": "P1",
            "sky": [{"kind": "circle", "ra": 1.0, "dec": 2.0, "radius": 0.1}]}"#;
        let pawprint: Pawprint = serde_json::from_str(json).unwrap();
        assert_eq!(pawprint.sky.len(), 1);
        assert!(pawprint.proper_motion.is_empty());
        assert!(pawprint.color_magnitude.is_empty());
    }
}
