//! Standard 10-20 montage (with the common 10-10 extension).
//!
//! Positions are stored in BESA spherical coordinates `(θ, φ)` in degrees:
//! `θ` is the angle from Cz (negative on the left hemisphere), `φ` the
//! azimuth measured from the T8 axis towards the nose.  They are converted
//! to unit-sphere Cartesian coordinates with `+x` right, `+y` nose, `+z` up.
//!
//! Lookups are exact (case-sensitive) on the electrode label.
use crate::error::{Error, Result};

const POSITIONS: &[(&str, f64, f64)] = &[
    ("Fp1", -92.0, -72.0), ("Fpz", 92.0, 90.0), ("Fp2", 92.0, 72.0),
    ("AF7", -92.0, -54.0), ("AF3", -74.0, -65.0), ("AFz", 69.0, 90.0),
    ("AF4", 74.0, 65.0), ("AF8", 92.0, 54.0),
    ("F7", -92.0, -36.0), ("F5", -75.0, -41.0), ("F3", -60.0, -51.0),
    ("F1", -50.0, -68.0), ("Fz", 46.0, 90.0), ("F2", 50.0, 68.0),
    ("F4", 60.0, 51.0), ("F6", 75.0, 41.0), ("F8", 92.0, 36.0),
    ("FT9", -115.0, -18.0), ("FT7", -92.0, -18.0), ("FC5", -72.0, -21.0),
    ("FC3", -51.0, -29.0), ("FC1", -32.0, -45.0), ("FCz", 23.0, 90.0),
    ("FC2", 32.0, 45.0), ("FC4", 51.0, 29.0), ("FC6", 72.0, 21.0),
    ("FT8", 92.0, 18.0), ("FT10", 115.0, 18.0),
    ("T7", -92.0, 0.0), ("C5", -69.0, 0.0), ("C3", -46.0, 0.0),
    ("C1", -23.0, 0.0), ("Cz", 0.0, 0.0), ("C2", 23.0, 0.0),
    ("C4", 46.0, 0.0), ("C6", 69.0, 0.0), ("T8", 92.0, 0.0),
    ("TP9", -115.0, 18.0), ("TP7", -92.0, 18.0), ("CP5", -72.0, 21.0),
    ("CP3", -51.0, 29.0), ("CP1", -32.0, 45.0), ("CPz", 23.0, -90.0),
    ("CP2", 32.0, -45.0), ("CP4", 51.0, -29.0), ("CP6", 72.0, -21.0),
    ("TP8", 92.0, -18.0), ("TP10", 115.0, -18.0),
    ("P7", -92.0, 36.0), ("P5", -75.0, 41.0), ("P3", -60.0, 51.0),
    ("P1", -50.0, 68.0), ("Pz", 46.0, -90.0), ("P2", 50.0, -68.0),
    ("P4", 60.0, -51.0), ("P6", 75.0, -41.0), ("P8", 92.0, -36.0),
    ("PO7", -92.0, 54.0), ("PO3", -74.0, 65.0), ("POz", 69.0, -90.0),
    ("PO4", 74.0, -65.0), ("PO8", 92.0, -54.0),
    ("O1", -92.0, 72.0), ("Oz", 92.0, -90.0), ("O2", 92.0, -72.0),
    ("Iz", 115.0, -90.0),
];

/// Unit-sphere electrode position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Named electrode layout.
#[derive(Debug, Clone)]
pub struct Montage {
    entries: Vec<(String, Position)>,
}

impl Montage {
    /// The standard 10-20 / 10-10 layout.
    pub fn standard_1020() -> Self {
        let entries = POSITIONS
            .iter()
            .map(|&(name, theta, phi)| (name.to_string(), besa_to_cartesian(theta, phi)))
            .collect();
        Self { entries }
    }

    pub fn position(&self, name: &str) -> Option<Position> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| *p)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positions for `names`, in order.  Fails listing every unknown name.
    pub fn positions(&self, names: &[String]) -> Result<Vec<Position>> {
        let mut out = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for n in names {
            match self.position(n) {
                Some(p) => out.push(p),
                None => missing.push(n.clone()),
            }
        }
        if missing.is_empty() {
            Ok(out)
        } else {
            Err(Error::InsufficientContext(missing))
        }
    }
}

fn besa_to_cartesian(theta_deg: f64, phi_deg: f64) -> Position {
    let (t, p) = (theta_deg.to_radians(), phi_deg.to_radians());
    Position { x: t.sin() * p.cos(), y: t.sin() * p.sin(), z: t.cos() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmarks_point_the_right_way() {
        let m = Montage::standard_1020();
        let cz = m.position("Cz").unwrap();
        approx::assert_abs_diff_eq!(cz.z, 1.0, epsilon = 1e-12);
        assert!(m.position("C3").unwrap().x < -0.5);
        assert!(m.position("C4").unwrap().x > 0.5);
        assert!(m.position("Fp1").unwrap().y > 0.9);
        assert!(m.position("O2").unwrap().y < -0.9);
        assert!(m.position("FC5").unwrap().y > 0.0);
        assert!(m.position("CP6").unwrap().y < 0.0);
    }

    #[test]
    fn positions_are_unit_vectors() {
        let m = Montage::standard_1020();
        for (_, p) in &m.entries {
            let r = (p.x * p.x + p.y * p.y + p.z * p.z).sqrt();
            approx::assert_abs_diff_eq!(r, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn motor_channels_all_known() {
        let m = Montage::standard_1020();
        let names: Vec<String> = crate::config::MOTOR_CHANNELS.iter().map(|s| s.to_string()).collect();
        assert_eq!(m.positions(&names).unwrap().len(), 14);
    }

    #[test]
    fn unknown_and_miscased_names_fail() {
        let m = Montage::standard_1020();
        let names = vec!["C3".to_string(), "EMG1".to_string(), "cz".to_string()];
        match m.positions(&names) {
            Err(Error::InsufficientContext(missing)) => assert_eq!(missing, vec!["EMG1", "cz"]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
