// panorama.rs — view parameters and projection execution modes

use serde::Deserialize;

pub const PITCH_MIN: f64 = -90.0;
pub const PITCH_MAX: f64 = 90.0;
pub const FOV_MIN: f64 = 10.0;
pub const FOV_MAX: f64 = 120.0;

pub const DEFAULT_YAW: f64 = 0.0;
pub const DEFAULT_PITCH: f64 = 0.0;
pub const DEFAULT_ROLL: f64 = 0.0;
pub const DEFAULT_FOV: f64 = 90.0;
pub const DEFAULT_STEP: f64 = 10.0;

/// How the projector walks the output rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Serial, // one row after another on the calling thread
    #[default]
    Parallel, // disjoint row slices on the rayon pool
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::Serial, Algorithm::Parallel];

    pub fn label(self) -> &'static str {
        match self {
            Algorithm::Serial => "serial",
            Algorithm::Parallel => "parallel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serial" | "0" => Some(Algorithm::Serial),
            "parallel" | "1" => Some(Algorithm::Parallel),
            _ => None,
        }
    }
}

/// Viewing direction and zoom, all in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewportParameters {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub fov: f64,
}

impl Default for ViewportParameters {
    fn default() -> Self {
        Self {
            yaw: DEFAULT_YAW,
            pitch: DEFAULT_PITCH,
            roll: DEFAULT_ROLL,
            fov: DEFAULT_FOV,
        }
    }
}

impl ViewportParameters {
    pub fn new(yaw: f64, pitch: f64, roll: f64, fov: f64) -> Self {
        Self {
            yaw,
            pitch,
            roll,
            fov,
        }
    }

    /// Brings every field back into range:
    /// pitch [-90, 90], fov [10, 120], yaw (-180, 180], roll [0, 360).
    /// Values already in range are left bit-for-bit untouched.
    pub fn clamp(&mut self) {
        self.pitch = self.pitch.clamp(PITCH_MIN, PITCH_MAX);
        self.fov = self.fov.clamp(FOV_MIN, FOV_MAX);
        self.yaw = wrap_yaw(self.yaw);
        self.roll = wrap_roll(self.roll);
    }

    pub fn clamped(mut self) -> Self {
        self.clamp();
        self
    }

    pub fn is_valid(&self) -> bool {
        (PITCH_MIN..=PITCH_MAX).contains(&self.pitch)
            && (FOV_MIN..=FOV_MAX).contains(&self.fov)
            && self.yaw > -180.0
            && self.yaw <= 180.0
            && self.roll >= 0.0
            && self.roll < 360.0
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite() && self.fov.is_finite()
    }
}

/// Per-frame automatic rotation, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewDelta {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl ViewDelta {
    pub fn is_zero(&self) -> bool {
        self.yaw == 0.0 && self.pitch == 0.0 && self.roll == 0.0
    }
}

fn wrap_yaw(yaw: f64) -> f64 {
    if yaw > -180.0 && yaw <= 180.0 {
        return yaw;
    }
    let wrapped = 180.0 - (180.0 - yaw).rem_euclid(360.0);
    // rem_euclid may round up to exactly 360
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

fn wrap_roll(roll: f64) -> f64 {
    if (0.0..360.0).contains(&roll) {
        return roll;
    }
    let wrapped = roll.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaw_wraps_to_the_other_side() {
        let p = ViewportParameters::new(190.0, 0.0, 0.0, 90.0).clamped();
        assert_eq!(p.yaw, -170.0);
        let p = ViewportParameters::new(-190.0, 0.0, 0.0, 90.0).clamped();
        assert_eq!(p.yaw, 170.0);
        let p = ViewportParameters::new(-180.0, 0.0, 0.0, 90.0).clamped();
        assert_eq!(p.yaw, 180.0);
        let p = ViewportParameters::new(900.0, 0.0, 0.0, 90.0).clamped();
        assert_eq!(p.yaw, 180.0);
    }

    #[test]
    fn pitch_stops_at_the_poles() {
        assert_eq!(ViewportParameters::new(0.0, 120.0, 0.0, 90.0).clamped().pitch, 90.0);
        assert_eq!(ViewportParameters::new(0.0, -120.0, 0.0, 90.0).clamped().pitch, -90.0);
    }

    #[test]
    fn roll_wraps_into_full_turn() {
        assert_eq!(ViewportParameters::new(0.0, 0.0, -10.0, 90.0).clamped().roll, 350.0);
        assert_eq!(ViewportParameters::new(0.0, 0.0, 360.0, 90.0).clamped().roll, 0.0);
        assert_eq!(ViewportParameters::new(0.0, 0.0, 730.0, 90.0).clamped().roll, 10.0);
        assert_eq!(ViewportParameters::new(0.0, 0.0, -1e-20, 90.0).clamped().roll, 0.0);
    }

    #[test]
    fn fov_is_bounded() {
        assert_eq!(ViewportParameters::new(0.0, 0.0, 0.0, 5.0).clamped().fov, FOV_MIN);
        assert_eq!(ViewportParameters::new(0.0, 0.0, 0.0, 500.0).clamped().fov, FOV_MAX);
    }

    #[test]
    fn clamping_lands_in_range_for_wide_inputs() {
        let mut v = -2000.0;
        while v <= 2000.0 {
            let p = ViewportParameters::new(v, v / 7.0, v * 1.3, v / 3.0).clamped();
            assert!(p.is_valid(), "{p:?} from {v}");
            v += 13.7;
        }
    }

    #[test]
    fn clamping_valid_parameters_is_a_no_op() {
        let samples = [
            ViewportParameters::default(),
            ViewportParameters::new(180.0, 90.0, 359.9, 120.0),
            ViewportParameters::new(-179.99, -90.0, 0.0, 10.0),
            ViewportParameters::new(0.1, 33.3, 123.456, 47.5),
        ];
        for p in samples {
            assert!(p.is_valid());
            assert_eq!(p.clamped(), p);
            assert_eq!(p.clamped().clamped(), p.clamped());
        }
    }

    #[test]
    fn algorithm_names_round_trip() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::parse(alg.label()), Some(alg));
        }
        assert_eq!(Algorithm::parse("PARALLEL"), Some(Algorithm::Parallel));
        assert_eq!(Algorithm::parse("gpu"), None);
    }
}
