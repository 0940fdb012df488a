use crate::control::FdmSample;

/// Aircraft orientation in degrees, as seen by the control thread.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Attitude {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Attitude { pitch, yaw, roll }
    }

    /// Convert a simulator sample (radians) into degrees.
    pub fn from_fdm(sample: &FdmSample) -> Self {
        Attitude {
            pitch: sample.theta_rad.to_degrees(),
            yaw: sample.psi_rad.to_degrees(),
            roll: sample.phi_rad.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn test_from_fdm() {
        let sample = FdmSample {
            phi_rad: -FRAC_PI_4,
            theta_rad: FRAC_PI_2,
            psi_rad: PI,
        };
        let attitude = Attitude::from_fdm(&sample);
        assert!((attitude.pitch - 90.0).abs() < 1e-9);
        assert!((attitude.yaw - 180.0).abs() < 1e-9);
        assert!((attitude.roll + 45.0).abs() < 1e-9);
    }
}
