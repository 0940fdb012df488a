// PID controller with externally supplied gains
use thiserror::Error;

use crate::Controller;

/// Integration step used by the autopilot brains.
pub const DEFAULT_DT: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PIDError {
    #[error("Invalid time step: dt must be finite and positive, got {0}")]
    InvalidTimeStep(f64),

    #[error("Invalid gain configuration: {0}")]
    InvalidGain(String),
}

/// Gains for one axis. Owned by whoever tunes the axis; copied into every update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PIDCoefficients {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PIDCoefficients {
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    pub fn validate(&self) -> Result<(), PIDError> {
        for (name, value) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !value.is_finite() {
                return Err(PIDError::InvalidGain(format!(
                    "{name} value {value} is not a valid number"
                )));
            }
        }
        Ok(())
    }
}

/// Accumulated state of a PID controller, exposed for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub error_sum: f64,
    pub last_error: f64,
    pub last_output: f64,
}

/// Proportional-Integral-Derivative control law.
///
/// The integral term accumulates without bound; there is no anti-windup clamp.
/// State is only ever cleared by constructing a new controller.
#[derive(Default, Debug, Clone)]
pub struct PID {
    error_sum: f64,
    last_error: f64,
    output: f64,
}

impl PID {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one step of the control law.
    ///
    /// # Errors
    ///
    /// Returns [`PIDError::InvalidTimeStep`] when `dt` is not a finite positive
    /// number and [`PIDError::InvalidGain`] when a gain is NaN or infinite. The
    /// controller state is left untouched in both cases.
    pub fn update(
        &mut self,
        setpoint: f64,
        measured: f64,
        coefficients: &PIDCoefficients,
        dt: f64,
    ) -> Result<f64, PIDError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PIDError::InvalidTimeStep(dt));
        }
        coefficients.validate()?;

        let error = setpoint - measured;

        let proportional = coefficients.kp * error;

        self.error_sum += error * dt;
        let integral = coefficients.ki * self.error_sum;

        let derivative = coefficients.kd * (error - self.last_error) / dt;
        self.last_error = error;

        self.output = proportional + integral + derivative;
        Ok(self.output)
    }

    pub fn state(&self) -> ControllerState {
        ControllerState {
            error_sum: self.error_sum,
            last_error: self.last_error,
            last_output: self.output,
        }
    }
}

impl Controller for PID {
    fn last_output(&self) -> f64 {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_pid_first_step() {
        let mut pid = PID::new();
        let c = PIDCoefficients::new(0.1, 0.005, 0.001);
        let output = pid.update(20.0, 10.0, &c, DEFAULT_DT).unwrap();
        assert!((output - 1.105).abs() < EPS, "Expected 1.105, got {}", output);
        assert_eq!(pid.last_output(), output);
    }

    #[test]
    fn test_pid_integral_accumulation() {
        let mut pid = PID::new();
        let c = PIDCoefficients::new(0.0, 0.3, 0.0);
        let error = 2.5;
        let ticks = 40;
        let mut output = 0.0;
        for _ in 0..ticks {
            output = pid.update(error, 0.0, &c, DEFAULT_DT).unwrap();
        }
        let expected = 0.3 * error * ticks as f64 * DEFAULT_DT;
        assert!((output - expected).abs() < 1e-6, "Expected {}, got {}", expected, output);
        assert!((pid.state().error_sum - error * ticks as f64 * DEFAULT_DT).abs() < 1e-6);
    }

    #[test]
    fn test_pid_zero_error_leaves_only_integral() {
        let mut pid = PID::new();
        let c = PIDCoefficients::new(1.0, 0.5, 0.2);

        // Pre-accumulate some error, then hold the setpoint.
        pid.update(5.0, 0.0, &c, DEFAULT_DT).unwrap();
        pid.update(5.0, 5.0, &c, DEFAULT_DT).unwrap();
        let held_sum = pid.state().error_sum;

        for _ in 0..5 {
            let output = pid.update(5.0, 5.0, &c, DEFAULT_DT).unwrap();
            assert!((output - c.ki * held_sum).abs() < EPS);
        }
        assert_eq!(pid.state().last_error, 0.0);
    }

    #[test]
    fn test_pid_rejects_bad_dt() {
        let mut pid = PID::new();
        let c = PIDCoefficients::new(0.1, 0.0, 0.0);
        assert_eq!(pid.update(1.0, 0.0, &c, 0.0), Err(PIDError::InvalidTimeStep(0.0)));
        assert!(pid.update(1.0, 0.0, &c, -0.1).is_err());
        assert!(pid.update(1.0, 0.0, &c, f64::NAN).is_err());
        assert_eq!(pid.state(), ControllerState::default(), "State must be untouched");
    }

    #[test]
    fn test_pid_rejects_bad_gain() {
        let mut pid = PID::new();
        let c = PIDCoefficients::new(f64::INFINITY, 0.0, 0.0);
        assert!(matches!(
            pid.update(1.0, 0.0, &c, DEFAULT_DT),
            Err(PIDError::InvalidGain(_))
        ));
    }

    #[test]
    fn test_fresh_state_is_zero() {
        let pid = PID::new();
        assert_eq!(pid.state(), ControllerState::default());
    }
}
