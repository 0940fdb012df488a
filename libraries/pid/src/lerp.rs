use crate::Controller;

/// Exponential smoothing toward a setpoint.
///
/// Each call moves the output a fixed fraction (`blend`) of the remaining gap
/// between the measured value and the setpoint.
#[derive(Default, Debug, Clone)]
pub struct Lerp {
    output: f64,
}

impl Lerp {
    pub const DEFAULT_BLEND: f64 = 0.01;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, setpoint: f64, measured: f64, blend: f64) -> f64 {
        self.output = (1.0 - blend) * measured + blend * setpoint;
        self.output
    }
}

impl Controller for Lerp {
    fn last_output(&self) -> f64 {
        self.output
    }
}
