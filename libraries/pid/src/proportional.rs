use crate::Controller;

/// Proportional-only control law.
#[derive(Default, Debug, Clone)]
pub struct Proportional {
    output: f64,
}

impl Proportional {
    pub const DEFAULT_KP: f64 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, setpoint: f64, measured: f64, kp: f64) -> f64 {
        self.output = (setpoint - measured) * kp;
        self.output
    }
}

impl Controller for Proportional {
    fn last_output(&self) -> f64 {
        self.output
    }
}
