/// Number of engines driven by the throttle channel.
pub const ENGINE_COUNT: usize = 4;

/// Orientation reported by the flight dynamics model, in radians.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct FdmSample {
    /// Roll
    pub phi_rad: f64,
    /// Pitch
    pub theta_rad: f64,
    /// Heading
    pub psi_rad: f64,
}

/// Actuator output sent to the simulator's control-surface channel.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct ControlSurfaceCommand {
    pub elevator: f64,
    pub rudder: f64,
    pub aileron: f64,
    pub throttle: [f64; ENGINE_COUNT],
}

impl ControlSurfaceCommand {
    pub fn new(elevator: f64, rudder: f64, aileron: f64, throttle: f64) -> Self {
        ControlSurfaceCommand {
            elevator,
            rudder,
            aileron,
            throttle: [throttle; ENGINE_COUNT],
        }
    }
}
