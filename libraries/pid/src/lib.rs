mod lerp;
mod pid;
mod proportional;

pub use lerp::Lerp;
pub use pid::{ControllerState, PIDCoefficients, PIDError, DEFAULT_DT, PID};
pub use proportional::Proportional;

/// Common surface of every control law: the value produced by the last update.
///
/// Used for inspection and plotting only; control logic never reads it back.
pub trait Controller {
    fn last_output(&self) -> f64;
}
