use std::sync::Mutex;

use pid::{Controller, PIDCoefficients, PID};

use super::{step_axis, AxisStates, RollGainSource};
use crate::{
    attitude::Attitude,
    control::ControlSurfaceCommand,
    mailbox::Mailbox,
    setpoint::{AxisCoefficients, Rect, SetpointBundle, TrackingBundle, TrackingSetpoint},
    util::lock,
};

pub const DEFAULT_COEFFICIENTS: AxisCoefficients = AxisCoefficients {
    pitch: PIDCoefficients::new(0.002, 0.001, 0.0),
    yaw: PIDCoefficients::new(0.001, 0.0001, 0.0),
    roll: PIDCoefficients::new(0.05, 0.0, 0.0),
};

struct Pilot {
    setpoint: TrackingSetpoint,
    coefficients: AxisCoefficients,
}

#[derive(Default)]
struct Laws {
    pitch: PID,
    yaw: PID,
    roll: PID,
    roll_gains: RollGainSource,
}

/// Steers the aircraft so the tracked object's center sits on the target pixel.
///
/// Pitch follows the vertical pixel error, yaw the horizontal one, and roll is
/// levelled toward zero.
pub(super) struct TrackingBrain {
    pilot: Mutex<Pilot>,
    laws: Mutex<Laws>,
}

impl TrackingBrain {
    pub fn new() -> Self {
        Self {
            pilot: Mutex::new(Pilot {
                setpoint: TrackingSetpoint::default(),
                coefficients: DEFAULT_COEFFICIENTS,
            }),
            laws: Mutex::new(Laws::default()),
        }
    }

    pub fn set_target_location(&self, location: (f64, f64)) {
        lock(&self.pilot).setpoint.target_location = location;
    }

    pub fn set_object_bbox(&self, bbox: Option<Rect>) {
        lock(&self.pilot).setpoint.object_bbox = bbox;
    }

    pub fn coefficients_mut(&self, f: impl FnOnce(&mut AxisCoefficients)) {
        f(&mut lock(&self.pilot).coefficients);
    }

    pub fn coefficients(&self) -> AxisCoefficients {
        lock(&self.pilot).coefficients
    }

    pub fn set_roll_gain_source(&self, source: RollGainSource) {
        lock(&self.laws).roll_gains = source;
    }

    pub fn bundle(&self, attitude: &Attitude) -> TrackingBundle {
        let pilot = lock(&self.pilot);
        TrackingBundle {
            target_location: pilot.setpoint.target_location,
            object_bbox: pilot.setpoint.object_bbox,
            pitch: attitude.pitch,
            yaw: attitude.yaw,
            roll: attitude.roll,
            pitch_pid: pilot.coefficients.pitch,
            yaw_pid: pilot.coefficients.yaw,
            roll_pid: pilot.coefficients.roll,
        }
    }

    /// `None` unless a fresh bundle carrying a bounding box arrived.
    pub fn command(
        &self,
        mut buffer: ControlSurfaceCommand,
        commands: &Mailbox<SetpointBundle>,
    ) -> Option<ControlSurfaceCommand> {
        let bundle = match commands.take()? {
            SetpointBundle::Tracking(bundle) => bundle,
            other => {
                log::debug!("Tracking brain ignoring foreign bundle {:?}", other);
                return None;
            }
        };
        let bbox = bundle.object_bbox?;

        let mut laws = lock(&self.laws);
        let (target_x, target_y) = bundle.target_location;
        let (object_x, object_y) = bbox.center();

        step_axis(&mut laws.pitch, "pitch", target_y, object_y, &bundle.pitch_pid);
        step_axis(&mut laws.yaw, "yaw", target_x, object_x, &bundle.yaw_pid);
        let roll_pid = *laws.roll_gains.select(&bundle.yaw_pid, &bundle.roll_pid);
        step_axis(&mut laws.roll, "roll", 0.0, bundle.roll, &roll_pid);

        log::debug!(
            "target location {:?}, object location ({:.1}, {:.1}), roll {:.2}, aileron {:.3}",
            bundle.target_location,
            object_x,
            object_y,
            bundle.roll,
            laws.roll.last_output()
        );

        buffer.elevator = -laws.pitch.last_output();
        buffer.rudder = -laws.yaw.last_output();
        buffer.aileron = laws.roll.last_output();
        Some(buffer)
    }

    pub fn states(&self) -> AxisStates {
        let laws = lock(&self.laws);
        AxisStates {
            pitch: laws.pitch.state(),
            yaw: laws.yaw.state(),
            roll: laws.roll.state(),
            throttle: None,
        }
    }
}
