use pid::PIDCoefficients;

/// Pixel-space rectangle describing a tracked object.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

impl From<(f64, f64, f64, f64)> for Rect {
    fn from((x, y, width, height): (f64, f64, f64, f64)) -> Self {
        Rect::new(x, y, width, height)
    }
}

/// Gains for all three axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCoefficients {
    pub pitch: PIDCoefficients,
    pub yaw: PIDCoefficients,
    pub roll: PIDCoefficients,
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct AutopilotSetpoint {
    pub target_pitch: f64,
    pub target_yaw: f64,
    pub target_roll: f64,
    pub target_throttle: f64,
}

#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct TrackingSetpoint {
    pub target_location: (f64, f64),
    pub object_bbox: Option<Rect>,
}

/// Snapshot handed from the control thread to the command worker in autopilot mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutopilotBundle {
    pub target_throttle: f64,
    pub target_pitch: f64,
    pub target_yaw: f64,
    pub target_roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub pitch_pid: PIDCoefficients,
    pub yaw_pid: PIDCoefficients,
    pub roll_pid: PIDCoefficients,
}

/// Snapshot handed from the control thread to the command worker in tracking mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingBundle {
    pub target_location: (f64, f64),
    pub object_bbox: Option<Rect>,
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
    pub pitch_pid: PIDCoefficients,
    pub yaw_pid: PIDCoefficients,
    pub roll_pid: PIDCoefficients,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetpointBundle {
    Autopilot(AutopilotBundle),
    Tracking(TrackingBundle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center() {
        let rect = Rect::from((100.0, 50.0, 40.0, 20.0));
        assert_eq!(rect.center(), (120.0, 60.0));
    }
}
