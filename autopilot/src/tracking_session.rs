use std::sync::Arc;

use crate::{brain::Brain, setpoint::Rect};

/// Tracker confidence below which tracking disengages.
pub const TRACKING_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Drives a tracking brain from per-frame visual tracker results.
///
/// The tracker itself lives outside this crate; it is consumed only through
/// `(score, bbox)` pairs fed into [`TrackingSession::update`].
pub struct TrackingSession {
    brain: Arc<Brain>,
    initialized: bool,
    tracking: bool,
    target_location: Option<(f64, f64)>,
    selected_roi: Option<Rect>,
}

impl TrackingSession {
    pub fn new(brain: Arc<Brain>) -> Self {
        Self {
            brain,
            initialized: false,
            tracking: false,
            target_location: None,
            selected_roi: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn target_location(&self) -> Option<(f64, f64)> {
        self.target_location
    }

    pub fn selected_roi(&self) -> Option<Rect> {
        self.selected_roi
    }

    /// Mark the tracker as initialized on `roi` and aim for the frame center.
    ///
    /// Returns `false` when the brain is not a tracking brain.
    pub fn init(&mut self, frame_width: u32, frame_height: u32, roi: Rect) -> bool {
        let location = ((frame_width / 2) as f64, (frame_height / 2) as f64);
        if !self.brain.set_target_location(location) {
            log::warn!("{} brain cannot track a target", self.brain.kind());
            return false;
        }
        self.initialized = true;
        self.target_location = Some(location);
        self.selected_roi = Some(roi);
        log::info!("Tracker initialized on {:?}, target location {:?}", roi, location);
        true
    }

    /// Feed one tracker result.
    pub fn update(&mut self, score: f64, bbox: Rect) {
        if !self.initialized {
            return;
        }
        let roi = Rect::new(
            bbox.x.trunc(),
            bbox.y.trunc(),
            bbox.width.trunc(),
            bbox.height.trunc(),
        );

        if score < TRACKING_CONFIDENCE_THRESHOLD && self.tracking {
            log::warn!("Tracker confidence {score:.2} too low, disengaging");
            self.toggle();
            return;
        }

        if self.tracking {
            self.brain.set_object_bbox(Some(roi));
        }
        self.selected_roi = Some(roi);
    }

    /// Engage or disengage tracking.
    pub fn toggle(&mut self) {
        if !self.initialized {
            log::warn!("Tracker is not initialized");
            return;
        }
        self.tracking = !self.tracking;
        if !self.tracking {
            self.brain.set_object_bbox(None);
        }
        log::info!("Tracking {}", if self.tracking { "engaged" } else { "disengaged" });
    }

    /// Drop the current target entirely.
    pub fn cancel(&mut self) {
        self.tracking = false;
        self.initialized = false;
        self.selected_roi = None;
        self.brain.set_object_bbox(None);
    }
}
