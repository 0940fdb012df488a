/// Convert a unit quaternion `(w, x, y, z)` into `(roll, pitch, yaw)` in radians.
pub fn quaternion_to_euler(q: (f64, f64, f64, f64)) -> (f64, f64, f64) {
    let (w, x, y, z) = q;

    let sinr_cosp = 2.0 * (w * x + y * z);
    let cosr_cosp = 1.0 - 2.0 * (x * x + y * y);
    let roll = sinr_cosp.atan2(cosr_cosp);

    let sinp = 2.0 * (w * y - z * x);
    let pitch = if sinp.abs() >= 1.0 {
        sinp.signum() * std::f64::consts::FRAC_PI_2
    } else {
        sinp.asin()
    };

    let siny_cosp = 2.0 * (w * z + x * y);
    let cosy_cosp = 1.0 - 2.0 * (y * y + z * z);
    let yaw = siny_cosp.atan2(cosy_cosp);

    (roll, pitch, yaw)
}

/// Map a symmetric surface deflection in `[-1, 1]` onto a `[0, 1]` RC channel.
pub fn surface_to_channel(value: f64) -> f64 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

pub fn channel_to_surface(value: f64) -> f64 {
    value * 2.0 - 1.0
}
