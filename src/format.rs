/// Round to two decimal digits for presentation.
pub fn round_2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Full `st_mode` in octal, e.g. `100644`.
pub fn format_mode(mode: u32) -> String {
    format!("{mode:o}")
}

/// Permission bits as the last three octal digits, e.g. `644`.
pub fn permission_bits(mode: u32) -> String {
    format!("{:03o}", mode & 0o777)
}

pub fn ticks_to_seconds(ticks: u64, ticks_per_second: u64) -> f64 {
    if ticks_per_second == 0 {
        return 0.0;
    }
    round_2(ticks as f64 / ticks_per_second as f64)
}
