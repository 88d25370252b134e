use figtex_core::Color;

/// Perceptually ordered stops, dark blue through teal to yellow.
const STOPS: [Color; 6] = [
    Color::rgb(62, 38, 168),
    Color::rgb(36, 103, 235),
    Color::rgb(16, 161, 213),
    Color::rgb(54, 187, 137),
    Color::rgb(190, 188, 56),
    Color::rgb(249, 251, 21),
];

/// Maps `t` in `0.0..=1.0` onto the colormap; values outside are clamped.
pub fn sample(t: f64) -> Color {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (STOPS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(STOPS.len() - 2);
    STOPS[i].lerp(STOPS[i + 1], scaled - i as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hit_first_and_last_stop() {
        assert_eq!(sample(0.0), STOPS[0]);
        assert_eq!(sample(1.0), STOPS[5]);
        assert_eq!(sample(-3.0), STOPS[0]);
        assert_eq!(sample(f64::NAN), STOPS[0]);
    }
}
