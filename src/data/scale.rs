use super::model::{RegisterValue, MAX_SRAM_VALUE};

// ---------------------------------------------------------------------------
// Padding
// ---------------------------------------------------------------------------

/// Extend `values` to `target_len` by repeating its last value (0.0 when
/// empty).  Longer input is left untouched.
pub fn pad(mut values: Vec<f64>, target_len: usize) -> Vec<f64> {
    if values.len() < target_len {
        let fill = values.last().copied().unwrap_or(0.0);
        values.resize(target_len, fill);
    }
    values
}

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

/// Optionally stretch `values` so the peak magnitude is 1.0, then apply
/// `multiplier`.  The multiplier comes second and may push values past the
/// canonical range again.
pub fn scale(values: Vec<f64>, auto: bool, multiplier: f64) -> Vec<f64> {
    let auto_factor = if auto { peak_factor(&values) } else { 1.0 };
    let factor = auto_factor * multiplier;
    values.into_iter().map(|v| v * factor).collect()
}

fn peak_factor(values: &[f64]) -> f64 {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let peak = min.abs().max(max.abs());
    if peak == 0.0 || !peak.is_finite() {
        1.0
    } else {
        1.0 / peak
    }
}

// ---------------------------------------------------------------------------
// Quantization
// ---------------------------------------------------------------------------

/// Round a register offset to an integer, ties to even.
fn round_register(offset: f64) -> f64 {
    offset.round_ties_even()
}

/// Map a canonical value onto the register range, returning whether it had to
/// be clamped.  Rounding is half-to-even: 0.0 sits at offset 255.5 and maps
/// to 256.
pub fn quantize(value: f64) -> (RegisterValue, bool) {
    let max = f64::from(MAX_SRAM_VALUE);
    let register = round_register((value + 1.0) * max / 2.0);
    let clipped = !(-1.0..=1.0).contains(&value);
    (register.clamp(0.0, max) as RegisterValue, clipped)
}

/// Quantize a whole sequence; the flag reports whether any value clipped.
pub fn quantize_all(values: &[f64]) -> (Vec<RegisterValue>, bool) {
    let mut clipped = false;
    let registers = values
        .iter()
        .map(|&v| {
            let (r, c) = quantize(v);
            clipped |= c;
            r
        })
        .collect();
    (registers, clipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_repeats_last_value() {
        assert_eq!(pad(vec![3.0], 5), vec![3.0; 5]);
        assert_eq!(pad(vec![], 3), vec![0.0; 3]);
        assert_eq!(pad(vec![1.0, 2.0], 3), vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn pad_never_truncates() {
        assert_eq!(pad(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn auto_scale_normalizes_peak() {
        assert_eq!(scale(vec![0.25, -0.5], true, 1.0), vec![0.5, -1.0]);
        assert_eq!(scale(vec![0.0, 0.0], true, 1.0), vec![0.0, 0.0]);
    }

    #[test]
    fn multiplier_applies_after_auto_scale() {
        assert_eq!(scale(vec![0.5, -0.25], true, 2.0), vec![2.0, -1.0]);
        assert_eq!(scale(vec![0.5, -0.25], false, 2.0), vec![1.0, -0.5]);
    }

    #[test]
    fn quantize_endpoints() {
        assert_eq!(quantize(-1.0), (0, false));
        assert_eq!(quantize(1.0), (511, false));
        assert_eq!(quantize(0.0), (256, false));
    }

    #[test]
    fn quantize_clips_out_of_range() {
        assert_eq!(quantize(1.5), (511, true));
        assert_eq!(quantize(-3.0), (0, true));
    }

    #[test]
    fn exact_halves_round_to_even() {
        assert_eq!(round_register(0.5), 0.0);
        assert_eq!(round_register(1.5), 2.0);
        assert_eq!(round_register(2.5), 2.0);
        assert_eq!(round_register(255.5), 256.0);
        assert_eq!(round_register(256.5), 256.0);
        assert_eq!(round_register(510.5), 510.0);
        assert_eq!(round_register(254.51), 255.0);
    }

    #[test]
    fn quantize_is_monotonic() {
        let mut last = 0;
        for i in -1200..=1200 {
            let (r, _) = quantize(i as f64 / 1000.0);
            assert!(r >= last, "quantize dropped at {i}");
            last = r;
        }
    }

    #[test]
    fn quantize_all_reports_clipping() {
        let (regs, clipped) = quantize_all(&[-1.0, 0.0, 1.0]);
        assert_eq!(regs, vec![0, 256, 511]);
        assert!(!clipped);
        let (_, clipped) = quantize_all(&[0.0, 1.01]);
        assert!(clipped);
    }
}
