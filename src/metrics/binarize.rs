/// Values strictly above this are positives.
pub const THRESHOLD: f32 = 0.5;

/// Whether `value` counts as a positive prediction. NaN never does.
pub fn is_positive(value: f32) -> bool {
    value > THRESHOLD
}

/// Maps every value above `THRESHOLD` to 1 and everything else to 0.
pub fn binarize(values: &[f32]) -> Vec<u8> {
    values.iter().map(|&v| u8::from(is_positive(v))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(binarize(&[0.5, 0.50001, 0.0, 1.0, 0.49]), [0, 1, 0, 1, 0]);
    }

    #[test]
    fn binarizing_twice_is_a_no_op() {
        let values = [0.9, 0.2, 0.6, 0.4, 0.55, 0.5, 1.0, 0.0];
        let once = binarize(&values);
        let as_f32: Vec<f32> = once.iter().map(|&b| f32::from(b)).collect();

        assert_eq!(binarize(&as_f32), once);
    }

    #[test]
    fn nan_is_negative() {
        assert!(!is_positive(f32::NAN));
        assert_eq!(binarize(&[f32::NAN]), [0]);
    }
}
