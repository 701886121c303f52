//! Histogram comparison math for data/background ratio panels.

use ts_core::Result;
use ts_hist::Histogram;

/// Simple ratio: `data / background`, bin by bin.
pub fn ratio(data: &Histogram, background: &Histogram) -> Result<Histogram> {
    let mut h = data.clone();
    h.divide(background)?;
    Ok(h)
}

/// Relative difference: `(data - background) / background`, bin by bin.
pub fn data_minus_bg_over_bg(data: &Histogram, background: &Histogram) -> Result<Histogram> {
    let mut h = data.clone();
    h.add_scaled(background, -1.0)?;
    h.divide(background)?;
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hist(content: &[f64]) -> Histogram {
        let mut h = Histogram::new_1d("h", content.len(), 0.0, content.len() as f64);
        h.bin_content = content.to_vec();
        h
    }

    #[test]
    fn test_ratio() {
        let r = ratio(&hist(&[2.0, 9.0, 1.0]), &hist(&[1.0, 3.0, 0.0])).unwrap();
        assert_relative_eq!(r.bin_content[0], 2.0);
        assert_relative_eq!(r.bin_content[1], 3.0);
        // zero background bins stay zero instead of diverging
        assert_relative_eq!(r.bin_content[2], 0.0);
    }

    #[test]
    fn test_data_minus_bg_over_bg() {
        let r = data_minus_bg_over_bg(&hist(&[3.0, 2.0]), &hist(&[2.0, 4.0])).unwrap();
        assert_relative_eq!(r.bin_content[0], 0.5);
        assert_relative_eq!(r.bin_content[1], -0.5);
    }

    #[test]
    fn test_binning_mismatch() {
        assert!(ratio(&hist(&[1.0]), &hist(&[1.0, 2.0])).is_err());
    }
}
