//! Histogram value type with uniform axes (1 to 3 dimensions).

use serde::{Deserialize, Serialize};
use ts_core::{Error, Result};

/// A uniformly binned histogram axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Number of bins (excluding under/overflow, which are not stored).
    pub n_bins: usize,
    /// Lower edge of first bin.
    pub low: f64,
    /// Upper edge of last bin.
    pub high: f64,
}

impl Axis {
    /// Width of a single bin.
    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.n_bins as f64
    }
}

/// An n-dimensional histogram (1 <= n <= 3).
///
/// Bin contents are stored flat with the first axis fastest-varying.
/// `sumw2` carries the per-bin sum of squared weights when the producer
/// recorded it; statistical errors fall back to `sqrt(content)` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    /// Histogram name (the key it was stored under).
    pub name: String,
    /// Histogram title.
    pub title: String,
    /// Axes, one per dimension.
    pub axes: Vec<Axis>,
    /// Bin contents (length = product of axis bin counts).
    pub bin_content: Vec<f64>,
    /// Sum of weights squared per bin, if stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sumw2: Option<Vec<f64>>,
    /// Total number of entries.
    pub entries: f64,
}

impl Histogram {
    /// Create an empty 1D histogram.
    pub fn new_1d(name: &str, n_bins: usize, low: f64, high: f64) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            axes: vec![Axis { n_bins, low, high }],
            bin_content: vec![0.0; n_bins],
            sumw2: None,
            entries: 0.0,
        }
    }

    /// Create an empty 2D histogram.
    pub fn new_2d(name: &str, x: Axis, y: Axis) -> Self {
        Self {
            name: name.to_string(),
            title: name.to_string(),
            axes: vec![x, y],
            bin_content: vec![0.0; x.n_bins * y.n_bins],
            sumw2: None,
            entries: 0.0,
        }
    }

    /// Number of dimensions (1 to 3).
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Total number of stored bins.
    pub fn n_cells(&self) -> usize {
        self.axes.iter().map(|a| a.n_bins).product()
    }

    /// Check internal consistency: supported dimension and matching lengths.
    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() || self.axes.len() > 3 {
            return Err(Error::Histogram(format!(
                "'{}': unsupported dimension {}",
                self.name,
                self.axes.len()
            )));
        }
        if self.bin_content.len() != self.n_cells() {
            return Err(Error::Histogram(format!(
                "'{}': content length {} does not match binning ({} cells)",
                self.name,
                self.bin_content.len(),
                self.n_cells()
            )));
        }
        if let Some(sw2) = &self.sumw2 {
            if sw2.len() != self.bin_content.len() {
                return Err(Error::Histogram(format!(
                    "'{}': sumw2 length {} does not match content length {}",
                    self.name,
                    sw2.len(),
                    self.bin_content.len()
                )));
            }
        }
        Ok(())
    }

    /// Whether `other` has identical binning.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.axes == other.axes
    }

    /// Sum of all bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Statistical error on a single bin.
    pub fn bin_error(&self, i: usize) -> f64 {
        match &self.sumw2 {
            Some(sw2) => sw2[i].max(0.0).sqrt(),
            None => self.bin_content[i].max(0.0).sqrt(),
        }
    }

    /// Error on the integral: sqrt of summed squared weights.
    pub fn integral_error(&self) -> f64 {
        match &self.sumw2 {
            Some(sw2) => sw2.iter().sum::<f64>().max(0.0).sqrt(),
            None => self.integral().max(0.0).sqrt(),
        }
    }

    /// Scale every bin by `factor` (sumw2 scales by `factor^2`).
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.bin_content {
            *v *= factor;
        }
        if let Some(sw2) = &mut self.sumw2 {
            for v in sw2 {
                *v *= factor * factor;
            }
        }
    }

    /// Add `other` bin-by-bin. Binnings must match exactly.
    pub fn add(&mut self, other: &Histogram) -> Result<()> {
        self.add_scaled(other, 1.0)
    }

    /// Add `factor * other` bin-by-bin. Binnings must match exactly.
    pub fn add_scaled(&mut self, other: &Histogram, factor: f64) -> Result<()> {
        if !self.same_binning(other) {
            return Err(Error::Histogram(format!(
                "cannot add '{}' to '{}': binning mismatch",
                other.name, self.name
            )));
        }
        for (v, o) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *v += factor * o;
        }
        // Missing sumw2 means unit weights: each bin's variance equals its content.
        if self.sumw2.is_some() || other.sumw2.is_some() {
            let mut sw2 = self
                .sumw2
                .take()
                .unwrap_or_else(|| self.bin_content.iter().zip(&other.bin_content).map(|(v, o)| (v - factor * o).max(0.0)).collect());
            match &other.sumw2 {
                Some(osw2) => {
                    for (v, o) in sw2.iter_mut().zip(osw2) {
                        *v += factor * factor * o;
                    }
                }
                None => {
                    for (v, o) in sw2.iter_mut().zip(&other.bin_content) {
                        *v += factor * factor * o.max(0.0);
                    }
                }
            }
            self.sumw2 = Some(sw2);
        }
        self.entries += other.entries;
        Ok(())
    }

    /// Divide bin-by-bin by `other` (bins with zero denominator become zero).
    /// Errors are propagated when both operands carry sumw2.
    pub fn divide(&mut self, other: &Histogram) -> Result<()> {
        if !self.same_binning(other) {
            return Err(Error::Histogram(format!(
                "cannot divide '{}' by '{}': binning mismatch",
                self.name, other.name
            )));
        }
        let new_sumw2 = match (&self.sumw2, &other.sumw2) {
            (Some(a2), Some(b2)) => {
                let mut sw2 = vec![0.0; self.bin_content.len()];
                for i in 0..sw2.len() {
                    let (a, b) = (self.bin_content[i], other.bin_content[i]);
                    if b != 0.0 && a != 0.0 {
                        let r = a / b;
                        sw2[i] = r * r * (a2[i] / (a * a) + b2[i] / (b * b));
                    }
                }
                Some(sw2)
            }
            _ => None,
        };
        for (v, o) in self.bin_content.iter_mut().zip(&other.bin_content) {
            *v = if *o != 0.0 { *v / *o } else { 0.0 };
        }
        self.sumw2 = new_sumw2;
        Ok(())
    }

    /// Index of the bin with the largest content.
    pub fn max_bin(&self) -> usize {
        let mut best = 0;
        for (i, v) in self.bin_content.iter().enumerate() {
            if *v > self.bin_content[best] {
                best = i;
            }
        }
        best
    }

    /// Merge bins by the given per-axis factors (one factor per dimension).
    ///
    /// Every axis bin count must be divisible by its factor. ROOT silently
    /// drops trailing bins on a non-divisor rebin; here it is an error.
    pub fn rebin(&mut self, factors: &[usize]) -> Result<()> {
        if factors.len() != self.axes.len() {
            return Err(Error::Histogram(format!(
                "'{}': {} rebin factor(s) for {} axis/axes",
                self.name,
                factors.len(),
                self.axes.len()
            )));
        }
        if factors.iter().all(|&f| f == 1) {
            return Ok(());
        }
        for (axis, &f) in self.axes.iter().zip(factors) {
            if f == 0 || axis.n_bins % f != 0 {
                return Err(Error::Histogram(format!(
                    "'{}': cannot rebin {} bins by {}",
                    self.name, axis.n_bins, f
                )));
            }
        }

        let old_axes = self.axes.clone();
        let new_axes: Vec<Axis> = old_axes
            .iter()
            .zip(factors)
            .map(|(a, &f)| Axis { n_bins: a.n_bins / f, ..*a })
            .collect();
        let new_cells: usize = new_axes.iter().map(|a| a.n_bins).product();

        let mut content = vec![0.0; new_cells];
        let mut sumw2 = self.sumw2.as_ref().map(|_| vec![0.0; new_cells]);

        // First axis is fastest-varying in the flat layout.
        let old_strides = strides(&old_axes);
        let new_strides = strides(&new_axes);
        for (flat, v) in self.bin_content.iter().enumerate() {
            let mut new_flat = 0;
            for d in 0..old_axes.len() {
                let idx = (flat / old_strides[d]) % old_axes[d].n_bins;
                new_flat += (idx / factors[d]) * new_strides[d];
            }
            content[new_flat] += v;
            if let (Some(dst), Some(src)) = (&mut sumw2, &self.sumw2) {
                dst[new_flat] += src[flat];
            }
        }

        self.axes = new_axes;
        self.bin_content = content;
        self.sumw2 = sumw2;
        Ok(())
    }
}

fn strides(axes: &[Axis]) -> Vec<usize> {
    let mut strides = vec![1; axes.len()];
    for d in 1..axes.len() {
        strides[d] = strides[d - 1] * axes[d - 1].n_bins;
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn filled_1d(name: &str, content: &[f64]) -> Histogram {
        let mut h = Histogram::new_1d(name, content.len(), 0.0, content.len() as f64);
        h.bin_content = content.to_vec();
        h.entries = content.len() as f64;
        h
    }

    #[test]
    fn test_scale_round_trip() {
        let original = filled_1d("h", &[1.0, 2.5, 4.0, 0.0]);
        let mut h = original.clone();
        h.scale(3.7);
        h.scale(1.0 / 3.7);
        for (a, b) in h.bin_content.iter().zip(&original.bin_content) {
            assert_relative_eq!(a, b, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_add_and_integral() {
        let mut a = filled_1d("a", &[1.0, 2.0, 3.0]);
        let b = filled_1d("b", &[0.5, 0.5, 0.5]);
        a.add(&b).unwrap();
        assert_relative_eq!(a.integral(), 7.5);
        assert_relative_eq!(a.entries, 6.0);
    }

    #[test]
    fn test_add_binning_mismatch() {
        let mut a = filled_1d("a", &[1.0, 2.0]);
        let b = filled_1d("b", &[1.0, 2.0, 3.0]);
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_add_merges_sumw2() {
        let mut a = filled_1d("a", &[4.0, 9.0]);
        a.sumw2 = Some(vec![2.0, 3.0]);
        let b = filled_1d("b", &[1.0, 1.0]);
        a.add(&b).unwrap();
        // b has no sumw2: unit weights, variance = content
        let sw2 = a.sumw2.as_ref().unwrap();
        assert_relative_eq!(sw2[0], 3.0);
        assert_relative_eq!(sw2[1], 4.0);
    }

    #[test]
    fn test_divide() {
        let mut num = filled_1d("n", &[2.0, 4.0, 0.0]);
        let mut den = filled_1d("d", &[1.0, 2.0, 0.0]);
        den.bin_content[2] = 0.0;
        num.divide(&den).unwrap();
        assert_relative_eq!(num.bin_content[0], 2.0);
        assert_relative_eq!(num.bin_content[1], 2.0);
        assert_relative_eq!(num.bin_content[2], 0.0);
    }

    #[test]
    fn test_rebin_1d() {
        let mut h = filled_1d("h", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        h.rebin(&[2]).unwrap();
        assert_eq!(h.axes[0].n_bins, 3);
        assert_eq!(h.bin_content, vec![3.0, 7.0, 11.0]);
        assert_relative_eq!(h.axes[0].bin_width(), 2.0);
    }

    #[test]
    fn test_rebin_2d() {
        let x = Axis { n_bins: 4, low: 0.0, high: 4.0 };
        let y = Axis { n_bins: 2, low: 0.0, high: 2.0 };
        let mut h = Histogram::new_2d("h", x, y);
        // content[x + 4*y] = x + 10*y
        for iy in 0..2 {
            for ix in 0..4 {
                h.bin_content[ix + 4 * iy] = (ix + 10 * iy) as f64;
            }
        }
        h.rebin(&[2, 1]).unwrap();
        assert_eq!(h.axes[0].n_bins, 2);
        assert_eq!(h.axes[1].n_bins, 2);
        assert_eq!(h.bin_content, vec![1.0, 5.0, 21.0, 25.0]);
    }

    #[test]
    fn test_rebin_rejects_non_divisor() {
        let mut h = filled_1d("h", &[1.0, 2.0, 3.0]);
        assert!(h.rebin(&[2]).is_err());
    }

    #[test]
    fn test_validate() {
        let mut h = filled_1d("h", &[1.0, 2.0]);
        assert!(h.validate().is_ok());
        h.bin_content.push(3.0);
        assert!(h.validate().is_err());
    }
}
