//! Input and channel templates.
//!
//! An [`InputTemplate`] is one histogram from one sample's archive, scaled to
//! cross-section and luminosity and rebinned on construction. A
//! [`ChannelTemplate`] is the running sum of the input templates merged into
//! one physics channel, guarded by the channel's allowed-input policy.

use std::collections::BTreeSet;

use ts_core::{Error, Result};
use ts_hist::Histogram;

use crate::plotinfo::PlotInfo;
use crate::sample::SampleInfo;

/// A single input histogram plus its source metadata.
#[derive(Debug, Clone)]
pub struct InputTemplate {
    /// Sample this template came from.
    pub sample: String,
    /// Folder path inside the archive (`""` for root).
    pub path: String,
    /// Scale factor that was applied (`xsection * luminosity / events`,
    /// 1 for data-like samples).
    pub scale: f64,
    /// Per-axis units from the plot-info table.
    pub units: Vec<String>,
    /// The scaled, rebinned histogram.
    pub hist: Histogram,
}

impl InputTemplate {
    /// Build a template from a raw archive histogram.
    ///
    /// The histogram is scaled by `xsection * luminosity / events` (data-like
    /// samples pass through unscaled) and rebinned per the plot-info table.
    pub fn new(
        sample: &str,
        info: &SampleInfo,
        luminosity: f64,
        plot_info: &PlotInfo,
        path: &str,
        mut hist: Histogram,
    ) -> Result<Self> {
        hist.validate()?;
        let scale = info.scale(luminosity);
        if scale != 1.0 {
            hist.scale(scale);
        }
        if !plot_info.rebin.is_empty() {
            let mut factors = plot_info.rebin.clone();
            // A single listed factor applies to the first axis only.
            factors.resize(hist.dimension(), 1);
            hist.rebin(&factors)?;
        }
        Ok(Self {
            sample: sample.to_string(),
            path: path.to_string(),
            scale,
            units: plot_info.units.clone(),
            hist,
        })
    }

    /// Histogram name (the key it was stored under).
    pub fn name(&self) -> &str {
        &self.hist.name
    }

    /// Full plot path, e.g. `/ltop/mass`.
    pub fn plot(&self) -> String {
        format!("{}/{}", self.path, self.hist.name)
    }
}

/// A channel: merged sum of allowed input templates.
#[derive(Debug, Clone)]
pub struct ChannelTemplate {
    channel: String,
    allowed_inputs: Vec<String>,
    input_types: BTreeSet<String>,
    hist: Option<Histogram>,
}

impl ChannelTemplate {
    /// Create an empty channel with its allowed-input policy.
    pub fn new(channel: &str, allowed_inputs: &[String]) -> Self {
        Self {
            channel: channel.to_string(),
            allowed_inputs: allowed_inputs.to_vec(),
            input_types: BTreeSet::new(),
            hist: None,
        }
    }

    /// Channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Inputs this channel accepts.
    pub fn allowed_inputs(&self) -> &[String] {
        &self.allowed_inputs
    }

    /// Input types merged so far.
    pub fn input_types(&self) -> impl Iterator<Item = &str> {
        self.input_types.iter().map(|s| s.as_str())
    }

    /// Number of inputs merged so far.
    pub fn n_inputs(&self) -> usize {
        self.input_types.len()
    }

    /// Add one named input histogram to the channel sum.
    ///
    /// Inputs outside the allowed list are an error, as are empty histograms.
    /// An input type that was already merged is silently ignored.
    pub fn add(&mut self, input_type: &str, hist: &Histogram) -> Result<()> {
        if !self.allowed_inputs.iter().any(|i| i == input_type) {
            return Err(Error::Template(format!(
                "can not add input template {:?} to channel {:?}",
                input_type, self.channel
            )));
        }
        if self.input_types.contains(input_type) {
            return Ok(());
        }
        if hist.bin_content.is_empty() {
            return Err(Error::Template(format!(
                "attempt to add input template {:?} without histogram",
                input_type
            )));
        }
        match &mut self.hist {
            Some(sum) => sum.add(hist)?,
            None => self.hist = Some(hist.clone()),
        }
        self.input_types.insert(input_type.to_string());
        Ok(())
    }

    /// Add an [`InputTemplate`], keyed by its sample name.
    pub fn add_input(&mut self, template: &InputTemplate) -> Result<()> {
        self.add(&template.sample, &template.hist)
    }

    /// The summed histogram, if any input was merged.
    pub fn hist(&self) -> Option<&Histogram> {
        self.hist.as_ref()
    }

    /// Sum of the merged histogram, 0 for an empty channel.
    pub fn integral(&self) -> f64 {
        self.hist.as_ref().map_or(0.0, |h| h.integral())
    }

    /// Error on the integral.
    pub fn integral_error(&self) -> f64 {
        self.hist.as_ref().map_or(0.0, |h| h.integral_error())
    }

    /// Scale the channel sum (no-op for an empty channel).
    pub fn scale(&mut self, factor: f64) {
        if let Some(h) = &mut self.hist {
            h.scale(factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plotinfo::PlotInfoDb;
    use crate::sample::{SampleDb, LUMINOSITY};
    use approx::assert_relative_eq;

    fn raw_hist(content: &[f64]) -> Histogram {
        let mut h = Histogram::new_1d("met", content.len(), 0.0, content.len() as f64);
        h.bin_content = content.to_vec();
        h.entries = content.iter().sum();
        h
    }

    fn input(sample: &str, content: &[f64]) -> InputTemplate {
        let db = SampleDb::builtin();
        InputTemplate::new(
            sample,
            db.get(sample).unwrap(),
            LUMINOSITY,
            &PlotInfo::default(),
            "",
            raw_hist(content),
        )
        .unwrap()
    }

    #[test]
    fn test_input_template_is_scaled() {
        let template = input("ttbar", &[10.0, 20.0]);
        let expected = 163.0 * LUMINOSITY / 3_701_947.0;
        assert_relative_eq!(template.scale, expected, max_relative = 1e-12);
        assert_relative_eq!(template.hist.bin_content[0], 10.0 * expected, max_relative = 1e-12);
    }

    #[test]
    fn test_data_template_is_not_scaled() {
        let template = input("rereco_2011a_may10", &[10.0, 20.0]);
        assert_relative_eq!(template.scale, 1.0);
        assert_relative_eq!(template.hist.bin_content[0], 10.0);
    }

    #[test]
    fn test_input_template_rebins() {
        let db = SampleDb::builtin();
        let infos = PlotInfoDb::builtin();
        let mut h = Histogram::new_1d("met", 100, 0.0, 500.0);
        h.bin_content = vec![1.0; 100];
        let template = InputTemplate::new(
            "qcd_from_data",
            db.get("qcd_from_data").unwrap(),
            LUMINOSITY,
            &infos.get("/met"),
            "",
            h,
        )
        .unwrap();
        assert_eq!(template.hist.axes[0].n_bins, 4);
        assert_relative_eq!(template.hist.bin_content[0], 25.0);
        assert_eq!(template.plot(), "/met");
    }

    #[test]
    fn test_channel_sums_allowed_inputs() {
        let mut channel =
            ChannelTemplate::new("stop", &["stop_s".to_string(), "stop_t".to_string()]);
        channel.add("stop_s", &raw_hist(&[1.0, 2.0])).unwrap();
        channel.add("stop_t", &raw_hist(&[3.0, 4.0])).unwrap();
        assert_eq!(channel.n_inputs(), 2);
        assert_relative_eq!(channel.integral(), 10.0);
    }

    #[test]
    fn test_channel_rejects_disallowed_input() {
        let mut channel = ChannelTemplate::new("ttbar", &["ttbar".to_string()]);
        let err = channel.add("wjets", &raw_hist(&[1.0])).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
        assert_eq!(channel.n_inputs(), 0);
    }

    #[test]
    fn test_channel_rejects_empty_histogram() {
        let mut channel = ChannelTemplate::new("ttbar", &["ttbar".to_string()]);
        let empty = Histogram::new_1d("met", 0, 0.0, 0.0);
        assert!(channel.add("ttbar", &empty).is_err());
    }

    #[test]
    fn test_channel_ignores_duplicate_input() {
        let mut channel = ChannelTemplate::new("ttbar", &["ttbar".to_string()]);
        channel.add("ttbar", &raw_hist(&[1.0, 1.0])).unwrap();
        channel.add("ttbar", &raw_hist(&[5.0, 5.0])).unwrap();
        assert_eq!(channel.n_inputs(), 1);
        assert_relative_eq!(channel.integral(), 2.0);
    }

    #[test]
    fn test_channel_scale() {
        let mut channel = ChannelTemplate::new("qcd", &["qcd_from_data".to_string()]);
        channel.add("qcd_from_data", &raw_hist(&[2.0, 2.0])).unwrap();
        channel.scale(0.5);
        assert_relative_eq!(channel.integral(), 2.0);
    }
}
