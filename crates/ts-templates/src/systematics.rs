//! Systematic-variation bookkeeping: nominal/plus/minus template triples.
//!
//! Variation archives live next to the nominal one, named
//! `<stem>_<systematic>_plus.<ext>` and `<stem>_<systematic>_minus.<ext>`.

use std::collections::BTreeMap;

use ts_core::{Error, Result};

use crate::loader::ChannelLoader;
use crate::template::ChannelTemplate;

/// Nominal and shifted copies of one channel template.
#[derive(Debug, Clone, Default)]
pub struct SystematicSet {
    /// Nominal template.
    pub nominal: Option<ChannelTemplate>,
    /// +1 sigma variation.
    pub plus: Option<ChannelTemplate>,
    /// -1 sigma variation.
    pub minus: Option<ChannelTemplate>,
}

impl SystematicSet {
    /// Relative yield shifts of the variations against nominal.
    pub fn shift(&self) -> Option<SystematicShift> {
        let nominal = self.nominal.as_ref()?.integral();
        if nominal == 0.0 {
            return None;
        }
        Some(SystematicShift {
            plus: self.plus.as_ref().map(|c| c.integral() / nominal - 1.0),
            minus: self.minus.as_ref().map(|c| c.integral() / nominal - 1.0),
        })
    }
}

/// Relative yield shift of the plus/minus variations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystematicShift {
    /// `(plus - nominal) / nominal`, if the plus variation was loaded.
    pub plus: Option<f64>,
    /// `(minus - nominal) / nominal`, if the minus variation was loaded.
    pub minus: Option<f64>,
}

/// Loads nominal and shifted channels for one named systematic.
#[derive(Debug, Clone)]
pub struct SystematicsLoader {
    loader: ChannelLoader,
    file_name: String,
    systematic: String,
    /// Load the +1 sigma archive.
    pub load_plus: bool,
    /// Load the -1 sigma archive.
    pub load_minus: bool,
}

impl SystematicsLoader {
    /// Create a loader around a configured [`ChannelLoader`].
    ///
    /// `file_name` is the nominal archive file name the loader was built
    /// with; variation names are derived from it.
    pub fn new(loader: ChannelLoader, file_name: &str, systematic: &str) -> Self {
        Self {
            loader,
            file_name: file_name.to_string(),
            systematic: systematic.to_string(),
            load_plus: true,
            load_minus: true,
        }
    }

    /// Archive file name for one variation, e.g. `templates_jes_plus.json`.
    fn variation_file(&self, direction: &str) -> Result<String> {
        let (stem, ext) = self.file_name.rsplit_once('.').ok_or_else(|| {
            Error::Validation(format!("file name {:?} has no extension", self.file_name))
        })?;
        Ok(format!("{}_{}_{}.{}", stem, self.systematic, direction, ext))
    }

    /// Load the nominal plus requested variations for the given channels.
    pub fn load(
        &self,
        channels: &[String],
    ) -> Result<BTreeMap<String, BTreeMap<String, SystematicSet>>> {
        let mut plots: BTreeMap<String, BTreeMap<String, SystematicSet>> = BTreeMap::new();

        let nominal = self.loader.load(channels)?;
        merge(&mut plots, nominal, |set, template| set.nominal = Some(template));

        if self.load_plus {
            let mut loader = self.loader.clone();
            loader.set_file_name(&self.variation_file("plus")?);
            tracing::debug!(systematic = self.systematic.as_str(), "loading plus variation");
            merge(&mut plots, loader.load(channels)?, |set, template| set.plus = Some(template));
        }

        if self.load_minus {
            let mut loader = self.loader.clone();
            loader.set_file_name(&self.variation_file("minus")?);
            tracing::debug!(systematic = self.systematic.as_str(), "loading minus variation");
            merge(&mut plots, loader.load(channels)?, |set, template| set.minus = Some(template));
        }

        Ok(plots)
    }
}

fn merge<F>(
    plots: &mut BTreeMap<String, BTreeMap<String, SystematicSet>>,
    loaded: crate::loader::LoadedPlots,
    mut assign: F,
) where
    F: FnMut(&mut SystematicSet, ChannelTemplate),
{
    for (plot, channel_map) in loaded.plots {
        let sets = plots.entry(plot).or_default();
        for (channel, template) in channel_map {
            assign(sets.entry(channel).or_default(), template);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_with(content: &[f64]) -> ChannelTemplate {
        let mut h = ts_hist::Histogram::new_1d("mttbar", content.len(), 0.0, 1.0);
        h.bin_content = content.to_vec();
        let mut c = ChannelTemplate::new("ttbar", &["ttbar".to_string()]);
        c.add("ttbar", &h).unwrap();
        c
    }

    #[test]
    fn test_shift() {
        let set = SystematicSet {
            nominal: Some(channel_with(&[10.0])),
            plus: Some(channel_with(&[11.0])),
            minus: Some(channel_with(&[8.0])),
        };
        let shift = set.shift().unwrap();
        assert!((shift.plus.unwrap() - 0.1).abs() < 1e-12);
        assert!((shift.minus.unwrap() + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_shift_without_nominal() {
        let set = SystematicSet { nominal: None, plus: Some(channel_with(&[1.0])), minus: None };
        assert!(set.shift().is_none());
    }

    #[test]
    fn test_variation_file_name() {
        let loader = ChannelLoader::new("/tmp", "templates.json");
        let syst = SystematicsLoader::new(loader, "templates.json", "jes");
        assert_eq!(syst.variation_file("plus").unwrap(), "templates_jes_plus.json");
        assert_eq!(syst.variation_file("minus").unwrap(), "templates_jes_minus.json");
    }

    #[test]
    fn test_variation_file_requires_extension() {
        let loader = ChannelLoader::new("/tmp", "templates");
        let syst = SystematicsLoader::new(loader, "templates", "jes");
        assert!(syst.variation_file("plus").is_err());
    }
}
