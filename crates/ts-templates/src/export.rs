//! Export of fitted templates for the downstream theta fitter.
//!
//! theta expects one histogram per channel named
//! `el_mttbar__<channel>[__<systematic>__(plus|minus)]` at the root of its
//! input archive, with channel names translated to its own vocabulary.

use std::path::{Path, PathBuf};

use ts_core::{Error, Result};
use ts_hist::Archive;

use crate::loader::LoadedPlots;

/// The plot exported to theta.
pub const EXPORT_PLOT: &str = "/mttbar_after_htlep";

/// theta channel name for one of our channels, if it is exported at all.
pub fn theta_channel_name(channel: &str) -> Option<&'static str> {
    match channel {
        "ttbar" => Some("ttbar"),
        "zjets" => Some("zjets"),
        "wjets" => Some("wjets"),
        "stop" => Some("singletop"),
        "qcd" => Some("eleqcd"),
        "data" => Some("DATA"),
        "zprime_m1000_w10" => Some("zp1000"),
        "zprime_m1500_w15" => Some("zp1500"),
        "zprime_m2000_w20" => Some("zp2000"),
        "zprime_m3000_w30" => Some("zp3000"),
        "zprime_m4000_w40" => Some("zp4000"),
        _ => None,
    }
}

/// Writes scaled channel templates into a theta input archive.
#[derive(Debug, Clone)]
pub struct ThetaExporter {
    output: PathBuf,
    /// Systematic tag, e.g. `jes+` or `jes-`; `None` for nominal export.
    pub systematic: Option<String>,
    /// Channels to save (empty = all exportable channels).
    pub save_channels: Vec<String>,
}

impl ThetaExporter {
    /// Create an exporter writing to `output` (opened in update mode).
    pub fn new<P: AsRef<Path>>(output: P) -> Self {
        Self { output: output.as_ref().to_path_buf(), systematic: None, save_channels: Vec::new() }
    }

    /// Histogram-name suffix for the configured systematic.
    ///
    /// `jes+` becomes `__jes__plus`, `jes-` becomes `__jes__minus`; a tag
    /// without a trailing sign is an error.
    fn suffix(&self) -> Result<String> {
        let Some(systematic) = &self.systematic else {
            return Ok(String::new());
        };
        let (name, direction) = match systematic.strip_suffix('+') {
            Some(name) => (name, "plus"),
            None => match systematic.strip_suffix('-') {
                Some(name) => (name, "minus"),
                None => {
                    return Err(Error::Validation(format!(
                        "systematic {:?} must end with '+' or '-'",
                        systematic
                    )))
                }
            },
        };
        if name.is_empty() {
            return Err(Error::Validation(format!("empty systematic name in {:?}", systematic)));
        }
        Ok(format!("__{}__{}", name, direction))
    }

    /// Export the mttbar channel templates to the output archive.
    pub fn export(&self, plots: &LoadedPlots) -> Result<()> {
        let channels = plots
            .plots
            .get(EXPORT_PLOT)
            .ok_or_else(|| Error::Template("mttbar_after_htlep is not loaded".to_string()))?;

        let suffix = self.suffix()?;
        let mut archive = Archive::update(&self.output)?;
        let mut saved = 0usize;

        for (channel, template) in channels {
            let Some(theta_name) = theta_channel_name(channel) else {
                continue;
            };
            if !self.save_channels.is_empty() && !self.save_channels.iter().any(|c| c == channel) {
                continue;
            }
            let Some(hist) = template.hist() else {
                continue;
            };

            let mut hist = hist.clone();
            // Z' templates are produced at 5 pb; theta wants 1 pb.
            if channel.starts_with("zprime") {
                hist.scale(1.0 / 5.0);
            }

            let name = format!("el_mttbar__{}{}", theta_name, suffix);
            archive.insert(&format!("/{}", name), hist)?;
            saved += 1;
        }

        archive.save()?;
        tracing::info!(output = %self.output.display(), channels = saved, "theta templates saved");
        Ok(())
    }
}
