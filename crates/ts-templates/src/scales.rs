//! User-supplied channel scale factors from a plain-text file.
//!
//! One `channel scale` pair per line; blank lines and `#` comments are
//! skipped.

use std::collections::BTreeMap;
use std::path::Path;

use ts_core::{Error, Result};

use crate::loader::LoadedPlots;

/// Parsed channel scale factors.
#[derive(Debug, Clone, Default)]
pub struct Scales {
    scales: BTreeMap<String, f64>,
}

impl Scales {
    /// Load scales from a text file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut scales = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (channel, value) = match (parts.next(), parts.next(), parts.next()) {
                (Some(channel), Some(value), None) => (channel, value),
                _ => {
                    return Err(Error::Validation(format!(
                        "{}:{}: expected 'channel scale', got {:?}",
                        path.display(),
                        lineno + 1,
                        line
                    )))
                }
            };
            let scale: f64 = value.parse().map_err(|_| {
                Error::Validation(format!(
                    "{}:{}: bad scale value {:?}",
                    path.display(),
                    lineno + 1,
                    value
                ))
            })?;
            scales.insert(channel.to_string(), scale);
        }
        Ok(Self { scales })
    }

    /// Scale factor for a channel, if listed.
    pub fn get(&self, channel: &str) -> Option<f64> {
        self.scales.get(channel).copied()
    }

    /// Number of listed channels.
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    /// Whether the file listed no channels.
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// Apply the scales to every loaded plot.
    pub fn apply(&self, plots: &mut LoadedPlots) {
        for channel_map in plots.plots.values_mut() {
            for (channel, template) in channel_map.iter_mut() {
                if let Some(scale) = self.get(channel) {
                    template.scale(scale);
                }
            }
        }
    }
}
