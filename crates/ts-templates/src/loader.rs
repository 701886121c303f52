//! Channel loading: walk per-sample archives and assemble per-plot channels.
//!
//! Archives are laid out as `<base>/<sample>/<file>`, one archive per input
//! sample. The loader applies use/ban filters for plot names and folder
//! paths, merges each sample's histograms into its channel, and finally
//! assembles the composite `mc` channel per plot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ts_core::{Error, Result};
use ts_hist::{Archive, Folder};

use crate::channel::{ChannelDb, MC_CHANNEL, MC_CHANNELS};
use crate::plotinfo::PlotInfoDb;
use crate::sample::{SampleDb, LUMINOSITY};
use crate::template::{ChannelTemplate, InputTemplate};

/// Use/ban filter: banned values always lose, an empty use-list accepts all.
fn allowed(use_list: &[String], ban_list: &[String], value: &str) -> bool {
    if ban_list.iter().any(|b| b == value) {
        return false;
    }
    use_list.is_empty() || use_list.iter().any(|u| u == value)
}

/// Per-plot channel maps produced by [`ChannelLoader::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadedPlots {
    /// Plot path -> channel name -> merged channel template.
    pub plots: BTreeMap<String, BTreeMap<String, ChannelTemplate>>,
}

impl LoadedPlots {
    /// Channel template for one plot, if loaded.
    pub fn channel(&self, plot: &str, channel: &str) -> Option<&ChannelTemplate> {
        self.plots.get(plot)?.get(channel)
    }

    /// Mutable channel template for one plot.
    pub fn channel_mut(&mut self, plot: &str, channel: &str) -> Option<&mut ChannelTemplate> {
        self.plots.get_mut(plot)?.get_mut(channel)
    }

    /// Channel template for one plot, failing with a descriptive error.
    pub fn require(&self, plot: &str, channel: &str) -> Result<&ChannelTemplate> {
        self.channel(plot, channel).ok_or_else(|| {
            Error::Template(format!("{} channel is not available for {}", channel, plot))
        })
    }

    /// Number of loaded plots.
    pub fn n_plots(&self) -> usize {
        self.plots.len()
    }

    /// Whether nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }
}

/// Loader configuration plus the sample/channel/plot-info databases.
#[derive(Debug, Clone)]
pub struct ChannelLoader {
    base_dir: PathBuf,
    file_name: String,
    /// Integrated luminosity used for Monte-Carlo scaling.
    pub luminosity: f64,
    /// Plot names to keep (empty = all).
    pub use_plots: Vec<String>,
    /// Plot names to skip.
    pub ban_plots: Vec<String>,
    /// Folder paths to descend into (empty = all). Root histograms are
    /// always scanned; the filter gates subfolders.
    pub use_folders: Vec<String>,
    /// Folder paths to skip.
    pub ban_folders: Vec<String>,
    /// Sample database (cross-sections, event counts).
    pub samples: SampleDb,
    /// Channel database (merge policy).
    pub channels: ChannelDb,
    /// Per-plot rebin/units table.
    pub plot_info: PlotInfoDb,
}

impl ChannelLoader {
    /// Create a loader for `<base_dir>/<sample>/<file_name>` archives with
    /// the builtin databases.
    pub fn new<P: AsRef<Path>>(base_dir: P, file_name: &str) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            file_name: file_name.to_string(),
            luminosity: LUMINOSITY,
            use_plots: Vec::new(),
            ban_plots: Vec::new(),
            use_folders: Vec::new(),
            ban_folders: Vec::new(),
            samples: SampleDb::builtin(),
            channels: ChannelDb::builtin(),
            plot_info: PlotInfoDb::builtin(),
        }
    }

    /// Archive file name inside each sample directory.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Replace the archive file name (used for systematic variations).
    pub fn set_file_name(&mut self, file_name: &str) {
        self.file_name = file_name.to_string();
    }

    /// Load the given channels and assemble the composite `mc` channel.
    pub fn load(&self, channels: &[String]) -> Result<LoadedPlots> {
        let mut loaded = LoadedPlots::default();

        for channel in channels {
            let channel_plots = self.load_channel(channel)?;
            for (plot, template) in channel_plots {
                loaded.plots.entry(plot).or_default().insert(channel.clone(), template);
            }
        }

        // The composite mc channel sums whichever backgrounds were loaded.
        for (plot, channel_map) in &mut loaded.plots {
            let mc_inputs: Vec<String> = MC_CHANNELS.iter().map(|s| s.to_string()).collect();
            let mut mc = ChannelTemplate::new(MC_CHANNEL, &mc_inputs);
            for &name in MC_CHANNELS {
                if let Some(hist) = channel_map.get(name).and_then(|c| c.hist()) {
                    mc.add(name, hist)?;
                }
            }
            if mc.n_inputs() > 0 {
                tracing::debug!(plot = plot.as_str(), inputs = mc.n_inputs(), "assembled mc channel");
                channel_map.insert(MC_CHANNEL.to_string(), mc);
            }
        }

        tracing::info!(plots = loaded.n_plots(), channels = channels.len(), "channels loaded");
        Ok(loaded)
    }

    /// Load one channel: merge all of its allowed input samples.
    fn load_channel(&self, channel: &str) -> Result<BTreeMap<String, ChannelTemplate>> {
        let allowed_inputs = self.channels.allowed_inputs(channel)?.to_vec();
        let mut channel_plots: BTreeMap<String, ChannelTemplate> = BTreeMap::new();

        for input in &allowed_inputs {
            for template in self.load_input(input)? {
                let plot = template.plot();
                channel_plots
                    .entry(plot)
                    .or_insert_with(|| ChannelTemplate::new(channel, &allowed_inputs))
                    .add_input(&template)?;
            }
        }

        Ok(channel_plots)
    }

    /// Load every filtered histogram from one sample's archive.
    fn load_input(&self, sample: &str) -> Result<Vec<InputTemplate>> {
        let path = self.base_dir.join(sample).join(&self.file_name);
        let archive = Archive::open(&path)?;
        let info = *self.samples.get(sample)?;

        let mut templates = Vec::new();
        self.scan_folder(sample, &info, archive.root(), "", &mut templates)?;
        tracing::debug!(sample, templates = templates.len(), "input loaded");
        Ok(templates)
    }

    fn scan_folder(
        &self,
        sample: &str,
        info: &crate::sample::SampleInfo,
        folder: &Folder,
        path: &str,
        out: &mut Vec<InputTemplate>,
    ) -> Result<()> {
        for (name, hist) in &folder.histograms {
            if !allowed(&self.use_plots, &self.ban_plots, name) {
                continue;
            }
            let plot = format!("{}/{}", path, name);
            let plot_info = self.plot_info.get(&plot);
            out.push(InputTemplate::new(
                sample,
                info,
                self.luminosity,
                &plot_info,
                path,
                hist.clone(),
            )?);
        }
        for (name, sub) in &folder.folders {
            let sub_path = format!("{}/{}", path, name);
            if allowed(&self.use_folders, &self.ban_folders, &sub_path) {
                self.scan_folder(sample, info, sub, &sub_path, out)?;
            }
        }
        Ok(())
    }
}
