//! Channel database: which input samples merge into which physics channel.

use std::collections::BTreeMap;

use ts_core::{Error, Result};

/// Channels summed into the composite `mc` background.
pub const MC_CHANNELS: &[&str] = &["ttbar", "zjets", "wjets", "stop"];

/// Name of the composite Monte-Carlo channel assembled by the loader.
pub const MC_CHANNEL: &str = "mc";

/// Registry mapping channel names to the input samples they merge.
///
/// Some channels are unions of several samples: the six single-top datasets
/// merge into `stop`, and the run eras merge into `data`.
#[derive(Debug, Clone)]
pub struct ChannelDb {
    channels: BTreeMap<String, Vec<String>>,
}

impl ChannelDb {
    /// Empty database.
    pub fn empty() -> Self {
        Self { channels: BTreeMap::new() }
    }

    /// The builtin channel table of the analysis.
    pub fn builtin() -> Self {
        let mut db = Self::empty();
        db.insert("ttbar", &["ttbar"]);
        db.insert("zjets", &["zjets"]);
        db.insert("wjets", &["wjets"]);
        db.insert(
            "stop",
            &["stop_s", "stop_t", "stop_tw", "satop_s", "satop_t", "satop_tw"],
        );
        db.insert(
            "data",
            &[
                "rereco_2011a_may10",
                "rereco_2011a_aug05",
                "prompt_2011a_v4",
                "prompt_2011a_v6",
                "prompt_2011b_v1",
            ],
        );
        db.insert("qcd", &["qcd_from_data"]);
        db.insert("zprime_m1000_w10", &["zprime_m1000_w10"]);
        db.insert("zprime_m1500_w15", &["zprime_m1500_w15"]);
        db.insert("zprime_m2000_w20", &["zprime_m2000_w20"]);
        db.insert("zprime_m3000_w30", &["zprime_m3000_w30"]);
        db.insert("zprime_m4000_w40", &["zprime_m4000_w40"]);
        db
    }

    /// Inputs allowed in a channel; unknown channels are an error.
    pub fn allowed_inputs(&self, channel: &str) -> Result<&[String]> {
        self.channels
            .get(channel)
            .map(|v| v.as_slice())
            .ok_or_else(|| Error::UnknownChannel(channel.to_string()))
    }

    /// Whether a channel is registered.
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Register (or replace) a channel and its allowed inputs.
    pub fn insert(&mut self, channel: &str, inputs: &[&str]) {
        self.channels
            .insert(channel.to_string(), inputs.iter().map(|s| s.to_string()).collect());
    }

    /// Remove a channel.
    pub fn remove(&mut self, channel: &str) -> Option<Vec<String>> {
        self.channels.remove(channel)
    }

    /// Iterate over registered channel names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_channels() {
        let db = ChannelDb::builtin();
        for name in ["ttbar", "zjets", "wjets", "stop", "data", "qcd", "zprime_m1000_w10"] {
            assert!(db.contains(name), "missing builtin channel {:?}", name);
        }
        assert!(!db.contains("qcd_bc"));
    }

    #[test]
    fn test_stop_merges_single_top() {
        let db = ChannelDb::builtin();
        let inputs = db.allowed_inputs("stop").unwrap();
        assert_eq!(inputs.len(), 6);
        assert!(inputs.iter().any(|i| i == "satop_tw"));
    }

    #[test]
    fn test_data_merges_run_eras() {
        let db = ChannelDb::builtin();
        assert_eq!(db.allowed_inputs("data").unwrap().len(), 5);
    }

    #[test]
    fn test_unknown_channel() {
        let db = ChannelDb::builtin();
        assert!(matches!(db.allowed_inputs("junk"), Err(Error::UnknownChannel(_))));
    }

    #[test]
    fn test_mc_channel_list() {
        // the composite mc channel merges every background except qcd
        assert_eq!(MC_CHANNELS, &["ttbar", "zjets", "wjets", "stop"]);
    }
}
