//! Monte-Carlo sample database: cross-sections and generated-event counts.

use std::collections::BTreeMap;

use ts_core::{Error, Result};

/// Integrated luminosity of the analyzed dataset, in pb^-1.
pub const LUMINOSITY: f64 = 4328.472;

/// Cross-section and number of processed events for one Monte-Carlo sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleInfo {
    /// Process cross-section in pb.
    pub xsection: f64,
    /// Number of processed events in the sample.
    pub events: f64,
}

impl SampleInfo {
    /// Create a new sample record.
    pub fn new(xsection: f64, events: f64) -> Self {
        Self { xsection, events }
    }

    /// Data-like samples carry `events == 0` and are never rescaled.
    pub fn is_data(&self) -> bool {
        self.events == 0.0
    }

    /// Scale factor normalizing the sample to `luminosity`.
    pub fn scale(&self, luminosity: f64) -> f64 {
        if self.is_data() {
            1.0
        } else {
            self.xsection * luminosity / self.events
        }
    }
}

/// Registry of known input samples.
///
/// The builtin table is the analysis bookkeeping: per-process cross-sections
/// (highest available order) and the event counts of the processed datasets.
/// The table is extensible at runtime; looking up an unregistered sample is
/// an error.
#[derive(Debug, Clone)]
pub struct SampleDb {
    samples: BTreeMap<String, SampleInfo>,
}

impl SampleDb {
    /// Empty database.
    pub fn empty() -> Self {
        Self { samples: BTreeMap::new() }
    }

    /// The builtin sample table.
    pub fn builtin() -> Self {
        let mut db = Self::empty();
        // NNLO x-section: 163 instead of NLO: 157.5 or LO: 94.76
        db.insert("ttbar", SampleInfo::new(163.0, 3_701_947.0));
        db.insert("ttbar_powheg", SampleInfo::new(163.0, 16_330_372.0));
        db.insert("ttbar_scaling_up", SampleInfo::new(163.0, 930_483.0));
        db.insert("ttbar_scaling_down", SampleInfo::new(163.0, 967_055.0));
        db.insert("ttbar_matching_up", SampleInfo::new(163.0, 1_057_479.0));
        db.insert("ttbar_matching_down", SampleInfo::new(163.0, 1_065_323.0));

        // NLO x-section: 3048 instead of LO: 2475
        db.insert("zjets", SampleInfo::new(3048.0, 36_277_961.0));

        // NLO x-section: 31314 instead of LO: 27770
        db.insert("wjets", SampleInfo::new(31314.0, 77_105_816.0));
        db.insert("wjets_scaling_up", SampleInfo::new(31314.0, 9_784_907.0));
        db.insert("wjets_scaling_down", SampleInfo::new(31314.0, 10_022_324.0));
        db.insert("wjets_matching_up", SampleInfo::new(31314.0, 10_461_655.0));
        db.insert("wjets_matching_down", SampleInfo::new(31314.0, 9_956_679.0));

        db.insert("stop_s", SampleInfo::new(3.19, 259_971.0));
        db.insert("stop_t", SampleInfo::new(41.92, 3_900_171.0));
        db.insert("stop_tw", SampleInfo::new(7.87, 814_390.0));
        db.insert("satop_s", SampleInfo::new(1.44, 137_980.0));
        db.insert("satop_t", SampleInfo::new(22.65, 1_944_826.0));
        db.insert("satop_tw", SampleInfo::new(7.87, 809_984.0));

        // Z' samples are produced at a reference 5 pb
        db.insert("zprime_m1000_w10", SampleInfo::new(5.0, 207_992.0));
        db.insert("zprime_m1500_w15", SampleInfo::new(5.0, 168_383.0));
        db.insert("zprime_m2000_w20", SampleInfo::new(5.0, 179_315.0));
        db.insert("zprime_m3000_w30", SampleInfo::new(5.0, 195_410.0));
        db.insert("zprime_m4000_w40", SampleInfo::new(5.0, 180_381.0));

        // zero number of events means: do not scale
        db.insert("rereco_2011a_may10", SampleInfo::new(1.0, 0.0));
        db.insert("rereco_2011a_aug05", SampleInfo::new(1.0, 0.0));
        db.insert("prompt_2011a_v4", SampleInfo::new(1.0, 0.0));
        db.insert("prompt_2011a_v6", SampleInfo::new(1.0, 0.0));
        db.insert("prompt_2011b_v1", SampleInfo::new(1.0, 0.0));

        // QCD estimated from data
        db.insert("qcd_from_data", SampleInfo::new(1.0, 0.0));
        db
    }

    /// Look up a sample, failing on unknown names.
    pub fn get(&self, name: &str) -> Result<&SampleInfo> {
        self.samples.get(name).ok_or_else(|| Error::UnknownSample(name.to_string()))
    }

    /// Whether a sample is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.samples.contains_key(name)
    }

    /// Register (or replace) a sample.
    pub fn insert(&mut self, name: &str, info: SampleInfo) {
        self.samples.insert(name.to_string(), info);
    }

    /// Remove a sample, returning its record if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<SampleInfo> {
        self.samples.remove(name)
    }

    /// Iterate over registered sample names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(|s| s.as_str())
    }
}
