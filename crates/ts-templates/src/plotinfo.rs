//! Per-plot presentation/binning table: rebin factors and axis units.

use std::collections::BTreeMap;

/// Units strings shared by many plots.
const MOMENTUM_UNITS: &str = "GeV/c";
const MASS_UNITS: &str = "GeV/c^2";

/// Rebin factors and units for one plot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotInfo {
    /// Per-axis bin-merge factors applied on load (empty = keep binning).
    pub rebin: Vec<usize>,
    /// Per-axis units (empty string = dimensionless).
    pub units: Vec<String>,
}

impl PlotInfo {
    fn rebin1(factor: usize) -> Self {
        Self { rebin: vec![factor], units: Vec::new() }
    }

    fn units1(units: &str) -> Self {
        Self { rebin: Vec::new(), units: vec![units.to_string()] }
    }

    fn new1(factor: usize, units: &str) -> Self {
        Self { rebin: vec![factor], units: vec![units.to_string()] }
    }
}

/// Lookup table of per-plot info, keyed by full plot path (e.g. `/met`).
#[derive(Debug, Clone)]
pub struct PlotInfoDb {
    infos: BTreeMap<String, PlotInfo>,
}

impl PlotInfoDb {
    /// Empty table (no rebinning anywhere).
    pub fn empty() -> Self {
        Self { infos: BTreeMap::new() }
    }

    /// The builtin table of the analysis.
    pub fn builtin() -> Self {
        let mut db = Self::empty();
        db.set("/d0", PlotInfo::units1("cm"));
        db.set("/htlep", PlotInfo::units1(MOMENTUM_UNITS));
        db.set("/htall", PlotInfo::units1(MOMENTUM_UNITS));
        db.set("/htlep_after_htlep", PlotInfo::new1(25, MOMENTUM_UNITS));
        db.set("/htlep_before_htlep", PlotInfo::new1(25, MOMENTUM_UNITS));
        db.set("/htlep_before_htlep_qcd_noweight", PlotInfo::new1(25, MOMENTUM_UNITS));
        db.set("/mttbar_before_htlep", PlotInfo::new1(100, MASS_UNITS));
        db.set("/mttbar_after_htlep", PlotInfo::new1(100, MASS_UNITS));
        db.set(
            "/dr_vs_ptrel",
            PlotInfo { rebin: Vec::new(), units: vec![String::new(), MOMENTUM_UNITS.to_string()] },
        );
        db.set("/ttbar_pt", PlotInfo::units1(MOMENTUM_UNITS));
        db.set("/wlep_mt", PlotInfo::units1(MASS_UNITS));
        db.set("/whad_mt", PlotInfo::units1(MASS_UNITS));
        db.set("/wlep_mass", PlotInfo::units1(MASS_UNITS));
        db.set("/whad_mass", PlotInfo::units1(MASS_UNITS));
        db.set("/met", PlotInfo::new1(25, MOMENTUM_UNITS));
        db.set("/met_noweight", PlotInfo::new1(25, MOMENTUM_UNITS));
        db.set("/ltop/mass", PlotInfo::rebin1(25));
        db.set("/htop/mass", PlotInfo::rebin1(25));
        db.set("/ltop/pt", PlotInfo::rebin1(25));
        db.set("/htop/pt", PlotInfo::rebin1(25));
        db
    }

    /// Info for a plot path; default (no rebin, no units) when unlisted.
    pub fn get(&self, plot: &str) -> PlotInfo {
        self.infos.get(plot).cloned().unwrap_or_default()
    }

    /// Register (or replace) info for a plot path.
    pub fn set(&mut self, plot: &str, info: PlotInfo) {
        self.infos.insert(plot.to_string(), info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_met_rebin() {
        let db = PlotInfoDb::builtin();
        assert_eq!(db.get("/met").rebin, vec![25]);
        assert_eq!(db.get("/met_noweight").rebin, vec![25]);
    }

    #[test]
    fn test_mttbar_rebin() {
        let db = PlotInfoDb::builtin();
        assert_eq!(db.get("/mttbar_after_htlep").rebin, vec![100]);
        assert_eq!(db.get("/mttbar_after_htlep").units, vec![MASS_UNITS.to_string()]);
    }

    #[test]
    fn test_unlisted_plot_defaults() {
        let db = PlotInfoDb::builtin();
        assert_eq!(db.get("/njets"), PlotInfo::default());
    }

    #[test]
    fn test_subfolder_plot() {
        let db = PlotInfoDb::builtin();
        assert_eq!(db.get("/ltop/mass").rebin, vec![25]);
    }
}
