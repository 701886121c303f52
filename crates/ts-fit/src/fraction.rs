//! Template-fraction fit of data against MC and QCD shapes.
//!
//! The model is the one `TFractionFitter` implements for two components:
//! the predicted content of bin `i` is
//!
//! ```text
//! mu_i = N_data * (f_mc * t_mc_i + f_qcd * t_qcd_i)
//! ```
//!
//! with unit-normalized templates, and the fit minimizes the binned Poisson
//! negative log-likelihood over the fractions. The MC template is the
//! *unweighted* Monte-Carlo shape multiplied by per-bin weights taken from
//! the weighted/unweighted ratio, so the fit sees the event weighting the
//! analysis applies.

use nalgebra::DMatrix;
use ts_core::{Error, FractionFitResult, Result};
use ts_hist::Histogram;
use ts_templates::channel::{MC_CHANNEL, MC_CHANNELS};
use ts_templates::loader::LoadedPlots;

use crate::optimizer::{LbfgsOptimizer, ObjectiveFunction, OptimizerConfig};

/// Plot used to extract the fractions.
pub const FIT_PLOT: &str = "/met";
/// Unweighted companion of [`FIT_PLOT`].
pub const FIT_PLOT_NOWEIGHT: &str = "/met_noweight";

/// Per-bin MC weights: weighted content over unweighted content.
///
/// Bins where the ratio is not positive are forced to 1 so empty regions do
/// not null the template.
pub fn mc_weights(weighted: &Histogram, unweighted: &Histogram) -> Result<Vec<f64>> {
    if !weighted.same_binning(unweighted) {
        return Err(Error::Fit("weighted and unweighted MC have different binning".to_string()));
    }
    Ok(weighted
        .bin_content
        .iter()
        .zip(&unweighted.bin_content)
        .map(|(&w, &u)| {
            let ratio = if u != 0.0 { w / u } else { 0.0 };
            if ratio > 0.0 {
                ratio
            } else {
                1.0
            }
        })
        .collect())
}

/// Binned Poisson negative log-likelihood over component fractions.
struct FractionNll {
    data: Vec<f64>,
    n_data: f64,
    /// Unit-normalized component templates, one per fraction.
    templates: Vec<Vec<f64>>,
}

impl FractionNll {
    fn mu(&self, params: &[f64], bin: usize) -> f64 {
        let mut mu = 0.0;
        for (f, t) in params.iter().zip(&self.templates) {
            mu += f * t[bin];
        }
        // guard against log(0) at the edge of the parameter box
        (self.n_data * mu).max(1e-12)
    }
}

impl ObjectiveFunction for FractionNll {
    fn eval(&self, params: &[f64]) -> Result<f64> {
        let mut nll = 0.0;
        for (i, &d) in self.data.iter().enumerate() {
            let mu = self.mu(params, i);
            nll += mu - d * mu.ln();
        }
        Ok(nll)
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut grad = vec![0.0; params.len()];
        for (i, &d) in self.data.iter().enumerate() {
            let mu = self.mu(params, i);
            for (j, t) in self.templates.iter().enumerate() {
                grad[j] += self.n_data * t[i] * (1.0 - d / mu);
            }
        }
        Ok(grad)
    }
}

fn unit_normalized(label: &str, content: &[f64]) -> Result<Vec<f64>> {
    let integral: f64 = content.iter().sum();
    if integral <= 0.0 {
        return Err(Error::Fit(format!("{} template has non-positive integral", label)));
    }
    Ok(content.iter().map(|v| v / integral).collect())
}

/// Fits the data/MC/QCD fractions.
#[derive(Debug, Clone, Default)]
pub struct FractionFitter {
    config: OptimizerConfig,
}

impl FractionFitter {
    /// Fitter with default optimizer settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitter with custom optimizer settings.
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Fit fractions from explicit histograms.
    ///
    /// `mc` and `mc_noweight` are the weighted and unweighted combined
    /// Monte-Carlo shapes; their ratio provides the per-bin weights.
    pub fn fit(
        &self,
        data: &Histogram,
        mc: &Histogram,
        mc_noweight: &Histogram,
        qcd: &Histogram,
    ) -> Result<FractionFitResult> {
        for (label, h) in [("mc", mc), ("qcd", qcd)] {
            if !data.same_binning(h) {
                return Err(Error::Fit(format!("{} and data have different binning", label)));
            }
        }
        let weights = mc_weights(mc, mc_noweight)?;

        let n_data = data.integral();
        if n_data <= 0.0 {
            return Err(Error::Fit("data histogram is empty".to_string()));
        }

        let mc_template: Vec<f64> = mc_noweight
            .bin_content
            .iter()
            .zip(&weights)
            .map(|(&u, &w)| w * u.max(0.0))
            .collect();
        let qcd_template: Vec<f64> = qcd.bin_content.iter().map(|&v| v.max(0.0)).collect();

        let nll = FractionNll {
            data: data.bin_content.clone(),
            n_data,
            templates: vec![
                unit_normalized("mc", &mc_template)?,
                unit_normalized("qcd", &qcd_template)?,
            ],
        };

        let bounds = [(0.0, 1.0), (0.0, 1.0)];
        let result = LbfgsOptimizer::new(self.config.clone()).minimize(&nll, &[0.5, 0.5], &bounds)?;
        if !result.converged {
            return Err(Error::Fit(format!("fraction fit did not converge: {}", result.message)));
        }

        let hessian = compute_hessian(&nll, &result.parameters)?;
        let n = result.parameters.len();
        let components = vec!["mc".to_string(), "qcd".to_string()];

        let fit_result = match invert_hessian(&hessian, n) {
            Some(covariance) => {
                let mut uncertainties = Vec::with_capacity(n);
                let mut all_ok = true;
                for i in 0..n {
                    let var = covariance[(i, i)];
                    if var.is_finite() && var > 0.0 {
                        uncertainties.push(var.sqrt());
                    } else {
                        all_ok = false;
                        uncertainties.push(diagonal_uncertainty(&hessian, i));
                    }
                }
                if all_ok {
                    FractionFitResult::with_covariance(
                        components,
                        result.parameters,
                        uncertainties,
                        covariance.iter().copied().collect(),
                        result.fval,
                        result.converged,
                        result.n_fev,
                    )
                } else {
                    tracing::warn!("invalid covariance diagonal; omitting covariance matrix");
                    FractionFitResult::new(
                        components,
                        result.parameters,
                        uncertainties,
                        result.fval,
                        result.converged,
                        result.n_fev,
                    )
                }
            }
            None => {
                let uncertainties = (0..n).map(|i| diagonal_uncertainty(&hessian, i)).collect();
                FractionFitResult::new(
                    components,
                    result.parameters,
                    uncertainties,
                    result.fval,
                    result.converged,
                    result.n_fev,
                )
            }
        };

        tracing::info!(
            mc = fit_result.fractions[0],
            qcd = fit_result.fractions[1],
            nll = fit_result.nll,
            "fractions fitted"
        );
        Ok(fit_result)
    }

    /// Fit fractions from loaded plots, the way the analysis does it: data,
    /// QCD and combined MC from `/met`, unweighted MC from `/met_noweight`.
    pub fn fit_from_met(&self, plots: &LoadedPlots) -> Result<FractionFitResult> {
        let met = plots
            .plots
            .get(FIT_PLOT)
            .ok_or_else(|| Error::Fit("load plots 'met', 'met_noweight'".to_string()))?;
        let met_noweight = plots
            .plots
            .get(FIT_PLOT_NOWEIGHT)
            .ok_or_else(|| Error::Fit("load plots 'met', 'met_noweight'".to_string()))?;

        let hist_of = |channel: &str| {
            met.get(channel)
                .and_then(|c| c.hist())
                .ok_or_else(|| Error::Fit(format!("{} is not loaded", channel.to_uppercase())))
        };
        let data = hist_of("data")?;
        let qcd = hist_of("qcd")?;
        let mc = hist_of(MC_CHANNEL)?;
        let mc_noweight = met_noweight
            .get(MC_CHANNEL)
            .and_then(|c| c.hist())
            .ok_or_else(|| Error::Fit("Monte-Carlo is not loaded".to_string()))?;

        self.fit(data, mc, mc_noweight, qcd)
    }
}

/// Numerical Hessian via central second differences.
fn compute_hessian(objective: &dyn ObjectiveFunction, params: &[f64]) -> Result<DMatrix<f64>> {
    let n = params.len();
    let f0 = objective.eval(params)?;
    let steps: Vec<f64> = params.iter().map(|p| 1e-4 * p.abs().max(1.0)).collect();
    let mut hessian = DMatrix::zeros(n, n);

    let eval_at = |shifts: &[(usize, f64)]| -> Result<f64> {
        let mut p = params.to_vec();
        for &(k, dx) in shifts {
            p[k] += dx;
        }
        objective.eval(&p)
    };

    for i in 0..n {
        let hi = steps[i];
        let f_plus = eval_at(&[(i, hi)])?;
        let f_minus = eval_at(&[(i, -hi)])?;
        hessian[(i, i)] = (f_plus - 2.0 * f0 + f_minus) / (hi * hi);

        for j in (i + 1)..n {
            let hj = steps[j];
            let f_pp = eval_at(&[(i, hi), (j, hj)])?;
            let f_pm = eval_at(&[(i, hi), (j, -hj)])?;
            let f_mp = eval_at(&[(i, -hi), (j, hj)])?;
            let f_mm = eval_at(&[(i, -hi), (j, -hj)])?;
            let value = (f_pp - f_pm - f_mp + f_mm) / (4.0 * hi * hj);
            hessian[(i, j)] = value;
            hessian[(j, i)] = value;
        }
    }
    Ok(hessian)
}

fn invert_hessian(hessian: &DMatrix<f64>, n: usize) -> Option<DMatrix<f64>> {
    if n == 0 {
        return None;
    }
    hessian.clone().try_inverse()
}

/// Fallback uncertainty when the covariance is unusable: `1/sqrt(H_ii)`.
fn diagonal_uncertainty(hessian: &DMatrix<f64>, i: usize) -> f64 {
    let h = hessian[(i, i)];
    if h > 0.0 {
        1.0 / h.sqrt()
    } else {
        f64::NAN
    }
}

/// Scale loaded channels to the fitted fractions.
///
/// For every plot, QCD is scaled to `f_qcd * data / qcd` and the combined MC
/// (plus every loaded MC subchannel) to `f_mc * data / mc`. A plot missing a
/// required channel is skipped with a warning rather than failing the run.
pub fn apply_fractions(result: &FractionFitResult, plots: &mut LoadedPlots) -> Result<()> {
    let (mc_fraction, _) =
        result.fraction("mc").ok_or_else(|| Error::Fit("no mc fraction in result".to_string()))?;
    let (qcd_fraction, _) =
        result.fraction("qcd").ok_or_else(|| Error::Fit("no qcd fraction in result".to_string()))?;

    for (plot, channel_map) in plots.plots.iter_mut() {
        if let Err(error) = apply_to_plot(plot, channel_map, mc_fraction, qcd_fraction) {
            tracing::warn!(plot = plot.as_str(), %error, "failed to apply fitted fractions");
        }
    }
    Ok(())
}

fn apply_to_plot(
    plot: &str,
    channel_map: &mut std::collections::BTreeMap<String, ts_templates::ChannelTemplate>,
    mc_fraction: f64,
    qcd_fraction: f64,
) -> Result<()> {
    let integral_of = |channel: &str| {
        channel_map.get(channel).map(|c| c.integral()).ok_or_else(|| {
            Error::Template(format!("{} channel is not available for {}", channel, plot))
        })
    };
    let data_integral = integral_of("data")?;
    let mc_integral = integral_of(MC_CHANNEL)?;
    let qcd_integral = integral_of("qcd")?;
    if mc_integral == 0.0 || qcd_integral == 0.0 {
        return Err(Error::Template(format!("empty mc or qcd channel for {}", plot)));
    }

    let qcd_scale = qcd_fraction * data_integral / qcd_integral;
    let mc_scale = mc_fraction * data_integral / mc_integral;

    if let Some(qcd) = channel_map.get_mut("qcd") {
        qcd.scale(qcd_scale);
    }
    if let Some(mc) = channel_map.get_mut(MC_CHANNEL) {
        mc.scale(mc_scale);
    }
    for &subchannel in MC_CHANNELS {
        if let Some(channel) = channel_map.get_mut(subchannel) {
            channel.scale(mc_scale);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ts_templates::ChannelTemplate;

    fn hist(name: &str, content: &[f64]) -> Histogram {
        let mut h = Histogram::new_1d(name, content.len(), 0.0, content.len() as f64);
        h.bin_content = content.to_vec();
        h.entries = content.iter().sum();
        h
    }

    #[test]
    fn test_mc_weights_forces_empty_bins_to_one() {
        let weighted = hist("met", &[2.0, 0.0, 3.0, -1.0]);
        let unweighted = hist("met_noweight", &[4.0, 5.0, 3.0, 2.0]);
        let w = mc_weights(&weighted, &unweighted).unwrap();
        assert_relative_eq!(w[0], 0.5);
        assert_relative_eq!(w[1], 1.0);
        assert_relative_eq!(w[2], 1.0);
        assert_relative_eq!(w[3], 1.0);
    }

    #[test]
    fn test_mc_weights_binning_mismatch() {
        assert!(mc_weights(&hist("a", &[1.0]), &hist("b", &[1.0, 2.0])).is_err());
    }

    #[test]
    fn test_fit_recovers_exact_fractions() {
        // data built as exactly 0.7 MC + 0.3 QCD
        let mc_shape = [10.0, 30.0, 40.0, 20.0];
        let qcd_shape = [40.0, 30.0, 20.0, 10.0];
        let n_data = 1000.0;
        let mc_sum: f64 = mc_shape.iter().sum();
        let qcd_sum: f64 = qcd_shape.iter().sum();
        let data: Vec<f64> = (0..4)
            .map(|i| n_data * (0.7 * mc_shape[i] / mc_sum + 0.3 * qcd_shape[i] / qcd_sum))
            .collect();

        let mc = hist("met_mc", &mc_shape);
        let qcd = hist("met_qcd", &qcd_shape);
        let data = hist("met_data", &data);

        let result = FractionFitter::new().fit(&data, &mc, &mc, &qcd).unwrap();
        assert!(result.converged);
        let (f_mc, e_mc) = result.fraction("mc").unwrap();
        let (f_qcd, e_qcd) = result.fraction("qcd").unwrap();
        assert_relative_eq!(f_mc, 0.7, epsilon = 1e-3);
        assert_relative_eq!(f_qcd, 0.3, epsilon = 1e-3);
        assert!(e_mc > 0.0 && e_mc < 0.2);
        assert!(e_qcd > 0.0 && e_qcd < 0.2);
    }

    #[test]
    fn test_fit_uses_mc_weights() {
        // weighted MC is half the unweighted one in every bin: the weight
        // cancels after normalization, so the fit still recovers 0.7/0.3
        let unweighted = [20.0, 60.0, 80.0, 40.0];
        let weighted: Vec<f64> = unweighted.iter().map(|v| 0.5 * v).collect();
        let qcd_shape = [40.0, 30.0, 20.0, 10.0];
        let n_data = 500.0;
        let mc_sum: f64 = weighted.iter().sum();
        let qcd_sum: f64 = qcd_shape.iter().sum();
        let data: Vec<f64> = (0..4)
            .map(|i| n_data * (0.7 * weighted[i] / mc_sum + 0.3 * qcd_shape[i] / qcd_sum))
            .collect();

        let result = FractionFitter::new()
            .fit(
                &hist("data", &data),
                &hist("mc", &weighted),
                &hist("mc_noweight", &unweighted),
                &hist("qcd", &qcd_shape),
            )
            .unwrap();
        assert_relative_eq!(result.fraction("mc").unwrap().0, 0.7, epsilon = 1e-3);
    }

    #[test]
    fn test_fit_rejects_empty_data() {
        let empty = hist("data", &[0.0, 0.0]);
        let shape = hist("t", &[1.0, 1.0]);
        assert!(FractionFitter::new().fit(&empty, &shape, &shape, &shape).is_err());
    }

    #[test]
    fn test_fit_from_met_requires_plots() {
        let plots = LoadedPlots::default();
        let err = FractionFitter::new().fit_from_met(&plots).unwrap_err();
        assert!(err.to_string().contains("'met', 'met_noweight'"));
    }

    fn channel(name: &str, content: &[f64]) -> ChannelTemplate {
        let mut c = ChannelTemplate::new(name, &[name.to_string()]);
        c.add(name, &hist("met", content)).unwrap();
        c
    }

    #[test]
    fn test_apply_fractions_scales_channels() {
        let mut plots = LoadedPlots::default();
        let map = plots.plots.entry("/met".to_string()).or_default();
        map.insert("data".to_string(), channel("data", &[60.0, 40.0]));
        map.insert("qcd".to_string(), channel("qcd", &[10.0, 10.0]));
        map.insert("mc".to_string(), channel("mc", &[30.0, 30.0]));
        map.insert("ttbar".to_string(), channel("ttbar", &[15.0, 15.0]));

        let result = FractionFitResult::new(
            vec!["mc".to_string(), "qcd".to_string()],
            vec![0.8, 0.2],
            vec![0.01, 0.01],
            0.0,
            true,
            1,
        );
        apply_fractions(&result, &mut plots).unwrap();

        // data integral 100: qcd -> 20, mc -> 80, ttbar scaled like mc
        assert_relative_eq!(plots.channel("/met", "qcd").unwrap().integral(), 20.0);
        assert_relative_eq!(plots.channel("/met", "mc").unwrap().integral(), 80.0);
        let mc_scale = 0.8 * 100.0 / 60.0;
        assert_relative_eq!(plots.channel("/met", "ttbar").unwrap().integral(), 30.0 * mc_scale);
    }

    #[test]
    fn test_apply_fractions_skips_incomplete_plots() {
        let mut plots = LoadedPlots::default();
        let map = plots.plots.entry("/njets".to_string()).or_default();
        map.insert("data".to_string(), channel("data", &[1.0]));

        let result = FractionFitResult::new(
            vec!["mc".to_string(), "qcd".to_string()],
            vec![0.8, 0.2],
            vec![0.01, 0.01],
            0.0,
            true,
            1,
        );
        // incomplete plot is skipped, not fatal
        apply_fractions(&result, &mut plots).unwrap();
        assert_relative_eq!(plots.channel("/njets", "data").unwrap().integral(), 1.0);
    }
}
