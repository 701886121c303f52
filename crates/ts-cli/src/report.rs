//! Yield tables in plain-text, LaTeX and wiki markup.

use clap::ValueEnum;
use ts_templates::LoadedPlots;

/// Output markup for yield tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableFormat {
    /// Aligned plain text.
    Text,
    /// LaTeX tabular rows.
    Latex,
    /// Wiki table rows.
    Wiki,
}

/// One channel's yield for a plot.
#[derive(Debug, Clone)]
pub struct YieldRow {
    /// Channel name.
    pub channel: String,
    /// Integral of the channel histogram.
    pub events: f64,
    /// Error on the integral.
    pub error: f64,
}

/// Per-channel yields for one plot, in channel-name order.
pub fn yield_rows(plots: &LoadedPlots, plot: &str) -> Vec<YieldRow> {
    plots
        .plots
        .get(plot)
        .map(|channel_map| {
            channel_map
                .iter()
                .map(|(channel, template)| YieldRow {
                    channel: channel.clone(),
                    events: template.integral(),
                    error: template.integral_error(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Render a yield table for one plot.
pub fn format_yields(plot: &str, rows: &[YieldRow], format: TableFormat) -> String {
    match format {
        TableFormat::Text => format_text(plot, rows),
        TableFormat::Latex => format_latex(plot, rows),
        TableFormat::Wiki => format_wiki(plot, rows),
    }
}

fn format_text(plot: &str, rows: &[YieldRow]) -> String {
    let width = rows.iter().map(|r| r.channel.len()).max().unwrap_or(7).max("channel".len());
    let mut out = format!("{}\n  {:<width$}  {:>12}  {:>10}\n", plot, "channel", "events", "error");
    for row in rows {
        out.push_str(&format!(
            "  {:<width$}  {:>12.2}  {:>10.2}\n",
            row.channel, row.events, row.error
        ));
    }
    out
}

fn format_latex(plot: &str, rows: &[YieldRow]) -> String {
    let mut out = format!("% {}\nchannel & events \\\\\n\\hline\n", plot);
    for row in rows {
        out.push_str(&format!(
            "{} & ${:.2} \\pm {:.2}$ \\\\\n",
            row.channel.replace('_', "\\_"),
            row.events,
            row.error
        ));
    }
    out
}

fn format_wiki(plot: &str, rows: &[YieldRow]) -> String {
    let mut out = format!("|| {} || events ||\n", plot);
    for row in rows {
        out.push_str(&format!("| {} | {:.2} +- {:.2} |\n", row.channel, row.events, row.error));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_hist::Histogram;
    use ts_templates::ChannelTemplate;

    fn plots_with_met() -> LoadedPlots {
        let mut plots = LoadedPlots::default();
        let map = plots.plots.entry("/met".to_string()).or_default();
        for (channel, content) in [("data", vec![30.0, 30.0]), ("ttbar", vec![10.0, 20.0])] {
            let mut h = Histogram::new_1d("met", content.len(), 0.0, 100.0);
            h.bin_content = content;
            let mut template = ChannelTemplate::new(channel, &[channel.to_string()]);
            template.add(channel, &h).unwrap();
            map.insert(channel.to_string(), template);
        }
        plots
    }

    #[test]
    fn test_yield_rows() {
        let rows = yield_rows(&plots_with_met(), "/met");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].channel, "data");
        assert!((rows[0].events - 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_yield_rows_missing_plot() {
        assert!(yield_rows(&plots_with_met(), "/njets").is_empty());
    }

    #[test]
    fn test_text_table() {
        let rows = yield_rows(&plots_with_met(), "/met");
        let table = format_yields("/met", &rows, TableFormat::Text);
        assert!(table.starts_with("/met\n"));
        assert!(table.contains("ttbar"));
        assert!(table.contains("30.00"));
    }

    #[test]
    fn test_latex_table_escapes_underscores() {
        let mut plots = plots_with_met();
        let map = plots.plots.get_mut("/met").unwrap();
        let mut h = Histogram::new_1d("met", 1, 0.0, 1.0);
        h.bin_content = vec![1.0];
        let mut template = ChannelTemplate::new("zprime_m1000_w10", &["zprime_m1000_w10".into()]);
        template.add("zprime_m1000_w10", &h).unwrap();
        map.insert("zprime_m1000_w10".to_string(), template);

        let rows = yield_rows(&plots, "/met");
        let table = format_yields("/met", &rows, TableFormat::Latex);
        assert!(table.contains("zprime\\_m1000\\_w10"));
        assert!(table.contains("\\pm"));
    }

    #[test]
    fn test_wiki_table() {
        let rows = yield_rows(&plots_with_met(), "/met");
        let table = format_yields("/met", &rows, TableFormat::Wiki);
        assert!(table.starts_with("|| /met || events ||"));
        // error without sumw2 is sqrt(integral)
        assert!(table.contains("| ttbar | 30.00 +- 5.48 |"));
    }
}
