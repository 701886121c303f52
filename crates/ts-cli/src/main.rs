//! tstat CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use ts_fit::{apply_fractions, FractionFitter};
use ts_templates::export::ThetaExporter;
use ts_templates::{ChannelLoader, LoadedPlots, Scales, SystematicsLoader};

mod filter;
mod report;

use filter::split_use_and_ban;
use report::{format_yields, yield_rows, TableFormat};

#[derive(Parser)]
#[command(name = "tstat")]
#[command(about = "tstat - template aggregation and fraction fitting")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the QCD/MC fractions on the missing-ET plot and report yields
    Fit {
        /// Base directory holding per-sample archive folders
        #[arg(short, long)]
        input: PathBuf,

        /// Archive file name inside each sample directory
        #[arg(long, default_value = "templates.json")]
        file_name: String,

        /// Channels to load
        #[arg(long, value_delimiter = ',', default_value = "data,qcd,ttbar,zjets,wjets,stop")]
        channels: Vec<String>,

        /// Plot name filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        plots: Vec<String>,

        /// Folder path filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        folders: Vec<String>,

        /// Integrated luminosity in 1/pb (MC scaling)
        #[arg(long)]
        luminosity: Option<f64>,

        /// User scale file ("channel scale" lines, '#' comments)
        #[arg(long)]
        scales: Option<PathBuf>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Per-plot per-channel yield tables
    Yields {
        /// Base directory holding per-sample archive folders
        #[arg(short, long)]
        input: PathBuf,

        /// Archive file name inside each sample directory
        #[arg(long, default_value = "templates.json")]
        file_name: String,

        /// Channels to load
        #[arg(long, value_delimiter = ',', default_value = "data,qcd,ttbar,zjets,wjets,stop")]
        channels: Vec<String>,

        /// Plot name filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        plots: Vec<String>,

        /// Folder path filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        folders: Vec<String>,

        /// Integrated luminosity in 1/pb (MC scaling)
        #[arg(long)]
        luminosity: Option<f64>,

        /// User scale file ("channel scale" lines, '#' comments)
        #[arg(long)]
        scales: Option<PathBuf>,

        /// Table markup
        #[arg(long, value_enum, default_value = "text")]
        format: TableFormat,
    },

    /// Export fraction-fitted mttbar templates for the theta fitter
    Export {
        /// Base directory holding per-sample archive folders
        #[arg(short, long)]
        input: PathBuf,

        /// Archive file name inside each sample directory
        #[arg(long, default_value = "templates.json")]
        file_name: String,

        /// Channels to load
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "data,qcd,ttbar,zjets,wjets,stop,zprime_m1000_w10,zprime_m1500_w15,zprime_m2000_w20,zprime_m3000_w30,zprime_m4000_w40"
        )]
        channels: Vec<String>,

        /// Integrated luminosity in 1/pb (MC scaling)
        #[arg(long)]
        luminosity: Option<f64>,

        /// User scale file ("channel scale" lines, '#' comments)
        #[arg(long)]
        scales: Option<PathBuf>,

        /// Skip the fraction fit (export raw scaled templates)
        #[arg(long)]
        no_fit: bool,

        /// Systematic tag for the exported names, e.g. 'jes+' or 'jes-'
        #[arg(long)]
        systematic: Option<String>,

        /// Channels to save (default: every exportable channel)
        #[arg(long, value_delimiter = ',')]
        save_channels: Vec<String>,

        /// Output theta archive (opened in update mode)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Relative yield shifts of a named systematic against nominal
    Systematics {
        /// Base directory holding per-sample archive folders
        #[arg(short, long)]
        input: PathBuf,

        /// Archive file name inside each sample directory
        #[arg(long, default_value = "templates.json")]
        file_name: String,

        /// Systematic name, e.g. 'jes'
        #[arg(long)]
        systematic: String,

        /// Channels to load
        #[arg(long, value_delimiter = ',', default_value = "ttbar,zjets,wjets,stop")]
        channels: Vec<String>,

        /// Plot name filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        plots: Vec<String>,

        /// Folder path filters; prefix with '-' to ban
        #[arg(long, value_delimiter = ',')]
        folders: Vec<String>,

        /// Integrated luminosity in 1/pb (MC scaling)
        #[arg(long)]
        luminosity: Option<f64>,

        /// Skip the +1 sigma archives
        #[arg(long)]
        skip_plus: bool,

        /// Skip the -1 sigma archives
        #[arg(long)]
        skip_minus: bool,

        /// Output file for results (pretty JSON). Defaults to a text listing
        /// on stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fit { input, file_name, channels, plots, folders, luminosity, scales, output } => {
            cmd_fit(&input, &file_name, &channels, &plots, &folders, luminosity, scales.as_ref(), output.as_ref())
        }
        Commands::Yields {
            input,
            file_name,
            channels,
            plots,
            folders,
            luminosity,
            scales,
            format,
        } => cmd_yields(&input, &file_name, &channels, &plots, &folders, luminosity, scales.as_ref(), format),
        Commands::Export {
            input,
            file_name,
            channels,
            luminosity,
            scales,
            no_fit,
            systematic,
            save_channels,
            output,
        } => cmd_export(
            &input,
            &file_name,
            &channels,
            luminosity,
            scales.as_ref(),
            no_fit,
            systematic,
            save_channels,
            &output,
        ),
        Commands::Systematics {
            input,
            file_name,
            systematic,
            channels,
            plots,
            folders,
            luminosity,
            skip_plus,
            skip_minus,
            output,
        } => cmd_systematics(
            &input,
            &file_name,
            &systematic,
            &channels,
            &plots,
            &folders,
            luminosity,
            skip_plus,
            skip_minus,
            output.as_ref(),
        ),
    }
}

fn build_loader(
    input: &Path,
    file_name: &str,
    luminosity: Option<f64>,
    plots: &[String],
    folders: &[String],
) -> ChannelLoader {
    let mut loader = ChannelLoader::new(input, file_name);
    if let Some(lumi) = luminosity {
        loader.luminosity = lumi;
    }
    let (use_plots, ban_plots) = split_use_and_ban(plots);
    loader.use_plots = use_plots;
    loader.ban_plots = ban_plots;
    let (use_folders, ban_folders) = split_use_and_ban(folders);
    loader.use_folders = use_folders;
    loader.ban_folders = ban_folders;
    loader
}

fn apply_scale_file(scales: Option<&PathBuf>, plots: &mut LoadedPlots) -> Result<()> {
    if let Some(path) = scales {
        let scales = Scales::load(path)?;
        tracing::info!(path = %path.display(), channels = scales.len(), "user scales loaded");
        scales.apply(plots);
    }
    Ok(())
}

fn yields_json(plots: &LoadedPlots) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for plot in plots.plots.keys() {
        let mut channels = serde_json::Map::new();
        for row in yield_rows(plots, plot) {
            channels.insert(
                row.channel,
                serde_json::json!({ "events": row.events, "error": row.error }),
            );
        }
        out.insert(plot.clone(), serde_json::Value::Object(channels));
    }
    serde_json::Value::Object(out)
}

#[allow(clippy::too_many_arguments)]
fn cmd_fit(
    input: &Path,
    file_name: &str,
    channels: &[String],
    plots: &[String],
    folders: &[String],
    luminosity: Option<f64>,
    scales: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let loader = build_loader(input, file_name, luminosity, plots, folders);
    let mut loaded = loader.load(channels)?;
    apply_scale_file(scales, &mut loaded)?;

    let result = FractionFitter::new().fit_from_met(&loaded)?;
    tracing::info!(nll = result.nll, converged = result.converged, "fraction fit complete");
    apply_fractions(&result, &mut loaded)?;

    let output_json = serde_json::json!({
        "components": result.components,
        "fractions": result.fractions,
        "uncertainties": result.uncertainties,
        "covariance": result.covariance,
        "nll": result.nll,
        "converged": result.converged,
        "n_evaluations": result.n_evaluations,
        "yields": yields_json(&loaded),
    });

    write_json(output, output_json)
}

#[allow(clippy::too_many_arguments)]
fn cmd_yields(
    input: &Path,
    file_name: &str,
    channels: &[String],
    plots: &[String],
    folders: &[String],
    luminosity: Option<f64>,
    scales: Option<&PathBuf>,
    format: TableFormat,
) -> Result<()> {
    let loader = build_loader(input, file_name, luminosity, plots, folders);
    let mut loaded = loader.load(channels)?;
    apply_scale_file(scales, &mut loaded)?;

    for plot in loaded.plots.keys() {
        let rows = yield_rows(&loaded, plot);
        println!("{}", format_yields(plot, &rows, format));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_export(
    input: &Path,
    file_name: &str,
    channels: &[String],
    luminosity: Option<f64>,
    scales: Option<&PathBuf>,
    no_fit: bool,
    systematic: Option<String>,
    save_channels: Vec<String>,
    output: &Path,
) -> Result<()> {
    let mut loader = build_loader(input, file_name, luminosity, &[], &[]);
    // only the plots the export path needs
    loader.use_plots = if no_fit {
        vec!["mttbar_after_htlep".to_string()]
    } else {
        vec!["mttbar_after_htlep".to_string(), "met".to_string(), "met_noweight".to_string()]
    };

    let mut loaded = loader.load(channels)?;
    apply_scale_file(scales, &mut loaded)?;

    if !no_fit {
        let result = FractionFitter::new().fit_from_met(&loaded)?;
        tracing::info!(nll = result.nll, converged = result.converged, "fraction fit complete");
        apply_fractions(&result, &mut loaded)?;
    }

    let mut exporter = ThetaExporter::new(output);
    exporter.systematic = systematic;
    exporter.save_channels = save_channels;
    exporter.export(&loaded)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_systematics(
    input: &Path,
    file_name: &str,
    systematic: &str,
    channels: &[String],
    plots: &[String],
    folders: &[String],
    luminosity: Option<f64>,
    skip_plus: bool,
    skip_minus: bool,
    output: Option<&PathBuf>,
) -> Result<()> {
    let loader = build_loader(input, file_name, luminosity, plots, folders);
    let mut syst_loader = SystematicsLoader::new(loader, file_name, systematic);
    syst_loader.load_plus = !skip_plus;
    syst_loader.load_minus = !skip_minus;

    let sets = syst_loader.load(channels)?;

    if let Some(path) = output {
        let mut out = serde_json::Map::new();
        for (plot, channel_sets) in &sets {
            let mut per_channel = serde_json::Map::new();
            for (channel, set) in channel_sets {
                if let Some(shift) = set.shift() {
                    per_channel.insert(
                        channel.clone(),
                        serde_json::json!({ "plus": shift.plus, "minus": shift.minus }),
                    );
                }
            }
            out.insert(plot.clone(), serde_json::Value::Object(per_channel));
        }
        return write_json(Some(path), serde_json::Value::Object(out));
    }

    for (plot, channel_sets) in &sets {
        println!("{}", plot);
        for (channel, set) in channel_sets {
            let Some(shift) = set.shift() else {
                continue;
            };
            let fmt = |s: Option<f64>| match s {
                Some(v) => format!("{:+.2}%", 100.0 * v),
                None => "n/a".to_string(),
            };
            println!("  {:<20} plus {:>8}  minus {:>8}", channel, fmt(shift.plus), fmt(shift.minus));
        }
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
