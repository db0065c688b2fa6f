use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use scenario_forecast::summary::{OllamaSummarizer, FALLBACK_SUMMARY};
use scenario_forecast::{
    forecast_column, simulate, summarize_or_fallback, train, Adjustment, EcosimConfig,
    ForecastSeries, ScenarioDescription,
};
use sensor_ingest::{dataset, LocationMerger, VariableRole};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ecosystem sensor alignment and scenario forecasting", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align a directory of sensor files into the merged dataset
    Merge {
        /// Directory of source files (overrides `ingest.data_dir`)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Where to write the merged dataset
        #[arg(long, short, default_value = "merged_data.csv")]
        output: PathBuf,
    },
    /// Forecast one location under a what-if adjustment
    Simulate {
        /// Merged dataset produced by `merge`
        #[arg(long, default_value = "merged_data.csv")]
        input: PathBuf,
        /// Location to forecast
        #[arg(long)]
        location: String,
        #[arg(long, value_enum, default_value_t = ModelKind::Var)]
        model: ModelKind,
        /// Column to forecast with a single-variable model
        #[arg(long)]
        column: Option<String>,
        /// Forecast horizon (overrides `model.steps`)
        #[arg(long)]
        steps: Option<usize>,
        /// Largest lag order to consider (overrides `model.maxlags`)
        #[arg(long)]
        maxlags: Option<usize>,
        /// Additive delta for a column, e.g. `RainForest_Temp=1.5`
        #[arg(long = "adjust", value_parser = parse_assignment)]
        adjustments: Vec<(String, f64)>,
        /// Additive delta for a bound role, e.g. `temperature=1.5`
        #[arg(long = "role-adjust", value_parser = parse_assignment)]
        role_adjustments: Vec<(String, f64)>,
        /// Write the forecast here; `.csv` selects CSV, anything else JSON
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Ask the summary generator to describe the scenario
        #[arg(long)]
        summarize: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModelKind {
    Var,
    Arima,
    Decomposition,
}

fn parse_assignment(raw: &str) -> Result<(String, f64), String> {
    let (name, delta) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=DELTA, got '{}'", raw))?;
    let delta: f64 = delta
        .trim()
        .parse()
        .map_err(|e| format!("invalid delta in '{}': {}", raw, e))?;
    Ok((name.trim().to_string(), delta))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EcosimConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EcosimConfig::default(),
    };

    match cli.command {
        Commands::Merge { data_dir, output } => run_merge(&config, data_dir, &output),
        Commands::Simulate {
            input,
            location,
            model,
            column,
            steps,
            maxlags,
            adjustments,
            role_adjustments,
            output,
            summarize,
        } => {
            let steps = steps.unwrap_or(config.model.steps);
            let maxlags = maxlags.unwrap_or(config.model.maxlags);

            let mut loaded = dataset::read_merged_dataset(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            if let Some((_, error)) = loaded.failed.iter().find(|(name, _)| *name == location) {
                bail!("location '{}' in {} is unusable: {}", location, input.display(), error);
            }
            let mut series = loaded
                .merged
                .remove(&location)
                .ok_or_else(|| anyhow!("location '{}' not found in {}", location, input.display()))?;
            let dropped = series.drop_empty_columns();
            if !dropped.is_empty() {
                warn!(?dropped, "dropping columns with no values");
            }
            if let Some(bindings) = config.roles_for(&location)? {
                series.bind_roles(&bindings)?;
            }

            let mut adjustment: Adjustment = adjustments.into_iter().collect();
            for (role, delta) in role_adjustments {
                let role: VariableRole = role.parse()?;
                adjustment.insert_role(&series, role, delta)?;
            }

            let forecast = match model {
                ModelKind::Var => {
                    let fitted = train(&series, maxlags)?;
                    info!(model = %fitted.name(), selection = ?fitted.selection(), "trained");
                    simulate(&series, &fitted, &adjustment, steps)?
                }
                ModelKind::Arima | ModelKind::Decomposition => {
                    let column = column
                        .as_deref()
                        .ok_or_else(|| anyhow!("--column is required for {:?}", model))?;
                    if !adjustment.is_empty() {
                        warn!("adjustments only apply to the VAR model; ignoring them");
                        adjustment = Adjustment::new();
                    }
                    if model == ModelKind::Arima {
                        forecast_column(&config.arima(), &series, column, steps)?
                    } else {
                        forecast_column(&config.decomposition()?, &series, column, steps)?
                    }
                }
            };

            write_forecast(&forecast, output.as_deref())?;

            if summarize {
                let description = ScenarioDescription::from_forecast(&forecast, &adjustment);
                let summary = match config.summarizer() {
                    Some(summarizer) => describe(&summarizer, &description),
                    None => FALLBACK_SUMMARY.to_string(),
                };
                println!("{}", summary);
            }
            Ok(())
        }
    }
}

fn run_merge(config: &EcosimConfig, data_dir: Option<PathBuf>, output: &Path) -> anyhow::Result<()> {
    let dir = data_dir.unwrap_or_else(|| config.ingest.data_dir.clone());
    let loaded = dataset::load_directory(&dir, &config.parser(), &config.ingest.extension)
        .with_context(|| format!("scanning {}", dir.display()))?;
    for (path, error) in &loaded.skipped {
        warn!(file = %path.display(), %error, "skipped");
    }
    if loaded.frames.is_empty() {
        bail!("no usable source files in {}", dir.display());
    }

    let outcome = LocationMerger::merge_all(&loaded.frames);
    for (location, error) in &outcome.failed {
        warn!(location = %location, %error, "location not merged");
    }
    dataset::write_merged_dataset(output, outcome.merged.values())
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        files = loaded.frames.len(),
        skipped = loaded.skipped.len(),
        locations = outcome.merged.len(),
        output = %output.display(),
        "merge complete"
    );
    Ok(())
}

fn describe(summarizer: &OllamaSummarizer, description: &ScenarioDescription) -> String {
    info!(timeout = ?summarizer.timeout(), "requesting scenario summary");
    summarize_or_fallback(summarizer, description)
}

fn write_forecast(forecast: &ForecastSeries, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) if path.extension().map_or(false, |e| e.eq_ignore_ascii_case("csv")) => {
            forecast.write_csv(File::create(path)?)?;
            info!(path = %path.display(), rows = forecast.len(), "wrote forecast");
        }
        Some(path) => {
            std::fs::write(path, forecast.to_json()?)?;
            info!(path = %path.display(), rows = forecast.len(), "wrote forecast");
        }
        None => println!("{}", forecast.to_json()?),
    }
    Ok(())
}
