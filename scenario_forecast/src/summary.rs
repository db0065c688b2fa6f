//! Plain-text scenario descriptions and the natural-language summary collaborator
//!
//! The summary is advisory. Any failure of the external generator degrades to
//! [`FALLBACK_SUMMARY`] and never aborts the pipeline.

use crate::forecast::ForecastSeries;
use crate::simulator::Adjustment;
use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Returned whenever a summary cannot be produced
pub const FALLBACK_SUMMARY: &str = "Expert analysis could not be generated at this time.";

/// How often a running generator is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for stdout to close once the generator has exited or been killed
const READER_GRACE: Duration = Duration::from_secs(1);

/// What the summarizer is told about a scenario
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDescription {
    pub ecosystem: String,
    pub model: String,
    pub adjustments: Vec<(String, f64)>,
    pub steps: usize,
}

impl ScenarioDescription {
    pub fn new(ecosystem: &str, model: &str, adjustment: &Adjustment, steps: usize) -> Self {
        Self {
            ecosystem: ecosystem.to_string(),
            model: model.to_string(),
            adjustments: adjustment.iter().map(|(c, d)| (c.to_string(), d)).collect(),
            steps,
        }
    }

    /// Describe a finished forecast
    pub fn from_forecast(forecast: &ForecastSeries, adjustment: &Adjustment) -> Self {
        Self::new(forecast.location(), forecast.model(), adjustment, forecast.len())
    }

    /// Prompt text sent to the generator
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ScenarioDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ecosystem: {}", self.ecosystem)?;
        if self.adjustments.is_empty() {
            writeln!(f, "Adjustments: none (baseline forecast)")?;
        } else {
            writeln!(f, "Adjustments:")?;
            for (column, delta) in &self.adjustments {
                writeln!(f, "  {}: {:+}", column, delta)?;
            }
        }
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "Horizon: {} steps", self.steps)?;
        write!(
            f,
            "Summarize the likely ecological effects of this scenario in plain language."
        )
    }
}

/// Errors from a summary generator
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Failed to start summary generator: {0}")]
    SpawnError(#[from] std::io::Error),

    #[error("Summary generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Summary generator failed: {0}")]
    GeneratorError(String),
}

/// Turns a scenario description into natural-language text
pub trait SummaryGenerator {
    fn generate(&self, prompt: &str) -> Result<String, SummaryError>;
}

/// Runs `<command> run <model> <prompt>` and reads the answer from stdout
#[derive(Debug, Clone)]
pub struct OllamaSummarizer {
    command: String,
    model: String,
    timeout: Duration,
}

impl OllamaSummarizer {
    pub fn new(command: &str, model: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_string(),
            model: model.to_string(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for OllamaSummarizer {
    fn default() -> Self {
        Self::new("ollama", "phi3", Duration::from_secs(60))
    }
}

impl SummaryGenerator for OllamaSummarizer {
    fn generate(&self, prompt: &str) -> Result<String, SummaryError> {
        let mut child = Command::new(&self.command)
            .arg("run")
            .arg(&self.model)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // Drain stdout on a separate thread so a chatty child cannot block on a full pipe.
        let reader = child.stdout.take().map(|mut stdout| {
            std::thread::spawn(move || {
                let mut text = String::new();
                stdout.read_to_string(&mut text).map(|_| text)
            })
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                if let Some(handle) = reader {
                    let _ = join_reader(handle, Instant::now() + READER_GRACE);
                }
                return Err(SummaryError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let output = match reader {
            Some(handle) => join_reader(handle, deadline.max(Instant::now() + READER_GRACE))?,
            None => Some(String::new()),
        };

        if !status.success() {
            return Err(SummaryError::GeneratorError(format!(
                "'{}' exited with {}",
                self.command, status
            )));
        }

        let text = output.ok_or_else(|| {
            SummaryError::GeneratorError(
                "generator output stayed open after it exited".to_string(),
            )
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SummaryError::GeneratorError(
                "generator returned no text".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Wait until `until` for the stdout reader to finish.
///
/// A reader still blocked at that point (stdout inherited by a process the
/// generator spawned) is detached and exits once that process closes the pipe.
fn join_reader(
    handle: JoinHandle<std::io::Result<String>>,
    until: Instant,
) -> Result<Option<String>, SummaryError> {
    loop {
        if handle.is_finished() {
            return match handle.join() {
                Ok(text) => Ok(Some(text?)),
                Err(_) => Err(SummaryError::GeneratorError(
                    "stdout reader panicked".to_string(),
                )),
            };
        }
        if Instant::now() >= until {
            debug!("generator stdout still open; detaching reader");
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Ask `generator` for a summary, substituting [`FALLBACK_SUMMARY`] on any failure
pub fn summarize_or_fallback<G: SummaryGenerator + ?Sized>(
    generator: &G,
    description: &ScenarioDescription,
) -> String {
    match generator.generate(&description.render()) {
        Ok(summary) => {
            debug!(ecosystem = %description.ecosystem, "generated scenario summary");
            summary
        }
        Err(e) => {
            warn!(ecosystem = %description.ecosystem, error = %e, "summary generation failed");
            FALLBACK_SUMMARY.to_string()
        }
    }
}
