use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::Phase;

pub const ENV_PREFIX: &str = "UPLOAD_SIM__";

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A phase table in the settings file must carry both fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhaseSettings {
    pub tick_interval_ms: u64,
    /// Upper bound (exclusive) of the random step added per tick.
    pub max_step: f64,
}

impl PhaseSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    fn uploading() -> Self {
        Self {
            tick_interval_ms: 300,
            max_step: 20.0,
        }
    }

    fn processing() -> Self {
        Self {
            tick_interval_ms: 500,
            max_step: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IntakeSettings {
    pub max_file_size_bytes: u64,
    pub accepted_mime_types: Vec<String>,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            accepted_mime_types: vec![MIME_PDF.into(), MIME_TEXT.into(), MIME_DOCX.into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub uploading: PhaseSettings,
    pub processing: PhaseSettings,
    pub intake: IntakeSettings,
    pub event_capacity: usize,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            uploading: PhaseSettings::uploading(),
            processing: PhaseSettings::processing(),
            intake: IntakeSettings::default(),
            event_capacity: 1024,
        }
    }
}

impl SimulationSettings {
    pub fn phase(&self, phase: Phase) -> &PhaseSettings {
        match phase {
            Phase::Uploading => &self.uploading,
            Phase::Processing => &self.processing,
        }
    }
}

/// Defaults, then the TOML file at `path` when given, then `UPLOAD_SIM__*`
/// environment variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<SimulationSettings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
            parse_settings(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?
        }
        None => SimulationSettings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn parse_settings(raw: &str) -> anyhow::Result<SimulationSettings> {
    Ok(toml::from_str::<SimulationSettings>(raw)?)
}

pub fn apply_env_overrides(
    settings: &mut SimulationSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = var("UPLOADING_TICK_MS") {
        settings.uploading.tick_interval_ms = parse_var("UPLOADING_TICK_MS", &v)?;
    }
    if let Some(v) = var("UPLOADING_MAX_STEP") {
        settings.uploading.max_step = parse_var("UPLOADING_MAX_STEP", &v)?;
    }
    if let Some(v) = var("PROCESSING_TICK_MS") {
        settings.processing.tick_interval_ms = parse_var("PROCESSING_TICK_MS", &v)?;
    }
    if let Some(v) = var("PROCESSING_MAX_STEP") {
        settings.processing.max_step = parse_var("PROCESSING_MAX_STEP", &v)?;
    }
    if let Some(v) = var("MAX_FILE_SIZE_BYTES") {
        settings.intake.max_file_size_bytes = parse_var("MAX_FILE_SIZE_BYTES", &v)?;
    }
    if let Some(v) = var("EVENT_CAPACITY") {
        settings.event_capacity = parse_var("EVENT_CAPACITY", &v)?;
    }

    Ok(())
}

fn parse_var<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value '{raw}' for {ENV_PREFIX}{name}"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
