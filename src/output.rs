//! Output file naming and the prompt metadata sidecar.

use crate::config::{GenerationConfig, Mode};
use crate::error::Result;
use crate::image::ImageFormat;
use crate::prompt::StructuredPrompt;
use crate::resolution::{Resolution, ResolutionRequest};
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name for a generated image, e.g. `generated_20250101_093000.png`.
pub fn output_file_name<Tz: TimeZone>(
    mode: Mode,
    format: ImageFormat,
    timestamp: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}_{}.{}",
        mode.file_prefix(),
        timestamp.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Path of the sidecar JSON for an image: same name, `.json` extension.
pub fn metadata_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("json")
}

/// Settings recorded in the sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSettings {
    /// Preset name, when the size came from a preset.
    pub aspect_ratio: Option<String>,
    /// Final width in pixels.
    pub width: u32,
    /// Final height in pixels.
    pub height: u32,
    /// Output format.
    pub output_format: ImageFormat,
    /// Seed, if one was set.
    pub seed: Option<u64>,
    /// Moderation tolerance.
    pub safety_tolerance: u8,
}

/// The sidecar written next to each image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMetadata {
    /// RFC 3339 local time of the run.
    pub timestamp: String,
    /// The structured prompt as configured.
    pub structured_prompt: StructuredPrompt,
    /// The text that was actually submitted.
    pub generated_prompt: String,
    /// Generation settings.
    pub settings: MetadataSettings,
}

impl PromptMetadata {
    /// Collects metadata for a run. Returns `None` for plain-text prompts.
    pub fn from_config(
        config: &GenerationConfig,
        resolution: Resolution,
        timestamp: DateTime<Local>,
    ) -> Result<Option<Self>> {
        let Some(structured) = config.prompt.structured() else {
            return Ok(None);
        };
        let aspect_ratio = match config.resolution.request()? {
            ResolutionRequest::Preset(name) => Some(name),
            ResolutionRequest::Explicit { .. } => None,
        };

        Ok(Some(Self {
            timestamp: timestamp.to_rfc3339(),
            structured_prompt: structured.clone(),
            generated_prompt: structured.render(),
            settings: MetadataSettings {
                aspect_ratio,
                width: resolution.width(),
                height: resolution.height(),
                output_format: config.output_format,
                seed: config.seed,
                safety_tolerance: config.safety_tolerance,
            },
        }))
    }

    /// Writes the sidecar for `image_path` and returns where it went.
    pub fn save(&self, image_path: &Path) -> Result<PathBuf> {
        let path = metadata_path(image_path);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::debug!(path = %path.display(), "saved prompt metadata");
        Ok(path)
    }
}
