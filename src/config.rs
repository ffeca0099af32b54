//! Generation settings.
//!
//! A [`GenerationConfig`] is a plain value: load it from JSON, adjust it, and
//! hand it to [`GenerationConfig::resolution`] and
//! [`GenerationConfig::to_request`]. Nothing here reads global state.

use crate::error::{FluxError, Result};
use crate::image::{GenerationRequest, ImageFormat, InputImage, DEFAULT_SAFETY_TOLERANCE};
use crate::prompt::Prompt;
use crate::resolution::{resolve, Resolution, ResolutionRequest, DEFAULT_PRESET};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Highest accepted safety tolerance.
pub const MAX_SAFETY_TOLERANCE: u8 = 5;

/// Whether to create a new image or edit an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Create a new image from the prompt.
    #[default]
    Generate,
    /// Modify `input_image` according to the prompt.
    Edit,
}

impl Mode {
    /// Prefix used for output file names.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Self::Generate => "generated",
            Self::Edit => "edited",
        }
    }
}

/// How the output size is chosen.
///
/// Explicit `width` and `height` take precedence over `aspect_ratio`: when
/// both are present the preset is ignored. Neither present means the
/// `aspect_ratio` preset, or `"1:1"` when that is unset too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionSettings {
    /// Preset name, e.g. `"16:9"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    /// Explicit width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Explicit height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ResolutionSettings {
    /// Settings selecting a preset.
    pub fn preset(name: impl Into<String>) -> Self {
        Self {
            aspect_ratio: Some(name.into()),
            ..Default::default()
        }
    }

    /// Settings with explicit dimensions.
    pub fn explicit(width: u32, height: u32) -> Self {
        Self {
            aspect_ratio: None,
            width: Some(width),
            height: Some(height),
        }
    }

    /// Turns the settings into a resolver request.
    pub fn request(&self) -> Result<ResolutionRequest> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => {
                if let Some(preset) = &self.aspect_ratio {
                    tracing::warn!(
                        preset = %preset,
                        width,
                        height,
                        "explicit width/height given, ignoring aspect ratio preset"
                    );
                }
                Ok(ResolutionRequest::explicit(width, height))
            }
            (Some(_), None) | (None, Some(_)) => Err(FluxError::Config(
                "width and height must be set together".into(),
            )),
            (None, None) => Ok(ResolutionRequest::preset(
                self.aspect_ratio.as_deref().unwrap_or(DEFAULT_PRESET),
            )),
        }
    }
}

fn default_safety_tolerance() -> u8 {
    DEFAULT_SAFETY_TOLERANCE
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Everything needed to run one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Generate or edit.
    #[serde(default)]
    pub mode: Mode,
    /// Image to edit; required in edit mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image: Option<PathBuf>,
    /// The prompt, structured or plain.
    #[serde(default)]
    pub prompt: Prompt,
    /// Output size.
    #[serde(default)]
    pub resolution: ResolutionSettings,
    /// Output format.
    #[serde(default)]
    pub output_format: ImageFormat,
    /// Seed for reproducible results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Moderation tolerance, 0 (strict) to 5 (permissive).
    #[serde(default = "default_safety_tolerance")]
    pub safety_tolerance: u8,
    /// Write the prompt metadata JSON next to the image.
    #[serde(default = "default_true")]
    pub save_prompt_json: bool,
    /// Where output files go.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            input_image: None,
            prompt: Prompt::default(),
            resolution: ResolutionSettings::default(),
            output_format: ImageFormat::default(),
            seed: None,
            safety_tolerance: DEFAULT_SAFETY_TOLERANCE,
            save_prompt_json: true,
            output_dir: default_output_dir(),
        }
    }
}

impl GenerationConfig {
    /// Parses a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a config from a JSON file.
    ///
    /// A relative `input_image` is resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;

        if let (Some(input), Some(dir)) = (&config.input_image, path.parent()) {
            if input.is_relative() {
                config.input_image = Some(dir.join(input));
            }
        }

        Ok(config)
    }

    /// Checks settings that do not depend on the filesystem or the resolver.
    pub fn validate(&self) -> Result<()> {
        if self.safety_tolerance > MAX_SAFETY_TOLERANCE {
            return Err(FluxError::Config(format!(
                "safety_tolerance {} is out of range (0-{MAX_SAFETY_TOLERANCE})",
                self.safety_tolerance
            )));
        }

        if self.mode == Mode::Edit && self.input_image.is_none() {
            return Err(FluxError::Config(
                "edit mode requires an input_image".into(),
            ));
        }

        if let Prompt::Simple(text) = &self.prompt {
            if text.trim().is_empty() {
                return Err(FluxError::Config("prompt is empty".into()));
            }
        }

        Ok(())
    }

    /// Resolves the configured output size.
    pub fn resolution(&self) -> Result<Resolution> {
        let request = self.resolution.request()?;
        Ok(resolve(&request)?)
    }

    /// Builds the generation request, reading the input image in edit mode.
    pub fn to_request(&self, resolution: Resolution) -> Result<GenerationRequest> {
        let mut request = GenerationRequest::new(self.prompt.render(), resolution)
            .with_format(self.output_format)
            .with_safety_tolerance(self.safety_tolerance);

        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }

        if self.mode == Mode::Edit {
            let path = self.input_image.as_ref().ok_or_else(|| {
                FluxError::Config("edit mode requires an input_image".into())
            })?;
            if !path.exists() {
                return Err(FluxError::Config(format!(
                    "input image not found: {}",
                    path.display()
                )));
            }
            request = request.with_input_image(InputImage::from_path(path)?);
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::ResolutionError;

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.mode, Mode::Generate);
        assert_eq!(config.safety_tolerance, 5);
        assert!(config.save_prompt_json);
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution().unwrap().to_string(), "1024x1024");
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = GenerationConfig::from_json("{}").unwrap();
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn test_explicit_dimensions_take_precedence() {
        let settings = ResolutionSettings {
            aspect_ratio: Some("16:9".into()),
            width: Some(512),
            height: Some(768),
        };
        assert_eq!(
            settings.request().unwrap(),
            ResolutionRequest::explicit(512, 768)
        );

        let settings = ResolutionSettings {
            aspect_ratio: Some("no-such-preset".into()),
            width: Some(512),
            height: Some(512),
        };
        assert!(settings.request().is_ok());
    }

    #[test]
    fn test_partial_dimensions_rejected() {
        let settings = ResolutionSettings {
            aspect_ratio: Some("4:3".into()),
            width: Some(512),
            height: None,
        };
        assert!(matches!(settings.request(), Err(FluxError::Config(_))));
    }

    #[test]
    fn test_preset_selection() {
        assert_eq!(
            ResolutionSettings::preset("21:9").request().unwrap(),
            ResolutionRequest::preset("21:9")
        );
        assert_eq!(
            ResolutionSettings::default().request().unwrap(),
            ResolutionRequest::preset(DEFAULT_PRESET)
        );
    }

    #[test]
    fn test_resolution_errors_propagate() {
        let config = GenerationConfig {
            resolution: ResolutionSettings::explicit(100, 100),
            ..Default::default()
        };
        assert!(matches!(
            config.resolution(),
            Err(FluxError::Resolution(ResolutionError::NotMultipleOf16 { .. }))
        ));

        let config = GenerationConfig {
            resolution: ResolutionSettings::preset("5:4"),
            ..Default::default()
        };
        assert!(matches!(
            config.resolution(),
            Err(FluxError::Resolution(ResolutionError::UnknownPreset { .. }))
        ));
    }

    #[test]
    fn test_validate() {
        let config = GenerationConfig {
            safety_tolerance: 6,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GenerationConfig {
            mode: Mode::Edit,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GenerationConfig {
            prompt: Prompt::Simple("   ".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(GenerationConfig::from_json(r#"{"aspect_ratio": "1:1"}"#).is_err());
    }

    #[test]
    fn test_demo_config() {
        let config = GenerationConfig::from_json(include_str!("../demos/coffee_shop.json")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution().unwrap().to_string(), "1536x1152");
        assert_eq!(config.output_format, ImageFormat::Png);
        let structured = config.prompt.structured().unwrap();
        assert_eq!(structured.subjects.len(), 2);
    }

    #[test]
    fn test_to_request() {
        let config = GenerationConfig {
            prompt: Prompt::Simple("A red fox".into()),
            output_format: ImageFormat::Jpeg,
            seed: Some(7),
            safety_tolerance: 2,
            ..Default::default()
        };
        let request = config.to_request(config.resolution().unwrap()).unwrap();
        assert_eq!(request.prompt, "A red fox");
        assert_eq!(request.format, ImageFormat::Jpeg);
        assert_eq!(request.seed, Some(7));
        assert_eq!(request.safety_tolerance, 2);
        assert!(!request.is_edit());
    }

    #[test]
    fn test_edit_mode_reads_input_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("input.png"), [0x89, 0x50, 0x4E, 0x47]).unwrap();
        let config_path = dir.path().join("flux.json");
        std::fs::write(
            &config_path,
            r#"{"mode": "edit", "input_image": "input.png", "prompt": "Make it snow"}"#,
        )
        .unwrap();

        let config = GenerationConfig::from_file(&config_path).unwrap();
        assert_eq!(config.input_image, Some(dir.path().join("input.png")));

        let request = config.to_request(config.resolution().unwrap()).unwrap();
        let image = request.input_image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn test_edit_mode_missing_file() {
        let config = GenerationConfig {
            mode: Mode::Edit,
            input_image: Some(PathBuf::from("/nonexistent/input.png")),
            ..Default::default()
        };
        assert!(matches!(
            config.to_request(config.resolution().unwrap()),
            Err(FluxError::Config(_))
        ));
    }
}
