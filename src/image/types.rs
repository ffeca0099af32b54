//! Core types for image generation.

use crate::error::Result;
use crate::resolution::Resolution;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Output formats the API can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
}

impl ImageFormat {
    /// Returns the value the API expects in `output_format`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        None
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the MIME type to declare for an input image, based on its extension.
///
/// Unknown extensions are sent as JPEG.
pub fn input_mime_type(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return ImageFormat::Jpeg.mime_type();
    };
    if let Some(format) = ImageFormat::from_extension(ext) {
        return format.mime_type();
    }

    match ext.to_lowercase().as_str() {
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => ImageFormat::Jpeg.mime_type(),
    }
}

/// An image to edit, sent along with the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// MIME type declared in the data URL.
    pub mime_type: String,
}

impl InputImage {
    /// Reads an input image from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(Self {
            data,
            mime_type: input_mime_type(path).to_string(),
        })
    }

    /// Encodes the image as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        use base64::Engine;
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

/// Default safety tolerance (least strict).
pub const DEFAULT_SAFETY_TOLERANCE: u8 = 5;

/// A request to generate an image.
///
/// Holds an already validated [`Resolution`], so a request can never carry
/// dimensions the API would reject.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Output size.
    pub resolution: Resolution,
    /// Desired output format.
    pub format: ImageFormat,
    /// Seed for deterministic generation.
    pub seed: Option<u64>,
    /// Moderation tolerance, 0 (strict) to 5 (permissive).
    pub safety_tolerance: u8,
    /// Input image for editing.
    pub input_image: Option<InputImage>,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and resolution.
    pub fn new(prompt: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            prompt: prompt.into(),
            resolution,
            format: ImageFormat::default(),
            seed: None,
            safety_tolerance: DEFAULT_SAFETY_TOLERANCE,
            input_image: None,
        }
    }

    /// Sets the seed for deterministic generation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the desired output format.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the safety tolerance.
    pub fn with_safety_tolerance(mut self, tolerance: u8) -> Self {
        self.safety_tolerance = tolerance;
        self
    }

    /// Sets an input image for editing.
    pub fn with_input_image(mut self, image: InputImage) -> Self {
        self.input_image = Some(image);
        self
    }

    /// Returns true if this is an image editing request (has input image).
    pub fn is_edit(&self) -> bool {
        self.input_image.is_some()
    }
}

/// Metadata about the generation process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Model endpoint used for generation.
    pub model: Option<String>,
    /// Task id assigned by the API.
    pub task_id: Option<String>,
    /// Seed reported by the API.
    pub seed: Option<u64>,
    /// Credits charged, as reported on submission.
    pub cost: Option<f64>,
    /// Output size in megapixels, as reported on submission.
    pub output_mp: Option<f64>,
    /// Generation duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// A generated image with its data and metadata.
#[derive(Debug, Clone)]
#[must_use = "generated image should be saved or processed"]
pub struct GeneratedImage {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Image format.
    pub format: ImageFormat,
    /// Generation metadata.
    pub metadata: GenerationMetadata,
}

impl GeneratedImage {
    /// Creates a new generated image.
    pub fn new(data: Vec<u8>, format: ImageFormat, metadata: GenerationMetadata) -> Self {
        Self {
            data,
            format,
            metadata,
        }
    }

    /// Returns the size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.data)?;
        Ok(())
    }
}
