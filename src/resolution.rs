//! Resolution presets and dimension validation.
//!
//! The FLUX.2 API accepts any width/height that satisfies three rules:
//!
//! - each side is at least [`MIN_DIMENSION`] pixels,
//! - the total pixel count is at most [`MAX_PIXELS`],
//! - each side is a multiple of [`ALIGNMENT`].
//!
//! [`resolve`] is the only way to obtain a [`Resolution`], so a value of that
//! type always satisfies all three.

use serde::Serialize;

/// Smallest allowed width or height, in pixels.
pub const MIN_DIMENSION: u32 = 64;

/// Largest allowed `width * height` (4 megapixels).
pub const MAX_PIXELS: u64 = 4_000_000;

/// Both sides must be a multiple of this.
pub const ALIGNMENT: u32 = 16;

/// Preset used when configuration names neither a preset nor explicit dimensions.
pub const DEFAULT_PRESET: &str = "1:1";

/// A named aspect-ratio preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    /// Preset name (e.g. `"16:9"`).
    pub name: &'static str,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Human-readable label.
    pub label: &'static str,
}

#[rustfmt::skip]
const PRESETS: &[Preset] = &[
    Preset { name: "1:1", width: 1024, height: 1024, label: "Square" },
    Preset { name: "1:1_hd", width: 1536, height: 1536, label: "Square HD" },
    Preset { name: "1:1_max", width: 2000, height: 2000, label: "Square Max" },
    Preset { name: "16:9", width: 1920, height: 1088, label: "Landscape HD" },
    Preset { name: "16:9_4k", width: 2560, height: 1440, label: "Landscape 4K" },
    Preset { name: "9:16", width: 1088, height: 1920, label: "Portrait HD" },
    Preset { name: "9:16_4k", width: 1440, height: 2560, label: "Portrait 4K" },
    Preset { name: "4:3", width: 1536, height: 1152, label: "Classic Landscape" },
    Preset { name: "3:4", width: 1152, height: 1536, label: "Classic Portrait" },
    Preset { name: "3:2", width: 1536, height: 1024, label: "Photo Landscape" },
    Preset { name: "2:3", width: 1024, height: 1536, label: "Photo Portrait" },
    Preset { name: "21:9", width: 2016, height: 864, label: "Ultrawide" },
    Preset { name: "9:21", width: 864, height: 2016, label: "Ultra Tall" },
];

/// Returns all known presets, in display order.
pub fn presets() -> &'static [Preset] {
    PRESETS
}

/// Looks up a preset by name.
pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

fn preset_names() -> String {
    PRESETS
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Which side of the image a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// The horizontal side.
    Width,
    /// The vertical side.
    Height,
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Width => write!(f, "width"),
            Self::Height => write!(f, "height"),
        }
    }
}

/// Why a resolution request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The preset name is not in the preset table.
    #[error("unknown aspect ratio preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },

    /// A side is smaller than [`MIN_DIMENSION`].
    #[error("{dimension} {value} is below the minimum of {min} pixels", min = MIN_DIMENSION)]
    BelowMinimum { dimension: Dimension, value: u32 },

    /// `width * height` is larger than [`MAX_PIXELS`].
    #[error(
        "{width}x{height} is {pixels} pixels, which exceeds the maximum of {max} (4MP)",
        max = MAX_PIXELS
    )]
    ExceedsMaxPixels { width: u32, height: u32, pixels: u64 },

    /// A side is not a multiple of [`ALIGNMENT`].
    #[error(
        "{dimension} {value} is not a multiple of {align} (nearest: {nearest})",
        align = ALIGNMENT
    )]
    NotMultipleOf16 {
        dimension: Dimension,
        value: u32,
        nearest: u32,
    },
}

/// What the caller asked for: a preset or explicit dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionRequest {
    /// A named preset from [`presets`].
    Preset(String),
    /// Explicit dimensions in pixels.
    Explicit { width: u32, height: u32 },
}

impl ResolutionRequest {
    /// Creates a preset request.
    pub fn preset(name: impl Into<String>) -> Self {
        Self::Preset(name.into())
    }

    /// Creates an explicit-dimensions request.
    pub fn explicit(width: u32, height: u32) -> Self {
        Self::Explicit { width, height }
    }
}

/// A width/height pair that the API will accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Total size in megapixels (millions of pixels).
    pub fn megapixels(&self) -> f64 {
        self.pixel_count() as f64 / 1_000_000.0
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resolves a request into a validated [`Resolution`].
///
/// Presets are returned as defined. Explicit dimensions are checked against
/// the minimum, then the pixel budget, then alignment, and the first failure
/// is reported. Nothing is rounded: a misaligned side is an error.
pub fn resolve(request: &ResolutionRequest) -> Result<Resolution, ResolutionError> {
    match request {
        ResolutionRequest::Preset(name) => preset(name)
            .map(|p| Resolution {
                width: p.width,
                height: p.height,
            })
            .ok_or_else(|| ResolutionError::UnknownPreset {
                name: name.clone(),
                available: preset_names(),
            }),
        ResolutionRequest::Explicit { width, height } => validate(*width, *height),
    }
}

fn validate(width: u32, height: u32) -> Result<Resolution, ResolutionError> {
    for (dimension, value) in [(Dimension::Width, width), (Dimension::Height, height)] {
        if value < MIN_DIMENSION {
            return Err(ResolutionError::BelowMinimum { dimension, value });
        }
    }

    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PIXELS {
        return Err(ResolutionError::ExceedsMaxPixels {
            width,
            height,
            pixels,
        });
    }

    for (dimension, value) in [(Dimension::Width, width), (Dimension::Height, height)] {
        if value % ALIGNMENT != 0 {
            return Err(ResolutionError::NotMultipleOf16 {
                dimension,
                value,
                nearest: nearest_aligned(value),
            });
        }
    }

    Ok(Resolution { width, height })
}

/// Nearest multiple of [`ALIGNMENT`], halves rounding up.
fn nearest_aligned(value: u32) -> u32 {
    let half = ALIGNMENT / 2;
    (value.saturating_add(half) / ALIGNMENT) * ALIGNMENT
}
