//! Image generation module.

pub mod flux;
mod types;

pub use flux::{FluxClient, FluxClientBuilder};
pub use types::{
    input_mime_type, GeneratedImage, GenerationMetadata, GenerationRequest, ImageFormat,
    InputImage, DEFAULT_SAFETY_TOLERANCE,
};
