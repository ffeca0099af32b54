#![warn(missing_docs)]
//! flux-structured - structured-prompt image generation with FLUX.2 [PRO].
//!
//! Describe an image as a [`StructuredPrompt`] (scene, subjects, palette,
//! lighting, camera, text), choose a size, and let [`FluxClient`] submit it to
//! the Black Forest Labs API.
//!
//! Sizes are checked locally before anything is sent: the only way to get a
//! [`Resolution`] is through [`resolve`], which enforces the API limits
//! (64px minimum side, 4MP maximum, sides multiple of 16).
//!
//! # Quick Start
//!
//! ```no_run
//! use flux_structured::{
//!     resolve, FluxClient, GenerationRequest, ResolutionRequest, StructuredPrompt, Subject,
//! };
//!
//! #[tokio::main]
//! async fn main() -> flux_structured::Result<()> {
//!     let prompt = StructuredPrompt::new()
//!         .with_scene("A lighthouse on a cliff at dusk")
//!         .with_subject(Subject::new("A lone keeper").with_position("doorway, lower left"))
//!         .with_style("Oil painting");
//!
//!     let resolution = resolve(&ResolutionRequest::preset("16:9"))?;
//!     let request = GenerationRequest::new(prompt.render(), resolution);
//!
//!     let client = FluxClient::builder().build()?;
//!     let image = client.generate(&request).await?;
//!     image.save("lighthouse.png")?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `flux-structured` command-line tool

pub mod config;
mod error;
pub mod image;
pub mod output;
pub mod prompt;
pub mod resolution;

// Re-export error types at crate root
pub use error::{FluxError, Result};

pub use config::{GenerationConfig, Mode, ResolutionSettings};
pub use image::{
    FluxClient, FluxClientBuilder, GeneratedImage, GenerationMetadata, GenerationRequest,
    ImageFormat, InputImage,
};
pub use output::PromptMetadata;
pub use prompt::{Camera, Prompt, PromptWarning, StructuredPrompt, Subject, TextElement};
pub use resolution::{resolve, Resolution, ResolutionError, ResolutionRequest};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::GenerationConfig;
    pub use crate::error::{FluxError, Result};
    pub use crate::image::{FluxClient, GeneratedImage, GenerationRequest};
    pub use crate::prompt::{Prompt, StructuredPrompt};
    pub use crate::resolution::{resolve, Resolution, ResolutionRequest};
}
