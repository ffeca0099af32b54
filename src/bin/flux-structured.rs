//! CLI for flux-structured - FLUX.2 [PRO] structured-prompt image generation.

use anyhow::Context;
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use flux_structured::config::{GenerationConfig, Mode, ResolutionSettings};
use flux_structured::image::{FluxClient, ImageFormat};
use flux_structured::output::{output_file_name, PromptMetadata};
use flux_structured::prompt::{self, Prompt};
use flux_structured::resolution::{self, Resolution};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flux-structured")]
#[command(about = "Generate images with FLUX.2 [PRO] from structured JSON prompts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image (or edit one with --input)
    Generate(ConfigArgs),

    /// Resolve the size and render the prompt without calling the API
    Render(ConfigArgs),

    /// List aspect ratio presets
    Presets,

    /// List example prompt templates, or print one as JSON
    Templates {
        /// Template to print
        name: Option<String>,
    },

    /// Check that the API key is accepted
    Check,
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON config file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a bundled example template as the prompt
    #[arg(short, long, conflicts_with = "prompt")]
    template: Option<String>,

    /// Plain text prompt instead of a structured one
    #[arg(short, long)]
    prompt: Option<String>,

    /// Aspect ratio preset (see `presets`)
    #[arg(short, long)]
    aspect_ratio: Option<String>,

    /// Image width in pixels (overrides --aspect-ratio)
    #[arg(long, requires = "height")]
    width: Option<u32>,

    /// Image height in pixels (overrides --aspect-ratio)
    #[arg(long, requires = "width")]
    height: Option<u32>,

    /// Seed for reproducible results
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Safety tolerance, 0 (strict) to 5 (permissive)
    #[arg(long)]
    safety_tolerance: Option<u8>,

    /// Image to edit
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the image and its metadata
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not write the prompt metadata JSON
    #[arg(long)]
    no_metadata: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg => ImageFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Generate(args) => {
            generate(args, cli.json).await?;
        }
        Commands::Render(args) => {
            render(args, cli.json)?;
        }
        Commands::Presets => {
            list_presets(cli.json)?;
        }
        Commands::Templates { name } => {
            show_templates(name.as_deref(), cli.json)?;
        }
        Commands::Check => {
            check(cli.json).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides.
fn build_config(args: ConfigArgs) -> anyhow::Result<GenerationConfig> {
    let mut config = match &args.config {
        Some(path) => GenerationConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GenerationConfig::default(),
    };

    if let Some(name) = args.template {
        let template = prompt::template(&name).with_context(|| {
            format!(
                "unknown template '{name}' (available: {})",
                prompt::TEMPLATE_NAMES.join(", ")
            )
        })?;
        config.prompt = Prompt::Structured(template);
    }
    if let Some(text) = args.prompt {
        config.prompt = Prompt::Simple(text);
    }

    if let Some(preset) = args.aspect_ratio {
        config.resolution = ResolutionSettings::preset(preset);
    }
    if let (Some(width), Some(height)) = (args.width, args.height) {
        config.resolution.width = Some(width);
        config.resolution.height = Some(height);
    }

    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(format) = args.format {
        config.output_format = format.into();
    }
    if let Some(tolerance) = args.safety_tolerance {
        config.safety_tolerance = tolerance;
    }
    if let Some(input) = args.input {
        config.mode = Mode::Edit;
        config.input_image = Some(input);
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if args.no_metadata {
        config.save_prompt_json = false;
    }

    Ok(config)
}

/// Validates the config and resolves the size. Nothing touches the network.
fn prepare(args: ConfigArgs) -> anyhow::Result<(GenerationConfig, Resolution)> {
    let config = build_config(args)?;
    config.validate()?;
    let resolution = config.resolution()?;

    for warning in config.prompt.warnings() {
        tracing::warn!("{warning}");
    }

    Ok((config, resolution))
}

async fn generate(args: ConfigArgs, json_output: bool) -> anyhow::Result<()> {
    let (config, resolution) = prepare(args)?;
    let request = config.to_request(resolution)?;

    let client = FluxClient::builder().build()?;
    tracing::info!(
        mode = ?config.mode,
        resolution = %resolution,
        megapixels = resolution.megapixels(),
        format = %config.output_format,
        "starting generation"
    );

    let image = client.generate(&request).await?;

    let now = Local::now();
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;
    let output = config
        .output_dir
        .join(output_file_name(config.mode, image.format, &now));
    image.save(&output)?;

    let metadata_path = if config.save_prompt_json {
        PromptMetadata::from_config(&config, resolution, now)?
            .map(|metadata| metadata.save(&output))
            .transpose()?
    } else {
        None
    };

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "output": output.display().to_string(),
            "metadata": metadata_path.as_ref().map(|p| p.display().to_string()),
            "size_bytes": image.size(),
            "format": image.format.as_str(),
            "width": resolution.width(),
            "height": resolution.height(),
            "model": image.metadata.model,
            "task_id": image.metadata.task_id,
            "seed": image.metadata.seed,
            "cost": image.metadata.cost,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes, {})",
            output.display(),
            image.size(),
            resolution
        );
        if let Some(path) = metadata_path {
            println!("Prompt metadata: {}", path.display());
        }
        if let Some(cost) = image.metadata.cost {
            println!("Cost: {} credits", cost);
        }
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

fn render(args: ConfigArgs, json_output: bool) -> anyhow::Result<()> {
    let (config, resolution) = prepare(args)?;
    let text = config.prompt.render();
    let warnings: Vec<String> = config
        .prompt
        .warnings()
        .iter()
        .map(ToString::to_string)
        .collect();

    if json_output {
        let result = serde_json::json!({
            "width": resolution.width(),
            "height": resolution.height(),
            "megapixels": resolution.megapixels(),
            "prompt": text,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Resolution: {} ({:.2}MP)\n",
            resolution,
            resolution.megapixels()
        );
        println!("{text}");
    }

    Ok(())
}

fn list_presets(json_output: bool) -> anyhow::Result<()> {
    let presets = resolution::presets();

    if json_output {
        println!("{}", serde_json::to_string_pretty(presets)?);
    } else {
        println!("Aspect ratio presets:\n");
        for p in presets {
            let megapixels = f64::from(p.width) * f64::from(p.height) / 1_000_000.0;
            println!(
                "  {:<8} {:>4}x{:<4}  {:.1}MP  {}",
                p.name, p.width, p.height, megapixels, p.label
            );
        }
    }

    Ok(())
}

fn show_templates(name: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    if let Some(name) = name {
        let template = prompt::template(name).with_context(|| {
            format!(
                "unknown template '{name}' (available: {})",
                prompt::TEMPLATE_NAMES.join(", ")
            )
        })?;
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(prompt::TEMPLATE_NAMES)?);
    } else {
        println!("Example templates:\n");
        for name in prompt::TEMPLATE_NAMES {
            let Some(template) = prompt::template(name) else {
                continue;
            };
            println!("  {name}");
            if let Some(scene) = &template.scene {
                println!("    Scene: {scene}");
            }
            if let Some(style) = &template.style {
                println!("    Style: {style}");
            }
        }
        println!("\nUse one with `generate --template <name>`.");
    }

    Ok(())
}

async fn check(json_output: bool) -> anyhow::Result<()> {
    let client = FluxClient::builder().build()?;
    client.health_check().await?;

    if json_output {
        println!("{}", serde_json::json!({ "success": true }));
    } else {
        println!("API key accepted.");
    }

    Ok(())
}
