//! Structured prompts and their rendering into FLUX text prompts.
//!
//! A [`StructuredPrompt`] describes the scene piece by piece (subjects, style,
//! palette, lighting, camera, text). [`StructuredPrompt::render`] flattens it
//! into the sectioned text prompt that gets submitted.

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Text elements longer than this (in characters) trigger a warning.
pub const MAX_TEXT_ELEMENT_CHARS: usize = 50;

/// A subject in the scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subject {
    /// What the subject looks like.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where it sits in the frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// What it is doing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Subject {
    /// Creates a subject with a description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Sets where the subject is placed in the frame.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Sets what the subject is doing.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(description) = &self.description {
            parts.push(description.clone());
        }
        if let Some(position) = &self.position {
            parts.push(format!("positioned {position}"));
        }
        if let Some(action) = &self.action {
            parts.push(action.clone());
        }
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Camera settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Camera {
    /// Camera angle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<String>,
    /// Lens type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    /// Focus behaviour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_of_field: Option<String>,
}

impl Camera {
    /// Creates empty camera settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the camera angle.
    pub fn with_angle(mut self, angle: impl Into<String>) -> Self {
        self.angle = Some(angle.into());
        self
    }

    /// Sets the lens.
    pub fn with_lens(mut self, lens: impl Into<String>) -> Self {
        self.lens = Some(lens.into());
        self
    }

    /// Sets the depth of field.
    pub fn with_depth_of_field(mut self, dof: impl Into<String>) -> Self {
        self.depth_of_field = Some(dof.into());
        self
    }

    fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(angle) = &self.angle {
            parts.push(format!("Camera angle: {angle}"));
        }
        if let Some(lens) = &self.lens {
            parts.push(format!("Lens: {lens}"));
        }
        if let Some(dof) = &self.depth_of_field {
            parts.push(format!("Depth of field: {dof}"));
        }
        (!parts.is_empty()).then(|| parts.join(" | "))
    }
}

/// Text that should appear in the image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextElement {
    /// Exact text to display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Font style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Where the text appears.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Hex colour (`#RRGGBB`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TextElement {
    /// Creates a text element with the given content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Sets the font style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets where the text appears.
    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    /// Sets the text colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(content) = &self.content {
            parts.push(format!("Text reading \"{content}\""));
        }
        if let Some(style) = &self.style {
            parts.push(format!("in {style}"));
        }
        if let Some(position) = &self.position {
            parts.push(format!("located {position}"));
        }
        if let Some(color) = &self.color {
            parts.push(format!("in {} color", describe_hex_color(color)));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// A structured description of the desired image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredPrompt {
    /// Overall scene description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    /// Subjects in the scene.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Subject>,
    /// Artistic style.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Hex colours (`#RRGGBB`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color_palette: Vec<String>,
    /// Lighting description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,
    /// Emotional tone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// Background details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Framing and layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,
    /// Camera settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<Camera>,
    /// Text to render in the image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_elements: Vec<TextElement>,
}

impl StructuredPrompt {
    /// Creates an empty structured prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scene description.
    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }

    /// Adds a subject.
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.push(subject);
        self
    }

    /// Sets the artistic style.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Sets the colour palette.
    pub fn with_color_palette<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.color_palette = colors.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the lighting description.
    pub fn with_lighting(mut self, lighting: impl Into<String>) -> Self {
        self.lighting = Some(lighting.into());
        self
    }

    /// Sets the mood.
    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    /// Sets the background description.
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    /// Sets the composition.
    pub fn with_composition(mut self, composition: impl Into<String>) -> Self {
        self.composition = Some(composition.into());
        self
    }

    /// Sets the camera.
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Adds a text element.
    pub fn with_text_element(mut self, text: TextElement) -> Self {
        self.text_elements.push(text);
        self
    }

    /// Renders the prompt as sectioned text, one blank line between sections.
    ///
    /// Missing or empty fields are left out entirely.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if let Some(scene) = non_empty(&self.scene) {
            sections.push(format!("Scene: {scene}"));
        }

        let subjects: Vec<String> = self
            .subjects
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.render().map(|text| format!("Subject {}: {text}", i + 1)))
            .collect();
        if !subjects.is_empty() {
            sections.push(subjects.join("\n"));
        }

        if let Some(style) = non_empty(&self.style) {
            sections.push(format!("Style: {style}"));
        }

        if !self.color_palette.is_empty() {
            let colors: Vec<String> = self
                .color_palette
                .iter()
                .map(|c| format!("{c} ({})", describe_hex_color(c)))
                .collect();
            sections.push(format!("Color palette: {}", colors.join(", ")));
        }

        if let Some(lighting) = non_empty(&self.lighting) {
            sections.push(format!("Lighting: {lighting}"));
        }
        if let Some(mood) = non_empty(&self.mood) {
            sections.push(format!("Mood and atmosphere: {mood}"));
        }
        if let Some(background) = non_empty(&self.background) {
            sections.push(format!("Background: {background}"));
        }
        if let Some(composition) = non_empty(&self.composition) {
            sections.push(format!("Composition: {composition}"));
        }

        if let Some(camera) = self.camera.as_ref().and_then(Camera::render) {
            sections.push(camera);
        }

        let texts: Vec<String> = self
            .text_elements
            .iter()
            .filter_map(TextElement::render)
            .collect();
        if !texts.is_empty() {
            sections.push(format!("Text elements: {}", texts.join("; ")));
        }

        sections.join("\n\n")
    }

    /// Returns advisory warnings about the prompt. None of them block generation.
    pub fn warnings(&self) -> Vec<PromptWarning> {
        let mut warnings = Vec::new();

        if non_empty(&self.scene).is_none() {
            warnings.push(PromptWarning::MissingScene);
        }
        if self.subjects.is_empty() {
            warnings.push(PromptWarning::MissingSubjects);
        }

        for color in &self.color_palette {
            if !is_hex_color(color) {
                warnings.push(PromptWarning::InvalidHexColor(color.clone()));
            }
        }

        for content in self.text_elements.iter().filter_map(|t| t.content.as_ref()) {
            if content.chars().count() > MAX_TEXT_ELEMENT_CHARS {
                warnings.push(PromptWarning::LongText {
                    preview: content.chars().take(20).collect(),
                });
            }
        }

        warnings
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// A non-fatal problem with a structured prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptWarning {
    /// No scene description.
    MissingScene,
    /// No subjects.
    MissingSubjects,
    /// A palette entry is not `#RRGGBB`.
    InvalidHexColor(String),
    /// A text element is long enough that the model may garble it.
    LongText {
        /// First 20 characters of the text.
        preview: String,
    },
}

impl std::fmt::Display for PromptWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScene => write!(
                f,
                "no 'scene' description provided, consider adding one for better results"
            ),
            Self::MissingSubjects => write!(
                f,
                "no 'subjects' defined, the image may lack a clear focal point"
            ),
            Self::InvalidHexColor(color) => {
                write!(f, "invalid hex color format: {color} (should be #RRGGBB)")
            }
            Self::LongText { preview } => write!(
                f,
                "text element '{preview}...' is long, the model may struggle with lengthy text"
            ),
        }
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Gives a rough colour name for a `#RRGGBB` hex string.
///
/// Input that does not parse is returned as-is, minus any leading `#`.
pub fn describe_hex_color(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    let channel = |start: usize| {
        hex.get(start..start + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };

    let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4)) else {
        return hex.to_string();
    };

    let name = if r > 200 && g > 200 && b > 200 {
        "white/cream"
    } else if r < 50 && g < 50 && b < 50 {
        "black/dark"
    } else if r > g && r > b {
        if r > 200 {
            "bright red/coral"
        } else {
            "red/burgundy"
        }
    } else if g > r && g > b {
        if g > 200 {
            "bright green/lime"
        } else {
            "green/forest"
        }
    } else if b > r && b > g {
        if b > 200 {
            "bright blue/sky"
        } else {
            "blue/navy"
        }
    } else if r > 180 && g > 150 && b < 100 {
        "golden/amber"
    } else if r > 150 && g > 100 && b < 80 {
        "brown/tan"
    } else if r > 200 && g > 150 && b > 150 {
        "pink/rose"
    } else if r > 100 && g > 100 && b > 100 {
        "gray"
    } else {
        return format!("({hex})");
    };

    name.to_string()
}

/// Either a structured prompt or plain text.
///
/// In JSON this is a bare string or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Prompt {
    /// Plain text, submitted unchanged.
    Simple(String),
    /// Structured prompt, rendered before submission.
    Structured(StructuredPrompt),
}

impl Prompt {
    /// Returns the text that will be submitted.
    pub fn render(&self) -> String {
        match self {
            Self::Simple(text) => text.clone(),
            Self::Structured(structured) => structured.render(),
        }
    }

    /// Returns advisory warnings. Plain prompts have none.
    pub fn warnings(&self) -> Vec<PromptWarning> {
        match self {
            Self::Simple(_) => Vec::new(),
            Self::Structured(structured) => structured.warnings(),
        }
    }

    /// Returns the structured prompt, if this is one.
    pub fn structured(&self) -> Option<&StructuredPrompt> {
        match self {
            Self::Simple(_) => None,
            Self::Structured(structured) => Some(structured),
        }
    }
}

// Objects go straight to `StructuredPrompt` so unknown-field errors keep
// the field name instead of collapsing into "did not match any variant".
impl<'de> Deserialize<'de> for Prompt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PromptVisitor;

        impl<'de> Visitor<'de> for PromptVisitor {
            type Value = Prompt;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a prompt string or a structured prompt object")
            }

            fn visit_str<E: de::Error>(self, text: &str) -> Result<Prompt, E> {
                Ok(Prompt::Simple(text.to_string()))
            }

            fn visit_string<E: de::Error>(self, text: String) -> Result<Prompt, E> {
                Ok(Prompt::Simple(text))
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Prompt, A::Error> {
                StructuredPrompt::deserialize(de::value::MapAccessDeserializer::new(map))
                    .map(Prompt::Structured)
            }
        }

        deserializer.deserialize_any(PromptVisitor)
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::Structured(coffee_shop())
    }
}

impl From<StructuredPrompt> for Prompt {
    fn from(structured: StructuredPrompt) -> Self {
        Self::Structured(structured)
    }
}

/// Names of the bundled example templates.
pub const TEMPLATE_NAMES: &[&str] = &[
    "coffee_shop",
    "product_photography",
    "fantasy_landscape",
    "portrait",
    "text_poster",
];

/// Returns a bundled example template by name.
pub fn template(name: &str) -> Option<StructuredPrompt> {
    match name {
        "coffee_shop" => Some(coffee_shop()),
        "product_photography" => Some(product_photography()),
        "fantasy_landscape" => Some(fantasy_landscape()),
        "portrait" => Some(portrait()),
        "text_poster" => Some(text_poster()),
        _ => None,
    }
}

fn coffee_shop() -> StructuredPrompt {
    StructuredPrompt::new()
        .with_scene("A cozy coffee shop interior on a rainy afternoon")
        .with_subject(
            Subject::new(
                "A young woman with curly auburn hair wearing a modern navy blue business suit",
            )
            .with_position("seated at a window table, center-left of frame")
            .with_action(
                "reading a vintage hardcover book with title 'COFFEE & CIGARS' while holding a steamy ceramic latte cup",
            ),
        )
        .with_subject(
            Subject::new("A black cat")
                .with_position("curled up on the chair beside her")
                .with_action("sleeping peacefully"),
        )
        .with_style("Cinematic photography with film grain, reminiscent of Kodak Portra 400")
        .with_color_palette(["#000080", "#8B4513", "#F5F5DC", "#2F4F4F", "#FFE4B5", "#DEB887"])
        .with_lighting(
            "Soft diffused natural light from rain-streaked windows, warm tungsten accent lights from vintage Edison bulbs overhead, creating a golden glow",
        )
        .with_mood("Peaceful, nostalgic, hygge atmosphere, intimate and contemplative")
        .with_background(
            "Exposed brick walls with vintage posters, wooden bookshelves filled with old books, other patrons softly blurred, rain visible through large windows",
        )
        .with_composition(
            "Rule of thirds, subject placed on left third line, depth created through foreground coffee cup on adjacent table, leading lines from wooden floor planks",
        )
        .with_camera(
            Camera::new()
                .with_angle("Eye level, slightly angled to capture both subject and window")
                .with_lens("50mm prime lens equivalent, creating natural perspective")
                .with_depth_of_field(
                    "Shallow, f/2.0, subject in sharp focus with creamy bokeh in background",
                ),
        )
        .with_text_element(
            TextElement::new("COFFEE & CIGARS")
                .with_style("Vintage hand-painted sign lettering")
                .with_position("On a wooden sign hanging on the back wall")
                .with_color("#2F1810"),
        )
}

fn product_photography() -> StructuredPrompt {
    StructuredPrompt::new()
        .with_scene("Minimalist product photography setup")
        .with_subject(
            Subject::new("A sleek matte black wireless headphone")
                .with_position("center of frame, slightly angled")
                .with_action("resting on a geometric concrete pedestal"),
        )
        .with_style("High-end commercial product photography, clean and modern")
        .with_color_palette(["#1a1a1a", "#ffffff", "#c0c0c0", "#2d2d2d"])
        .with_lighting(
            "Three-point studio lighting with soft key light from upper left, fill from right, and rim light from behind creating subtle edge highlights",
        )
        .with_mood("Premium, sophisticated, minimalist")
        .with_background("Seamless gradient from light gray to white")
        .with_composition(
            "Product centered with generous negative space, shot from slight three-quarter angle",
        )
        .with_camera(
            Camera::new()
                .with_angle("Eye level, 30-degree rotation")
                .with_lens("100mm macro for product detail")
                .with_depth_of_field("Deep focus, f/8, entire product sharp"),
        )
}

fn fantasy_landscape() -> StructuredPrompt {
    StructuredPrompt::new()
        .with_scene("Ancient floating islands above a mystical sea at twilight")
        .with_subject(
            Subject::new("A massive floating island with waterfalls cascading into the clouds")
                .with_position("upper center of frame")
                .with_action("hovering majestically with ancient ruins visible"),
        )
        .with_subject(
            Subject::new("A small sailing ship with glowing sails")
                .with_position("lower third, sailing between islands")
                .with_action("navigating through the cloud sea"),
        )
        .with_style(
            "Digital matte painting, epic fantasy art style inspired by Studio Ghibli and classical romanticism",
        )
        .with_color_palette(["#1e3a5f", "#ff7e47", "#9b4dca", "#ffd700", "#2e8b57"])
        .with_lighting(
            "Golden hour twilight with the sun setting behind the main island, creating dramatic god rays through the clouds",
        )
        .with_mood("Awe-inspiring, adventurous, dreamlike wonder")
        .with_background(
            "Endless sea of clouds with distant floating islands, stars beginning to appear in the darkening sky",
        )
        .with_composition(
            "Epic wide shot with strong vertical elements, rule of thirds placing main island on upper intersection",
        )
        .with_camera(
            Camera::new()
                .with_angle("Low angle looking up at the floating islands")
                .with_lens("Wide angle 24mm for epic scale")
                .with_depth_of_field("Deep focus with atmospheric perspective for depth"),
        )
}

fn portrait() -> StructuredPrompt {
    StructuredPrompt::new()
        .with_scene("Environmental portrait in an artist's studio")
        .with_subject(
            Subject::new(
                "An elderly Japanese ceramicist with weathered hands and kind eyes, wearing a traditional indigo work apron",
            )
            .with_position("right third of frame, three-quarter view")
            .with_action("carefully shaping a clay vessel on a potter's wheel"),
        )
        .with_style("Documentary portrait photography, natural and authentic")
        .with_color_palette(["#3d5a80", "#8b7355", "#f4e4c1", "#2c2c2c", "#c17f59"])
        .with_lighting(
            "Natural light from a large north-facing window, soft and even with subtle shadows defining facial features",
        )
        .with_mood("Contemplative, dignified, timeless craftsmanship")
        .with_background(
            "Shelves of finished pottery, raw clay, and traditional tools slightly out of focus",
        )
        .with_composition(
            "Environmental portrait showing both subject and their workspace, shallow depth isolating the artist",
        )
        .with_camera(
            Camera::new()
                .with_angle("Slightly below eye level, showing respect")
                .with_lens("85mm portrait lens")
                .with_depth_of_field("Shallow f/2.8, eyes sharp, background softly blurred"),
        )
}

fn text_poster() -> StructuredPrompt {
    StructuredPrompt::new()
        .with_scene("Vintage movie poster design")
        .with_subject(
            Subject::new("A noir detective in a trench coat and fedora")
                .with_position("lower half of frame, dramatic upward angle")
                .with_action("lighting a cigarette, face half in shadow"),
        )
        .with_style("1940s film noir movie poster, dramatic illustration style")
        .with_color_palette(["#1a1a2e", "#e94560", "#0f3460", "#f1c40f"])
        .with_lighting(
            "Harsh single light source from above right, creating dramatic shadows and high contrast",
        )
        .with_mood("Mysterious, dangerous, suspenseful")
        .with_background("Rain-slicked city streets with neon signs reflected, Art Deco buildings")
        .with_composition("Vertical poster format with dramatic diagonal composition")
        .with_camera(
            Camera::new()
                .with_angle("Low dramatic angle looking up")
                .with_lens("Wide angle for distortion")
                .with_depth_of_field("Stylized illustration, not photographic"),
        )
        .with_text_element(
            TextElement::new("SHADOWS OF DECEIT")
                .with_style("Bold Art Deco typography with subtle 3D effect")
                .with_position("Top third of poster, arched")
                .with_color("#f1c40f"),
        )
        .with_text_element(
            TextElement::new("COMING FALL 1947")
                .with_style("Smaller condensed sans-serif")
                .with_position("Bottom of poster")
                .with_color("#ffffff"),
        )
}
