use super::{AspectRatio, ImageGenerator, ScriptAnalyzer, Style};
use crate::error::{Result, StoryboardError};
use crate::scene::SceneDraft;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const STORYBOARD_INSTRUCTION: &str = r#"You are an expert storyboard artist and director.
Your task is to take a raw script and break it down into distinct visual scenes.

Rules:
1. Detect scene breaks based on new lines, paragraph breaks, or keywords like "Scene", "Shot", "Clip".
2. For each scene, preserve the "original_text" exactly as written.
3. Generate a "visual_prompt" for an AI image generator.
   The prompt must be highly descriptive, including lighting, camera angle, mood, environment, and action.
   Do not use copyrighted character names; describe their appearance instead.
   Keep prompts concise but potent (around 40-60 words)."#;

const QUALITY_SUFFIX: &str = "high resolution, detailed, masterpiece";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: GEMINI_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    original_text: String,
    visual_prompt: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(StoryboardError::ConfigError(
                "Gemini API key is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model.trim()
        )
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.config.api_key.trim())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(StoryboardError::ApiError(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn request_scenes(&self, script_text: &str) -> Result<Vec<SceneDraft>> {
        let request_body = json!({
            "systemInstruction": {
                "parts": [{ "text": STORYBOARD_INSTRUCTION }]
            },
            "contents": [
                { "role": "user", "parts": [{ "text": script_text }] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": scene_schema()
            }
        });

        let response = self
            .generate_content(&self.config.text_model, &request_body)
            .await?;
        let text = first_text(&response)
            .ok_or_else(|| StoryboardError::AnalysisError("No response from AI".to_string()))?;

        debug!("Analysis response text: {}", text);
        parse_scene_drafts(&text)
    }

    async fn request_image(&self, prompt: &str, style: Style, ratio: AspectRatio) -> Result<String> {
        let request_body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": compose_image_prompt(prompt, style) }] }
            ],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": ratio.as_str() }
            }
        });

        let response = self
            .generate_content(&self.config.image_model, &request_body)
            .await?;
        first_inline_image(&response).ok_or_else(|| {
            StoryboardError::GenerationError("No image data found in response".to_string())
        })
    }
}

#[async_trait]
impl ScriptAnalyzer for GeminiClient {
    async fn analyze(&self, script_text: &str) -> Result<Vec<SceneDraft>> {
        info!("Analyzing script ({} characters) with {}", script_text.len(), self.config.text_model);

        match self.request_scenes(script_text).await {
            Ok(drafts) => {
                info!("Script split into {} scenes", drafts.len());
                Ok(drafts)
            }
            Err(e) => {
                error!("Error analyzing script: {}", e);
                Err(e.into_analysis())
            }
        }
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Style,
        ratio: AspectRatio,
    ) -> Result<String> {
        info!("Generating {} image ({}) with {}", style, ratio, self.config.image_model);

        self.request_image(prompt, style, ratio).await.map_err(|e| {
            error!("Error generating image: {}", e);
            e.into_generation()
        })
    }
}

/// 在用户提示词后追加风格与画质修饰
pub fn compose_image_prompt(prompt: &str, style: Style) -> String {
    format!("{}, {} style, {}", prompt, style, QUALITY_SUFFIX)
}

fn scene_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "original_text": { "type": "STRING" },
                "visual_prompt": { "type": "STRING" }
            },
            "required": ["original_text", "visual_prompt"]
        }
    })
}

fn first_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text: String = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 返回响应中第一张内联图片，编码为 `data:` URL；其余候选被忽略
fn first_inline_image(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .iter()
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter_map(|part| part.inline_data.as_ref())
        .find_map(|inline| {
            let data = inline.data.as_deref().filter(|data| !data.is_empty())?;
            let mime = inline.mime_type.as_deref().unwrap_or("image/png");
            Some(format!("data:{};base64,{}", mime, data))
        })
}

/// 将模型返回的 JSON 数组解析为分镜草稿
pub fn parse_scene_drafts(text: &str) -> Result<Vec<SceneDraft>> {
    // 清理可能的markdown标记
    let json_text = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: Vec<RawScene> = serde_json::from_str(json_text)
        .map_err(|e| StoryboardError::AnalysisError(format!("Failed to parse scenes JSON: {}", e)))?;

    Ok(raw
        .into_iter()
        .map(|scene| SceneDraft::new(scene.original_text, scene.visual_prompt))
        .collect())
}
