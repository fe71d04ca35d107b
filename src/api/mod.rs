pub mod gemini;

use crate::error::{Result, StoryboardError};
use crate::scene::SceneDraft;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use gemini::{GeminiClient, GeminiConfig};

/// 追加在图片提示词后的画面风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Style {
    #[default]
    Cinematic,
    Realistic,
    Anime,
    Watercolor,
    Cyberpunk,
    Noir,
    Sketch,
    #[serde(rename = "3D Render")]
    Render3d,
}

impl Style {
    pub const ALL: [Style; 8] = [
        Style::Cinematic,
        Style::Realistic,
        Style::Anime,
        Style::Watercolor,
        Style::Cyberpunk,
        Style::Noir,
        Style::Sketch,
        Style::Render3d,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Cinematic => "Cinematic",
            Style::Realistic => "Realistic",
            Style::Anime => "Anime",
            Style::Watercolor => "Watercolor",
            Style::Cyberpunk => "Cyberpunk",
            Style::Noir => "Noir",
            Style::Sketch => "Sketch",
            Style::Render3d => "3D Render",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Style::ALL
            .into_iter()
            .find(|style| {
                style.as_str().eq_ignore_ascii_case(wanted)
                    || style.as_str().replace(' ', "").eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| StoryboardError::ConfigError(format!("Unknown style: {}", s)))
    }
}

/// 生成图片的宽高比
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    ClassicPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Landscape,
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Classic,
        AspectRatio::ClassicPortrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Classic => "4:3",
            AspectRatio::ClassicPortrait => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StoryboardError;

    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| StoryboardError::ConfigError(format!("Unknown aspect ratio: {}", s)))
    }
}

/// 将脚本拆分为分镜草稿
///
/// 要么返回完整列表，要么整体以 `AnalysisError` 失败。
#[async_trait]
pub trait ScriptAnalyzer: Send + Sync {
    async fn analyze(&self, script_text: &str) -> Result<Vec<SceneDraft>>;
}

/// 生成一张图片，以可直接嵌入的 `data:` URL 返回
///
/// 响应中取不到图片时返回 `GenerationError`。
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str, style: Style, ratio: AspectRatio)
        -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!("noir".parse::<Style>().unwrap(), Style::Noir);
        assert_eq!("3D Render".parse::<Style>().unwrap(), Style::Render3d);
        assert_eq!("3drender".parse::<Style>().unwrap(), Style::Render3d);
        assert!("oil painting".parse::<Style>().is_err());
    }

    #[test]
    fn test_ratio_parsing() {
        for ratio in AspectRatio::ALL {
            assert_eq!(ratio.as_str().parse::<AspectRatio>().unwrap(), ratio);
        }
        assert!("21:9".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Style::default(), Style::Cinematic);
        assert_eq!(AspectRatio::default().to_string(), "16:9");
    }
}
