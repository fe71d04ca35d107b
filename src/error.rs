use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryboardError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Script analysis failed: {0}")]
    AnalysisError(String),

    #[error("Image generation failed: {0}")]
    GenerationError(String),

    #[error("No images generated yet to download")]
    NothingToExport,

    #[error("Archive tooling unavailable: {0}")]
    ExportUnavailable(String),

    #[error("Invalid image payload: {0}")]
    PayloadError(String),

    #[error("Script is empty")]
    EmptyScript,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl StoryboardError {
    /// 将与文本服务交互时的任何失败归为 `AnalysisError`
    pub fn into_analysis(self) -> Self {
        match self {
            Self::AnalysisError(_) => self,
            other => Self::AnalysisError(other.to_string()),
        }
    }

    /// 将与图片服务交互时的任何失败归为 `GenerationError`
    pub fn into_generation(self) -> Self {
        match self {
            Self::GenerationError(_) => self,
            other => Self::GenerationError(other.to_string()),
        }
    }
}

/// 压缩包写入失败即视为导出工具不可用
impl From<zip::result::ZipError> for StoryboardError {
    fn from(e: zip::result::ZipError) -> Self {
        Self::ExportUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoryboardError>;
