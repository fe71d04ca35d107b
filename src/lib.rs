//! 脚本转分镜：拆分场景、逐场景生成图片并打包为 zip

pub mod api;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod scene;
pub mod session;

pub use api::{AspectRatio, GeminiClient, GeminiConfig, ImageGenerator, ScriptAnalyzer, Style};
pub use error::{Result, StoryboardError};
pub use orchestrator::Orchestrator;
pub use scene::{Scene, SceneDraft, SceneId, ScenePatch, SceneStatus};
pub use session::{GenerationTicket, Session, View};
