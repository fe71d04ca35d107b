use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 场景唯一标识，创建时分配，之后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(Uuid);

impl SceneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 场景状态
///
/// `Pending` 与 `GeneratingPrompt` 仅为序列化兼容保留，不会进入；新场景总是 `ReadyToGenerate`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneStatus {
    Pending,
    GeneratingPrompt,
    ReadyToGenerate,
    GeneratingImage,
    Completed,
    Error,
}

impl SceneStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::GeneratingPrompt => "generating_prompt",
            Self::ReadyToGenerate => "ready_to_generate",
            Self::GeneratingImage => "generating_image",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// 卡片上显示的标签，例如 `GENERATING IMAGE`
    pub fn label(self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }
}

impl fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 脚本分析返回的分镜草稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDraft {
    /// 原文片段
    pub original_text: String,
    /// 用于生成图片的提示词
    pub visual_prompt: String,
}

impl SceneDraft {
    pub fn new(original_text: impl Into<String>, visual_prompt: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            visual_prompt: visual_prompt.into(),
        }
    }
}

/// 表示一个场景/分镜
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    id: SceneId,
    original_text: String,
    /// 可编辑的画面提示词
    pub visual_prompt: String,
    /// 最近一次成功生成的图片（`data:` URL）
    pub image_url: Option<String>,
    pub status: SceneStatus,
    /// 仅在 `Error` 状态下存在
    pub error: Option<String>,
}

impl Scene {
    pub fn from_draft(draft: SceneDraft) -> Self {
        Self {
            id: SceneId::new(),
            original_text: draft.original_text,
            visual_prompt: draft.visual_prompt,
            image_url: None,
            status: SceneStatus::ReadyToGenerate,
            error: None,
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// 合并 `patch` 中给出的字段，未给出的保持不变
    pub fn apply(&mut self, patch: ScenePatch) {
        if let Some(prompt) = patch.visual_prompt {
            self.visual_prompt = prompt;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = image_url;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
    }
}

/// 场景的部分更新；可选字段为 `Some(None)` 时清空该字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenePatch {
    pub visual_prompt: Option<String>,
    pub image_url: Option<Option<String>>,
    pub status: Option<SceneStatus>,
    pub error: Option<Option<String>>,
}

impl ScenePatch {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            visual_prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    pub fn status(status: SceneStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// 开始新一次生成：进入 `GeneratingImage` 并清除错误
    pub fn generating() -> Self {
        Self {
            status: Some(SceneStatus::GeneratingImage),
            error: Some(None),
            ..Self::default()
        }
    }

    pub fn completed(image_url: String) -> Self {
        Self {
            image_url: Some(Some(image_url)),
            status: Some(SceneStatus::Completed),
            error: Some(None),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(SceneStatus::Error),
            error: Some(Some(message.into())),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene_is_ready() {
        let scene = Scene::from_draft(SceneDraft::new("INT. LAB - NIGHT", "a dim laboratory"));
        assert_eq!(scene.status, SceneStatus::ReadyToGenerate);
        assert_eq!(scene.original_text(), "INT. LAB - NIGHT");
        assert!(scene.image_url.is_none());
        assert!(scene.error.is_none());
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut scene = Scene::from_draft(SceneDraft::new("text", "prompt"));
        scene.apply(ScenePatch::prompt("edited"));
        assert_eq!(scene.visual_prompt, "edited");
        assert_eq!(scene.status, SceneStatus::ReadyToGenerate);

        scene.apply(ScenePatch::failed("boom"));
        assert_eq!(scene.status, SceneStatus::Error);
        assert_eq!(scene.error.as_deref(), Some("boom"));

        scene.apply(ScenePatch::generating());
        assert_eq!(scene.status, SceneStatus::GeneratingImage);
        assert!(scene.error.is_none());
        assert_eq!(scene.visual_prompt, "edited");
    }

    #[test]
    fn test_failed_attempt_keeps_previous_image() {
        let mut scene = Scene::from_draft(SceneDraft::new("text", "prompt"));
        scene.apply(ScenePatch::completed("data:image/png;base64,AAAA".to_string()));
        scene.apply(ScenePatch::generating());
        scene.apply(ScenePatch::failed("nope"));
        assert!(scene.has_image());
        assert_eq!(scene.status, SceneStatus::Error);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(SceneStatus::ReadyToGenerate.to_string(), "ready_to_generate");
        assert_eq!(SceneStatus::GeneratingImage.label(), "GENERATING IMAGE");
        let json = serde_json::to_string(&SceneStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Scene::from_draft(SceneDraft::new("a", "a"));
        let b = Scene::from_draft(SceneDraft::new("a", "a"));
        assert_ne!(a.id(), b.id());
    }
}
