use crate::api::{AspectRatio, Style};
use crate::scene::{Scene, SceneDraft, SceneId, ScenePatch, SceneStatus};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// 当前显示的界面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Input,
    Results,
}

/// 生成开始时记录的快照；结果按 `scene_id` 与 `epoch` 回填
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTicket {
    pub scene_id: SceneId,
    pub epoch: u64,
    pub prompt: String,
    pub style: Style,
    pub ratio: AspectRatio,
}

/// 会话状态：场景列表、全局风格、宽高比与视图
#[derive(Debug, Default)]
pub struct Session {
    scenes: Vec<Scene>,
    pub global_style: Style,
    pub aspect_ratio: AspectRatio,
    view: View,
    /// 场景列表每次被替换或清空时递增
    epoch: u64,
    ready_queue: VecDeque<SceneId>,
    queued: HashSet<SceneId>,
}

impl Session {
    pub fn new(global_style: Style, aspect_ratio: AspectRatio) -> Self {
        Self {
            global_style,
            aspect_ratio,
            ..Self::default()
        }
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id() == id)
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn has_analyzed(&self) -> bool {
        self.view == View::Results
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn can_download(&self) -> bool {
        self.scenes.iter().any(Scene::has_image)
    }

    /// 仅当该场景正在生成时禁止重新生成
    pub fn can_regenerate(&self, id: SceneId) -> bool {
        self.scene(id)
            .is_some_and(|scene| scene.status != SceneStatus::GeneratingImage)
    }

    /// 用新的 `ReadyToGenerate` 场景替换整个列表并切换到结果视图，按显示顺序返回新 id
    pub fn create_scenes_from_analysis(&mut self, drafts: Vec<SceneDraft>) -> Vec<SceneId> {
        self.clear_scenes();
        self.scenes = drafts.into_iter().map(Scene::from_draft).collect();
        self.view = View::Results;

        let ids: Vec<SceneId> = self.scenes.iter().map(Scene::id).collect();
        for id in &ids {
            self.enqueue_ready(*id);
        }
        debug!("Session epoch {} holds {} scenes", self.epoch, ids.len());
        ids
    }

    /// 将 `patch` 合并到对应场景，未知 id 忽略
    ///
    /// 状态转入 `ReadyToGenerate` 时加入自动生成队列；保持该状态不会重复入队。
    pub fn update_scene(&mut self, id: SceneId, patch: ScenePatch) -> bool {
        let Some(scene) = self.scenes.iter_mut().find(|scene| scene.id() == id) else {
            return false;
        };

        let before = scene.status;
        scene.apply(patch);
        let entered_ready =
            before != SceneStatus::ReadyToGenerate && scene.status == SceneStatus::ReadyToGenerate;

        if entered_ready {
            self.enqueue_ready(id);
        }
        true
    }

    /// 保存编辑后的提示词，状态不变
    pub fn edit_prompt(&mut self, id: SceneId, prompt: impl Into<String>) -> bool {
        self.update_scene(id, ScenePatch::prompt(prompt))
    }

    /// 取出所有等待自动生成的场景
    pub fn take_ready(&mut self) -> Vec<SceneId> {
        self.queued.clear();
        self.ready_queue.drain(..).collect()
    }

    /// 场景进入 `GeneratingImage` 并清除错误，同时记录本次请求的提示词、风格与宽高比
    pub fn begin_generation(&mut self, id: SceneId) -> Option<GenerationTicket> {
        let prompt = self.scene(id)?.visual_prompt.clone();
        self.update_scene(id, ScenePatch::generating());

        Some(GenerationTicket {
            scene_id: id,
            epoch: self.epoch,
            prompt,
            style: self.global_style,
            ratio: self.aspect_ratio,
        })
    }

    /// 回填生成结果；旧 epoch 或场景已不存在时丢弃并返回 `false`
    pub fn complete_generation(&mut self, ticket: &GenerationTicket, patch: ScenePatch) -> bool {
        if ticket.epoch != self.epoch {
            debug!(
                "Discarding stale result for scene {} (epoch {} != {})",
                ticket.scene_id, ticket.epoch, self.epoch
            );
            return false;
        }
        self.update_scene(ticket.scene_id, patch)
    }

    /// 经 `confirm` 确认后清空全部场景并回到输入视图
    pub fn reset(&mut self, confirm: impl FnOnce() -> bool) -> bool {
        if !confirm() {
            return false;
        }
        self.clear_scenes();
        self.view = View::Input;
        true
    }

    fn clear_scenes(&mut self) {
        self.scenes.clear();
        self.ready_queue.clear();
        self.queued.clear();
        self.epoch += 1;
    }

    fn enqueue_ready(&mut self, id: SceneId) {
        if self.queued.insert(id) {
            self.ready_queue.push_back(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drafts(n: usize) -> Vec<SceneDraft> {
        (1..=n)
            .map(|i| SceneDraft::new(format!("Scene {i}"), format!("prompt {i}")))
            .collect()
    }

    #[test]
    fn test_create_preserves_order_and_count() {
        let mut session = Session::default();
        let ids = session.create_scenes_from_analysis(drafts(3));

        assert_eq!(session.scene_count(), 3);
        assert!(session.has_analyzed());
        for (i, scene) in session.scenes().iter().enumerate() {
            assert_eq!(scene.id(), ids[i]);
            assert_eq!(scene.original_text(), format!("Scene {}", i + 1));
            assert_eq!(scene.status, SceneStatus::ReadyToGenerate);
        }
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_create_replaces_previous_list() {
        let mut session = Session::default();
        let old = session.create_scenes_from_analysis(drafts(2));
        let epoch = session.epoch();
        let new = session.create_scenes_from_analysis(drafts(1));

        assert_eq!(session.scene_count(), 1);
        assert!(session.scene(old[0]).is_none());
        assert!(session.scene(new[0]).is_some());
        assert!(session.epoch() > epoch);
        assert_eq!(session.take_ready(), new);
    }

    #[test]
    fn test_ready_is_queued_once() {
        let mut session = Session::default();
        let ids = session.create_scenes_from_analysis(drafts(2));
        assert_eq!(session.take_ready(), ids);

        session.edit_prompt(ids[0], "edited");
        session.update_scene(ids[0], ScenePatch::status(SceneStatus::ReadyToGenerate));
        assert!(session.take_ready().is_empty());
    }

    #[test]
    fn test_reentering_ready_queues_again() {
        let mut session = Session::default();
        let ids = session.create_scenes_from_analysis(drafts(1));
        session.take_ready();

        session.update_scene(ids[0], ScenePatch::failed("x"));
        session.update_scene(ids[0], ScenePatch::status(SceneStatus::ReadyToGenerate));
        assert_eq!(session.take_ready(), ids);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut session = Session::default();
        session.create_scenes_from_analysis(drafts(2));
        let before = session.scenes().to_vec();

        assert!(!session.update_scene(SceneId::new(), ScenePatch::prompt("nope")));
        assert_eq!(session.scenes(), before.as_slice());
    }

    #[test]
    fn test_begin_generation_snapshots_settings() {
        let mut session = Session::new(Style::Noir, AspectRatio::Square);
        let ids = session.create_scenes_from_analysis(drafts(1));
        session.update_scene(ids[0], ScenePatch::failed("earlier"));

        let ticket = session.begin_generation(ids[0]).unwrap();
        assert_eq!(ticket.prompt, "prompt 1");
        assert_eq!(ticket.style, Style::Noir);
        assert_eq!(ticket.ratio, AspectRatio::Square);

        let scene = session.scene(ids[0]).unwrap();
        assert_eq!(scene.status, SceneStatus::GeneratingImage);
        assert!(scene.error.is_none());
        assert!(!session.can_regenerate(ids[0]));
        assert!(session.begin_generation(SceneId::new()).is_none());
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut session = Session::default();
        let ids = session.create_scenes_from_analysis(drafts(1));
        let ticket = session.begin_generation(ids[0]).unwrap();

        session.create_scenes_from_analysis(drafts(1));
        let applied =
            session.complete_generation(&ticket, ScenePatch::completed("data:,x".to_string()));
        assert!(!applied);
        assert!(!session.can_download());
    }

    #[test]
    fn test_style_change_does_not_touch_completed_scene() {
        let mut session = Session::default();
        let ids = session.create_scenes_from_analysis(drafts(1));
        let ticket = session.begin_generation(ids[0]).unwrap();
        session.complete_generation(&ticket, ScenePatch::completed("data:,img".to_string()));

        session.global_style = Style::Anime;
        session.aspect_ratio = AspectRatio::Portrait;

        let scene = session.scene(ids[0]).unwrap();
        assert_eq!(scene.status, SceneStatus::Completed);
        assert_eq!(scene.image_url.as_deref(), Some("data:,img"));
        assert!(session.can_download());
    }

    #[test]
    fn test_reset_requires_confirmation() {
        let mut session = Session::default();
        session.create_scenes_from_analysis(drafts(2));

        assert!(!session.reset(|| false));
        assert_eq!(session.scene_count(), 2);
        assert_eq!(session.view(), View::Results);

        assert!(session.reset(|| true));
        assert_eq!(session.scene_count(), 0);
        assert_eq!(session.view(), View::Input);
        assert!(session.take_ready().is_empty());
    }
}
