use crate::api::{AspectRatio, ImageGenerator, ScriptAnalyzer, Style};
use crate::error::{Result, StoryboardError};
use crate::scene::{Scene, SceneId, ScenePatch};
use crate::session::Session;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// 生成失败时写入场景的提示信息
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate image. Please try again.";

/// 驱动分析与逐场景图片生成，持有会话状态
pub struct Orchestrator {
    session: Arc<Mutex<Session>>,
    analyzer: Arc<dyn ScriptAnalyzer>,
    generator: Arc<dyn ImageGenerator>,
    /// 正在进行的生成任务数
    in_flight: Arc<watch::Sender<usize>>,
    analyzing: AtomicBool,
}

/// 任务结束（包括 panic）时计数减一
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn start(counter: &Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

/// 分析结束或 future 被丢弃时清除标记
struct AnalyzingFlag<'a>(&'a AtomicBool);

impl<'a> AnalyzingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for AnalyzingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(
        session: Session,
        analyzer: Arc<dyn ScriptAnalyzer>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            session: Arc::new(Mutex::new(session)),
            analyzer,
            generator,
            in_flight: Arc::new(in_flight),
            analyzing: AtomicBool::new(false),
        }
    }

    /// 在会话锁内执行 `f`
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> T) -> T {
        f(&mut self.session.lock())
    }

    pub fn scenes(&self) -> Vec<Scene> {
        self.session.lock().scenes().to_vec()
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    pub fn set_style(&self, style: Style) {
        self.session.lock().global_style = style;
    }

    pub fn set_aspect_ratio(&self, ratio: AspectRatio) {
        self.session.lock().aspect_ratio = ratio;
    }

    /// 分析脚本；成功后替换场景列表并为每个新场景启动生成
    ///
    /// 失败时状态不变，调用方重新提交即可。
    pub async fn analyze_script(&self, script: &str) -> Result<Vec<SceneId>> {
        if script.trim().is_empty() {
            return Err(StoryboardError::EmptyScript);
        }

        let result = {
            let _flag = AnalyzingFlag::raise(&self.analyzing);
            self.analyzer.analyze(script).await
        };

        let drafts = result.map_err(|e| {
            error!("Analysis failed: {}", e);
            e.into_analysis()
        })?;

        let ids = self.session.lock().create_scenes_from_analysis(drafts);
        info!("Created {} scenes", ids.len());

        self.dispatch_ready();
        Ok(ids)
    }

    /// 为上次派发以来进入 `ReadyToGenerate` 的场景各启动一次生成，返回启动数量
    pub fn dispatch_ready(&self) -> usize {
        let ready = self.session.lock().take_ready();
        let count = ready.len();
        for id in ready {
            self.trigger_generation(id);
        }
        count
    }

    /// 用当前提示词、风格与宽高比为 `id` 启动（重新）生成
    ///
    /// 场景不存在时返回 `false`。必须在 tokio 运行时内调用。
    pub fn trigger_generation(&self, id: SceneId) -> bool {
        let Some(ticket) = self.session.lock().begin_generation(id) else {
            warn!("Scene {} not found, generation skipped", id);
            return false;
        };

        info!(
            "Generating image for scene {} ({}, {})",
            id, ticket.style, ticket.ratio
        );

        let guard = InFlight::start(&self.in_flight);
        let session = Arc::clone(&self.session);
        let generator = Arc::clone(&self.generator);
        tokio::spawn(async move {
            let _guard = guard;
            let patch = match generator
                .generate_image(&ticket.prompt, ticket.style, ticket.ratio)
                .await
            {
                Ok(image_url) => {
                    info!("Scene {} completed", ticket.scene_id);
                    ScenePatch::completed(image_url)
                }
                Err(e) => {
                    warn!("Scene {} failed: {}", ticket.scene_id, e);
                    ScenePatch::failed(GENERATION_FAILED_MESSAGE)
                }
            };
            session.lock().complete_generation(&ticket, patch);
        });
        true
    }

    /// 保存编辑后的提示词，不触发生成
    pub fn edit_prompt(&self, id: SceneId, prompt: impl Into<String>) -> bool {
        self.session.lock().edit_prompt(id, prompt)
    }

    /// 经 `confirm` 确认后清空会话并回到输入视图
    ///
    /// 进行中的生成会跑完，但结果被丢弃。
    pub fn reset(&self, confirm: impl FnOnce() -> bool) -> bool {
        let cleared = self.session.lock().reset(confirm);
        if cleared {
            info!("Session reset");
        }
        cleared
    }

    /// 等待所有进行中的生成结束；等待期间仍可启动新的生成
    pub async fn wait_idle(&self) {
        let mut rx = self.in_flight.subscribe();
        if rx.wait_for(|n| *n == 0).await.is_err() {
            error!("In-flight counter closed while waiting");
        }
    }
}
