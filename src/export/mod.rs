use crate::error::{Result, StoryboardError};
use crate::scene::Scene;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const ARCHIVE_NAME: &str = "storyboard.zip";

/// 第 `position` 个场景（从 1 开始）的文件名
pub fn scene_file_name(position: usize) -> String {
    format!("scene_{}.png", position)
}

/// 解码 `data:<mime>;base64,<data>` 或纯 base64 图片数据
pub fn decode_image_payload(image_url: &str) -> Result<Vec<u8>> {
    let data = match image_url.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| StoryboardError::PayloadError("data URL has no payload".to_string()))?,
        None => image_url,
    };

    STANDARD
        .decode(data.trim())
        .map_err(|e| StoryboardError::PayloadError(e.to_string()))
}

/// 将所有已生成的图片打包为 zip
///
/// 文件名沿用场景原始序号，跳过的场景在编号中留空；任一图片数据损坏则整个导出失败。
pub fn export_all(scenes: &[Scene]) -> Result<Vec<u8>> {
    let included: Vec<(usize, &str)> = scenes
        .iter()
        .enumerate()
        .filter_map(|(index, scene)| {
            scene
                .image_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| (index + 1, url))
        })
        .collect();

    if included.is_empty() {
        return Err(StoryboardError::NothingToExport);
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (position, url) in &included {
        let bytes = decode_image_payload(url)?;
        zip.start_file(scene_file_name(*position), options)?;
        zip.write_all(&bytes)?;
    }

    let cursor = zip.finish()?;

    info!("Packed {} images into archive", included.len());
    Ok(cursor.into_inner())
}

/// 打包并写入 `<dir>/storyboard.zip`
pub async fn save_archive(scenes: &[Scene], dir: &Path) -> Result<PathBuf> {
    let bytes = export_all(scenes)?;
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(ARCHIVE_NAME);
    tokio::fs::write(&path, bytes).await?;
    info!("Archive saved to: {}", path.display());
    Ok(path)
}

/// 单独保存一个场景的图片为 `<dir>/scene_<position>.png`
pub async fn save_scene_image(scene: &Scene, position: usize, dir: &Path) -> Result<PathBuf> {
    let url = scene
        .image_url
        .as_deref()
        .filter(|url| !url.is_empty())
        .ok_or(StoryboardError::NothingToExport)?;
    let bytes = decode_image_payload(url)?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(scene_file_name(position));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}
