use crate::models::question::Catalog;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载试卷并校验
pub async fn load_catalog(toml_file_path: &Path) -> Result<Catalog> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let catalog: Catalog = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    catalog
        .validate()
        .with_context(|| format!("试卷定义不合法: {}", toml_file_path.display()))?;

    tracing::info!(
        "成功加载试卷 {}: {} 道题, 总分 {}, 时长 {} 分钟",
        catalog.name,
        catalog.len(),
        catalog.total_points(),
        catalog.duration_minutes
    );

    Ok(catalog)
}

/// 从文件夹中按文件名顺序加载第一份可用的试卷
///
/// 解析失败的文件会被跳过并记录警告。
pub async fn load_catalog_from_dir(folder_path: &str) -> Result<Catalog> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    for path in &toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        match load_catalog(path).await {
            Ok(catalog) => return Ok(catalog),
            Err(e) => tracing::warn!("加载文件失败 {}: {:#}", path.display(), e),
        }
    }

    anyhow::bail!("在文件夹 {} 中没有找到可用的试卷", folder_path)
}
