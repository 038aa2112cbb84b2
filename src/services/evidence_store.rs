//! 证据图片存储 - 业务能力层
//!
//! 只负责"保存 / 读取截图"能力，不关心截图如何产生

use base64::Engine;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tokio::fs;
use tracing::debug;

use crate::error::{AppResult, EvidenceError};
use crate::models::ImageRef;

/// 一张证据图片的定位信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceKey {
    pub run_id: String,
    /// URL 在本次运行中的序号（从 1 开始）
    pub url_index: usize,
    pub violation_index: usize,
    pub node_index: usize,
}

impl EvidenceKey {
    fn file_name(&self) -> String {
        format!(
            "{:03}-v{:03}-n{:03}.png",
            self.url_index, self.violation_index, self.node_index
        )
    }
}

/// 证据图片存储
pub trait EvidenceStore: Send + Sync {
    /// 保存 PNG 并返回引用
    fn put<'a>(&'a self, key: &'a EvidenceKey, png: Vec<u8>) -> BoxFuture<'a, AppResult<ImageRef>>;

    /// 读取 PNG
    fn get<'a>(&'a self, image_ref: &'a ImageRef) -> BoxFuture<'a, Option<Vec<u8>>>;

    /// 以 data URI 形式返回，便于内嵌到 HTML 报告
    fn data_uri<'a>(&'a self, image_ref: &'a ImageRef) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            self.get(image_ref).await.map(|png| {
                format!(
                    "data:image/png;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(png)
                )
            })
        })
    }

    /// 释放某次运行的图片，返回释放数量
    ///
    /// 默认不做任何事：落盘的截图属于输出产物。
    fn evict_run<'a>(&'a self, _run_id: &'a str) -> BoxFuture<'a, usize> {
        Box::pin(async { 0 })
    }
}

/// 进程内存储（默认，随进程结束而消失）
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_run(&self, run_id: &str) -> usize {
        let prefix = format!("mem://{}/", run_id);
        let mut images = self.images.lock().unwrap_or_else(PoisonError::into_inner);
        let before = images.len();
        images.retain(|key, _| !key.starts_with(&prefix));
        before - images.len()
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn put<'a>(&'a self, key: &'a EvidenceKey, png: Vec<u8>) -> BoxFuture<'a, AppResult<ImageRef>> {
        Box::pin(async move {
            let reference = format!("mem://{}/{}", key.run_id, key.file_name());
            debug!("保存证据图片: {} ({} 字节)", reference, png.len());
            self.images
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(reference.clone(), png);
            Ok(ImageRef(reference))
        })
    }

    fn get<'a>(&'a self, image_ref: &'a ImageRef) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            self.images
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(image_ref.as_str())
                .cloned()
        })
    }

    fn evict_run<'a>(&'a self, run_id: &'a str) -> BoxFuture<'a, usize> {
        Box::pin(async move {
            let removed = self.remove_run(run_id);
            if removed > 0 {
                debug!("释放运行 {} 的 {} 张证据图片", run_id, removed);
            }
            removed
        })
    }
}

/// 文件系统存储：`<root>/<run_id>/<url>-v<violation>-n<node>.png`
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn put<'a>(&'a self, key: &'a EvidenceKey, png: Vec<u8>) -> BoxFuture<'a, AppResult<ImageRef>> {
        Box::pin(async move {
            let dir = self.root.join(&key.run_id);
            let path = dir.join(key.file_name());
            let store_failed = |e: std::io::Error| EvidenceError::StoreFailed {
                path: path.display().to_string(),
                source: e,
            };
            fs::create_dir_all(&dir).await.map_err(store_failed)?;
            fs::write(&path, &png).await.map_err(store_failed)?;
            debug!("保存证据图片: {}", path.display());
            Ok(ImageRef(path.to_string_lossy().to_string()))
        })
    }

    fn get<'a>(&'a self, image_ref: &'a ImageRef) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move { fs::read(image_ref.as_str()).await.ok() })
    }
}
