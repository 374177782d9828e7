// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::OcrSettings;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// 图片文字识别
///
/// 识别失败或引擎不可用时返回 `None`，从不阻塞下载流程
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// 引擎是否可用；不可用时验证器不产生临界结论
    async fn is_available(&self) -> bool;

    async fn recognize(&self, image: &Path) -> Option<String>;

    fn name(&self) -> &'static str;
}

/// 不识别任何文字
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

#[async_trait]
impl TextRecognizer for NoopRecognizer {
    async fn is_available(&self) -> bool {
        false
    }

    async fn recognize(&self, _image: &Path) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// 调用外部 `tesseract` 命令的识别器
///
/// 首次使用时以 `--version` 探测可用性，结果缓存；每张图片单独限时
pub struct TesseractRecognizer {
    command: String,
    timeout: Duration,
    available: OnceCell<bool>,
}

impl TesseractRecognizer {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            command: settings.command.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            available: OnceCell::new(),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn is_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let probe = Command::new(&self.command)
                    .arg("--version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .kill_on_drop(true)
                    .status();
                match tokio::time::timeout(self.timeout, probe).await {
                    Ok(Ok(status)) if status.success() => {
                        info!("OCR engine available: {}", self.command);
                        true
                    }
                    Ok(Ok(status)) => {
                        warn!("OCR probe exited with {}, OCR disabled", status);
                        false
                    }
                    Ok(Err(e)) => {
                        warn!("OCR engine {} not found, OCR disabled: {}", self.command, e);
                        false
                    }
                    Err(_) => {
                        warn!("OCR probe timed out, OCR disabled");
                        false
                    }
                }
            })
            .await
    }

    async fn recognize(&self, image: &Path) -> Option<String> {
        if !self.is_available().await {
            return None;
        }

        // `tesseract <image> stdout` prints the recognized text.
        let run = Command::new(&self.command)
            .arg(image)
            .arg("stdout")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("OCR failed for {}: {}", image.display(), e);
                return None;
            }
            Err(_) => {
                debug!("OCR timed out for {}", image.display());
                return None;
            }
        };
        if !output.status.success() {
            debug!("OCR exited with {} for {}", output.status, image.display());
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}
