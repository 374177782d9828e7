// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QualitySettings;
use image::ImageReader;
use std::path::Path;
use tracing::{debug, warn};

/// 质量检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityReport {
    pub passed: bool,
    /// 无法读取尺寸时为 `None`
    pub dimensions: Option<(u32, u32)>,
}

/// 下载后的尺寸检查
///
/// 只做提示，不会删除文件；无法读取的图片按通过处理
#[derive(Debug, Clone)]
pub struct QualityGate {
    min_width: u32,
    min_height: u32,
}

impl QualityGate {
    pub fn new(settings: &QualitySettings) -> Self {
        Self {
            min_width: settings.min_width,
            min_height: settings.min_height,
        }
    }

    pub fn check(&self, path: &Path) -> QualityReport {
        match read_dimensions(path) {
            Ok((width, height)) => {
                let passed = width >= self.min_width && height >= self.min_height;
                if !passed {
                    warn!(
                        "Image below minimum quality ({}x{} < {}x{}): {}",
                        width,
                        height,
                        self.min_width,
                        self.min_height,
                        path.display()
                    );
                }
                QualityReport {
                    passed,
                    dimensions: Some((width, height)),
                }
            }
            Err(e) => {
                debug!("Could not read dimensions of {}: {}", path.display(), e);
                QualityReport {
                    passed: true,
                    dimensions: None,
                }
            }
        }
    }
}

// Downloads are always named .jpg, so the format is sniffed from content.
fn read_dimensions(path: &Path) -> Result<(u32, u32), image::ImageError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}
