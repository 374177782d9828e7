// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RESERVED_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// 商品描述
///
/// 一次抓取运行中不可变；所有字段均可选
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub style: Option<String>,
    pub color: Option<String>,
    pub barcode: Option<String>,
}

impl ItemDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// 按 brand, model, style, color, barcode 顺序返回非空字段
    pub fn fields(&self) -> Vec<&str> {
        [
            &self.brand,
            &self.model,
            &self.style,
            &self.color,
            &self.barcode,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect()
    }

    /// 小写的标识符列表，用于相关性匹配
    pub fn identifiers(&self) -> Vec<String> {
        self.fields().into_iter().map(str::to_lowercase).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// 写入哈希索引的人类可读名称 (brand model style)
    pub fn label(&self) -> String {
        [&self.brand, &self.model, &self.style]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .filter(|value| !value.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// 生成下载文件名: `<brand>_<model>_<style>_<color>_<barcode> - <n>.jpg`
    pub fn file_name(&self, image_num: usize) -> String {
        let joined = self.fields().join("_");
        let cleaned = RESERVED_FILENAME_CHARS
            .replace_all(&joined, "")
            .replace(' ', "_");
        let stem = if cleaned.is_empty() {
            "image".to_string()
        } else {
            cleaned
        };
        format!("{} - {}.jpg", stem, image_num)
    }
}

/// 一次抓取调用的输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub item: ItemDescriptor,
    /// 直接指定的商品页，设置后跳过检索级联
    pub target_url: Option<String>,
    pub max_images: usize,
}

impl ScrapeRequest {
    pub fn new(item: ItemDescriptor, max_images: usize) -> Self {
        Self {
            item,
            target_url: None,
            max_images,
        }
    }

    pub fn for_url(url: impl Into<String>, item: ItemDescriptor, max_images: usize) -> Self {
        Self {
            item,
            target_url: Some(url.into()),
            max_images,
        }
    }

    /// 既没有任何标识符也没有直接地址的请求无法处理
    pub fn is_actionable(&self) -> bool {
        self.target_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
            || !self.item.is_empty()
    }
}
