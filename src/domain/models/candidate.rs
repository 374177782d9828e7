// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::url_upgrade::strip_size_tokens;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// 图片签名
///
/// `(host, 去掉尺寸标记的路径)`；签名相同的两个地址视为同一张图片，
/// 与查询串和分辨率后缀无关。这是单次运行内的唯一性键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSignature {
    pub host: String,
    pub path: String,
}

impl ImageSignature {
    pub fn from_url(raw: &str) -> Self {
        match Url::parse(raw.trim()) {
            Ok(url) => {
                let host = url.host_str().unwrap_or_default().to_lowercase();
                Self {
                    host,
                    path: normalize_path(url.path()),
                }
            }
            Err(_) => {
                // Not absolute; fall back to the raw string minus query/fragment.
                let bare = raw.split(['?', '#']).next().unwrap_or_default();
                Self {
                    host: String::new(),
                    path: normalize_path(bare),
                }
            }
        }
    }
}

fn normalize_path(path: &str) -> String {
    match path.rfind('/') {
        Some(pos) => {
            let (dir, file) = path.split_at(pos + 1);
            format!("{}{}", dir, strip_size_tokens(file))
        }
        None => strip_size_tokens(path),
    }
}

impl fmt::Display for ImageSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}

/// 候选图片
///
/// 每个候选携带自己的来源页和页面上下文，供相关性评分使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateImage {
    pub url: String,
    /// 产出该候选的方法或零售商名称
    pub source_name: String,
    /// 发现该图片的页面
    pub source_page_url: String,
    pub signature: ImageSignature,
    pub page_title: Option<String>,
    pub alt_text: Option<String>,
    pub surrounding_text: Option<String>,
}

impl CandidateImage {
    pub fn new(
        url: impl Into<String>,
        source_name: impl Into<String>,
        source_page_url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let signature = ImageSignature::from_url(&url);
        Self {
            url,
            source_name: source_name.into(),
            source_page_url: source_page_url.into(),
            signature,
            page_title: None,
            alt_text: None,
            surrounding_text: None,
        }
    }

    pub fn with_page_title(mut self, title: Option<String>) -> Self {
        self.page_title = title;
        self
    }

    pub fn with_alt_text(mut self, alt: Option<String>) -> Self {
        self.alt_text = alt;
        self
    }

    pub fn with_surrounding_text(mut self, text: Option<String>) -> Self {
        self.surrounding_text = text;
        self
    }
}

/// 预下载验证结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Rejected,
    /// 差一个 OCR 加分即可通过，下载后交给 OCR 复核
    Borderline,
}

/// 验证结果：结论、分数与理由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub score: f64,
    pub reasons: Vec<String>,
}

impl VerificationOutcome {
    pub fn is_borderline(&self) -> bool {
        self.verdict == Verdict::Borderline
    }
}

/// 候选与其验证结果一起进入下载环节
#[derive(Debug, Clone)]
pub struct VerifiedCandidate {
    pub candidate: CandidateImage,
    pub outcome: VerificationOutcome,
}
