// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 去重索引中的一条记录，以内容哈希为键，写入后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashEntry {
    pub filepath: String,
    pub content_hash: String,
    pub phash: Option<String>,
    pub dhash: Option<String>,
    pub item_name: String,
    pub timestamp: DateTime<Utc>,
}

/// 重复类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKind {
    /// 文件内容完全相同
    Exact,
    /// 感知哈希在阈值以内
    Perceptual,
}

impl DuplicateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateKind::Exact => "exact",
            DuplicateKind::Perceptual => "perceptual",
        }
    }
}

impl fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `is_duplicate` 的命中结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    /// 已索引的原始文件路径
    pub original: String,
    pub kind: DuplicateKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroupMember {
    pub filepath: String,
    pub item_name: String,
    pub content_hash: String,
}

/// 共享（或阈值内相近）感知哈希的一组图片，仅用于诊断，不单独持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// 分组代表哈希
    pub phash: String,
    pub count: usize,
    pub images: Vec<DuplicateGroupMember>,
}

/// 去重索引的整体报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub total_images: usize,
    pub unique_phashes: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
}
