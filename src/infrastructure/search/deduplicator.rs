// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::{CandidateImage, ImageSignature};
use std::collections::HashSet;

/// 单次运行内的候选集合
///
/// 按发现顺序保存候选，并以签名保证唯一：同一签名只保留最先出现的候选
#[derive(Debug, Default, Clone)]
pub struct CandidateSet {
    seen: HashSet<ImageSignature>,
    candidates: Vec<CandidateImage>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入候选，签名已存在时返回 `false`
    pub fn insert(&mut self, candidate: CandidateImage) -> bool {
        if !self.seen.insert(candidate.signature.clone()) {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    /// 批量插入，返回新加入的数量
    pub fn extend(&mut self, candidates: impl IntoIterator<Item = CandidateImage>) -> usize {
        candidates
            .into_iter()
            .filter(|candidate| self.insert(candidate.clone()))
            .count()
    }

    /// 按顺序插入，新加入 `cap` 个后停止
    pub fn extend_capped(
        &mut self,
        candidates: impl IntoIterator<Item = CandidateImage>,
        cap: usize,
    ) -> usize {
        let mut added = 0;
        for candidate in candidates {
            if added >= cap {
                break;
            }
            if self.insert(candidate) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, signature: &ImageSignature) -> bool {
        self.seen.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateImage> {
        self.candidates.iter()
    }

    /// 前 `limit` 个候选的快照
    pub fn snapshot(&self, limit: usize) -> Vec<CandidateImage> {
        self.candidates.iter().take(limit).cloned().collect()
    }

    /// 已见过的来源页（去重，跳过搜索引擎页面），最多 `limit` 个
    pub fn source_pages(&self, limit: usize) -> Vec<String> {
        let mut pages: Vec<String> = Vec::new();
        for candidate in &self.candidates {
            if pages.len() >= limit {
                break;
            }
            let page = &candidate.source_page_url;
            if page.starts_with("http") && !page.contains("google") && !pages.contains(page) {
                pages.push(page.clone());
            }
        }
        pages
    }

    pub fn urls(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.url.clone()).collect()
    }

    pub fn into_vec(self) -> Vec<CandidateImage> {
        self.candidates
    }
}
