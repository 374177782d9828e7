// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::CandidateImage;
use crate::domain::models::run_stats::RunRecorder;
use crate::domain::services::extraction_service::ExtractError;
use crate::engines::browser_engine::BrowserError;
use crate::engines::traits::FetchError;
use crate::infrastructure::search::deduplicator::CandidateSet;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("Method unavailable: {0}")]
    Unavailable(String),
}

/// 方法的执行范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodScope {
    /// 对每个查询各执行一次
    PerQuery,
    /// 所有查询跑完仍不足时，整次运行只执行一次
    PerRun,
}

/// 一次级联运行共享的状态：候选集合、目标数量与统计
#[derive(Debug, Default)]
pub struct CascadeState {
    pub candidates: CandidateSet,
    pub recorder: RunRecorder,
    pub target: usize,
}

impl CascadeState {
    pub fn new(target: usize) -> Self {
        Self {
            candidates: CandidateSet::new(),
            recorder: RunRecorder::new(),
            target,
        }
    }

    pub fn reached_target(&self) -> bool {
        self.candidates.len() >= self.target
    }

    pub fn offer(&mut self, candidate: CandidateImage) -> bool {
        self.candidates.insert(candidate)
    }
}

/// 级联中的一种图片获取方法
#[async_trait]
pub trait AcquisitionMethod: Send + Sync {
    /// 统计中使用的方法名
    fn name(&self) -> &'static str;

    fn scope(&self) -> MethodScope;

    /// 执行方法，返回新加入候选集合的数量
    ///
    /// 逐查询方法收到单个查询；整次运行方法收到全部查询。
    /// 单个来源的失败应在方法内部吞掉，返回的错误只表示方法整体不可用。
    async fn acquire(&self, queries: &[String], state: &mut CascadeState) -> Result<usize, SearchError>;
}
