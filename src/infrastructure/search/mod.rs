// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 检索模块
///
/// 聚合搜索引擎的地址构造与结果解析、零售商面板、候选集合，
/// 以及由八种获取方法组成的检索级联
pub mod cascade;
pub mod deduplicator;
pub mod google;
pub mod methods;
pub mod retailers;

pub use cascade::{SearchCascade, SearchToolkit};
pub use deduplicator::CandidateSet;
