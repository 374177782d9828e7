// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 商品描述（item）：检索输入与抓取请求
/// - 候选图片（candidate）：签名、来源与验证结论
/// - 哈希记录（hash_entry）：去重索引条目与重复分组
/// - 运行统计（run_stats）：方法、验证、去重、质量与验证码统计
/// - 抓取结果（scrape_outcome）：保存的文件、来源元数据与下载报告
pub mod candidate;
pub mod hash_entry;
pub mod item;
pub mod run_stats;
pub mod scrape_outcome;
