// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 验证码识别（captcha_detector）：原始响应与解析后页面两种入口
/// - 页面抽取（extraction_service）：高分辨率来源与零售商/通用抽取
/// - 质量检查（quality_gate）：下载后的尺寸检查，只做标记
/// - 查询构造（query_builder）：商品描述到有序查询列表
/// - 相关性验证（relevance_scorer）：预下载打分与 OCR 复核
/// - 零售商抽取器（retailer_extractors）：按地址匹配的有序注册表
/// - 地址升级（url_upgrade）：低分辨率地址改写规则
pub mod captcha_detector;
pub mod extraction_service;
pub mod quality_gate;
pub mod query_builder;
pub mod relevance_scorer;
pub mod retailer_extractors;
pub mod url_upgrade;
