// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 抓取用例：把检索、验证、下载串成一次完整调用
pub mod application;

/// 配置模块
///
/// 分层加载默认值、配置文件与环境变量
pub mod config;

/// 领域模块
///
/// 包含商品描述、候选图片、统计等领域模型，以及查询构造、验证码识别、
/// 页面抽取、相关性验证等领域服务
pub mod domain;

/// 引擎模块
///
/// 网络出口：带重试的抓取器、身份轮换与无头浏览器
pub mod engines;

/// 基础设施模块
///
/// 检索级联、去重索引、OCR 与可观测性
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
