// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工具模块
///
/// 重试策略、地址处理与日志初始化
pub mod retry_policy;
pub mod telemetry;
pub mod url_utils;
