// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 可观测性模块
///
/// 指标说明的注册；日志订阅器见 `utils::telemetry`
pub mod metrics;
