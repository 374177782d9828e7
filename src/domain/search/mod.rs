// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 检索领域模块
///
/// 定义级联获取方法的接口、错误类型与一次运行共享的状态
pub mod engine;
