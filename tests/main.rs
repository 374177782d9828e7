// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 集成测试用本地 mock 服务器代替搜索引擎、零售商与图片 CDN；
/// 单元测试覆盖跨模块的纯逻辑
mod integration;

// === Unit Tests ===
mod unit;
