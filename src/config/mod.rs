// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理抓取、检索、验证、去重、浏览器、OCR 与存储配置
pub mod settings;
