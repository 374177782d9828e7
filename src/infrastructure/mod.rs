// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 包含的子模块：
/// - 哈希去重（hashing）：持久化的精确 + 感知去重索引
/// - 可观测性（observability）：指标说明
/// - OCR（ocr）：外部文字识别引擎
/// - 检索（search）：聚合搜索解析、零售商面板与八步检索级联
pub mod hashing;
pub mod observability;
pub mod ocr;
pub mod search;
