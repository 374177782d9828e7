// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：商品描述、候选图片、哈希记录与运行统计
/// - 检索（search）：级联方法接口与共享状态
/// - 服务（services）：查询构造、验证码识别、页面抽取、相关性验证等规则
pub mod models;
pub mod search;
pub mod services;
