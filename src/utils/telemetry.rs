// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 默认日志过滤规则，可由 `RUST_LOG` 覆盖
pub const DEFAULT_FILTER: &str = "info,garmentrs=debug";

/// 安装全局日志订阅器
///
/// 日志写到标准错误，标准输出留给运行结果；`json` 为真时输出结构化 JSON 行
pub fn init_telemetry(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}
