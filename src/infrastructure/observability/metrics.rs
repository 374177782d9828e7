// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};

/// 注册抓取流程用到的指标说明
///
/// 本库不安装任何导出器；宿主进程安装 `metrics` 记录器后这些说明才会生效
pub fn describe_metrics() {
    describe_counter!(
        "cascade_method_attempts_total",
        "Cascade method executions, labelled by method and outcome"
    );
    describe_histogram!(
        "cascade_method_duration_seconds",
        Unit::Seconds,
        "Time spent inside each cascade method"
    );
    describe_counter!(
        "captcha_detected_total",
        "Challenge pages detected, labelled by vendor"
    );
    describe_counter!(
        "duplicates_detected_total",
        "Downloads discarded as exact or perceptual duplicates"
    );
    describe_counter!("ocr_rescued_total", "Borderline downloads kept after OCR review");
    describe_counter!("images_downloaded_total", "Images saved to the download directory");
}
