// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use garmentrs::config::settings::Settings;
use garmentrs::engines::fetcher::ResilientFetcher;
use garmentrs::infrastructure::search::cascade::SearchToolkit;
use garmentrs::infrastructure::search::retailers::RetailerPanel;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 指向 mock 服务器、去掉所有等待的配置
pub fn fast_settings(server: &MockServer, download_dir: &Path) -> Settings {
    let mut settings = Settings::defaults().unwrap();
    settings.fetcher.retries = 1;
    settings.fetcher.retry_backoff_ms = 0;
    settings.fetcher.captcha_backoff_ms = 0;
    settings.fetcher.forbidden_backoff_ms = 0;
    settings.fetcher.timeout_secs = 5;
    settings.search.engine_base_url = server.uri();
    settings.search.politeness_delay_ms = 0;
    settings.search.query_delay_ms = 0;
    settings.search.warmup_delay_ms = 0;
    settings.verification.ocr_enabled = false;
    settings.browser.enabled = false;
    settings.storage.download_path = download_dir.to_string_lossy().to_string();
    settings
}

/// 共享同一抓取器的检索工具
pub fn toolkit(settings: &Settings, panel: RetailerPanel) -> Arc<SearchToolkit> {
    let fetcher = Arc::new(ResilientFetcher::new(&settings.fetcher).unwrap());
    Arc::new(
        SearchToolkit::new(
            fetcher,
            settings.search.clone(),
            settings.verification.reliable_retailers.clone(),
        )
        .with_panel(panel),
    )
}

pub fn empty_panel() -> RetailerPanel {
    RetailerPanel::new(Vec::new(), None)
}

/// 64x64 的灰度噪声 PNG；`invert` 为真时感知哈希与原图相差很远
pub fn noise_png(invert: bool) -> Vec<u8> {
    let img = GrayImage::from_fn(64, 64, |x, y| {
        let v = ((x * 37 + y * 91 + (x * y) % 53) % 256) as u8;
        Luma([if invert { 255 - v } else { v }])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub async fn mount_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

pub async fn mount_png(server: &MockServer, route: &str, bytes: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(bytes, "image/png"))
        .mount(server)
        .await;
}
