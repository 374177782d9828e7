// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 从检索到下载的完整流程测试

use super::helpers::{empty_panel, fast_settings, mount_html, mount_png, noise_png};
use async_trait::async_trait;
use garmentrs::application::use_cases::scrape_use_case::{ImageScraper, DIRECT_URL_SOURCE};
use garmentrs::config::settings::Settings;
use garmentrs::domain::models::item::{ItemDescriptor, ScrapeRequest};
use garmentrs::domain::models::scrape_outcome::ScrapeOutcome;
use garmentrs::infrastructure::ocr::TextRecognizer;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 购物结果页列出三张图：原图、原图的逐字节副本、另一张不同的图
async fn mount_shopping_catalog(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tbm", "shop"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
                <img src="{uri}/img/acme-runner-1.png">
                <img src="{uri}/img/acme-runner-copy.png">
                <img src="{uri}/img/acme-runner-2.png">
            </body></html>"#
        )))
        .mount(server)
        .await;
    mount_png(server, "/img/acme-runner-1.png", noise_png(false)).await;
    mount_png(server, "/img/acme-runner-copy.png", noise_png(false)).await;
    mount_png(server, "/img/acme-runner-2.png", noise_png(true)).await;
}

fn scraper(settings: Settings) -> ImageScraper {
    ImageScraper::new(settings)
        .unwrap()
        .with_retailer_panel(empty_panel())
}

fn acme_runner() -> ItemDescriptor {
    ItemDescriptor::new().with_brand("Acme").with_model("Runner")
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

#[tokio::test]
async fn test_search_verify_download_and_deduplicate() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    mount_shopping_catalog(&server).await;
    let settings = fast_settings(&server, dir.path());
    let index_path = settings.index_path();

    // Given: 最多保存两张
    let mut scraper = scraper(settings);
    let request = ScrapeRequest::new(acme_runner(), 2);

    // When
    let outcome = scraper.scrape_and_download(&request).await.unwrap();

    // Then: 副本被识别为完全重复并删除，编号不留空洞
    let names: Vec<String> = outcome.files.iter().map(|p| file_name(p)).collect();
    assert_eq!(names, vec!["Acme_Runner - 1.jpg", "Acme_Runner - 2.jpg"]);
    assert!(outcome.files.iter().all(|p| p.exists()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);

    // 第一个方法就达到目标，级联到此为止
    assert_eq!(outcome.metadata.search_terms, vec!["Acme Runner"]);
    assert_eq!(outcome.metadata.candidate_urls.len(), 3);
    assert_eq!(outcome.summary.methods.len(), 1);
    assert_eq!(outcome.summary.methods[0].method, "google_shopping");
    assert_eq!(outcome.summary.methods[0].successes, 1);

    assert_eq!(outcome.summary.verification.accepted, 3);
    assert_eq!(outcome.summary.verification.rejected, 0);
    assert_eq!(outcome.summary.duplicates.exact, 1);
    assert!(outcome.summary.duplicates.details[0]
        .url
        .ends_with("/img/acme-runner-copy.png"));

    // 64x64 的图低于质量门槛，但仍然保留
    assert_eq!(outcome.summary.quality.checked, 2);
    assert_eq!(outcome.summary.quality.failed, 2);

    let sources = &outcome.metadata.sources;
    assert_eq!(sources.len(), 2);
    assert!(sources[1].image_url.ends_with("/img/acme-runner-2.png"));
    assert!(sources.iter().all(|s| s.source_name == "Google Shopping"));
    assert!(sources[0].source_url.contains("tbm=shop"));

    assert_eq!(outcome.summary.hash_report.total_images, 2);
    assert!(index_path.exists());
    assert_eq!(scraper.duplicate_index().len(), 2);

    let report = scraper.download_report();
    assert_eq!(report.len(), 1);
    assert!(report[0].success);
    assert_eq!(report[0].image_count, 2);
}

#[tokio::test]
async fn test_second_run_recognises_previous_downloads() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    mount_shopping_catalog(&server).await;
    let request = ScrapeRequest::new(acme_runner(), 2);

    let first = scraper(fast_settings(&server, dir.path()))
        .scrape_and_download(&request)
        .await
        .unwrap();
    assert_eq!(first.files.len(), 2);

    // When: 新的抓取器从磁盘重新加载哈希索引
    let mut again = scraper(fast_settings(&server, dir.path()));
    let second = again.scrape_and_download(&request).await.unwrap();

    // Then: 所有候选都是已有文件的完全重复，原文件保持不变
    assert!(second.is_empty());
    assert_eq!(second.summary.duplicates.exact, 3);
    assert!(first.files.iter().all(|p| p.exists()));
    assert!(!again.download_report()[0].success);
}

#[tokio::test]
async fn test_direct_url_skips_the_cascade() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let uri = server.uri();

    mount_html(
        &server,
        "/product/acme",
        format!(
            r#"<html><head><title>Acme Runner</title>
                <meta property="og:image" content="{uri}/img/direct-1.png"></head>
                <body><img class="product-image" src="/img/direct-2.png"></body></html>"#
        ),
    )
    .await;
    mount_png(&server, "/img/direct-1.png", noise_png(false)).await;
    mount_png(&server, "/img/direct-2.png", noise_png(true)).await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut scraper = scraper(fast_settings(&server, dir.path()));
    let product_url = format!("{uri}/product/acme");
    let request = ScrapeRequest::for_url(product_url.clone(), ItemDescriptor::new().with_brand("Acme"), 5);

    let outcome = scraper.scrape_and_download(&request).await.unwrap();

    assert_eq!(outcome.files.len(), 2);
    assert!(outcome.metadata.search_terms.is_empty());
    assert!(outcome.summary.methods.is_empty());
    for source in &outcome.metadata.sources {
        assert_eq!(source.source_name, DIRECT_URL_SOURCE);
        assert_eq!(source.source_url, product_url);
    }
    assert_eq!(scraper.download_report()[0].target_url.as_deref(), Some(product_url.as_str()));
}

#[tokio::test]
async fn test_non_image_responses_are_not_saved() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tbm", "shop"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><img src="{uri}/img/acme-placeholder.png"></body></html>"#
        )))
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/img/acme-placeholder.png",
        "<html><body>Moved</body></html>".to_string(),
    )
    .await;

    let mut scraper = scraper(fast_settings(&server, dir.path()));
    let outcome = scraper
        .scrape_and_download(&ScrapeRequest::new(ItemDescriptor::new().with_brand("Acme"), 1))
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.metadata.candidate_urls.len(), 1);
    assert_eq!(outcome.summary.quality.checked, 0);
    assert_eq!(scraper.duplicate_index().len(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_nothing_found_still_reports_method_statistics() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();

    let mut scraper = scraper(fast_settings(&server, dir.path()));
    let outcome = scraper
        .scrape_and_download(&ScrapeRequest::new(acme_runner(), 3))
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.summary.methods.len(), 7);
    assert!(outcome.summary.methods.iter().all(|m| m.failures == m.attempts));
    assert_eq!(outcome.summary.verification.accepted, 0);

    let summary = serde_json::to_value(&outcome.summary).unwrap();
    assert!(summary.get("verification").is_some());
    assert!(summary.get("hash_report").is_some());
}

/// 对任何图片都返回同一段文字的识别器
struct FixedText(&'static str);

#[async_trait]
impl TextRecognizer for FixedText {
    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, _image: &Path) -> Option<String> {
        Some(self.0.to_string())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// 商品页上两张图：带 alt 的直接接受（0.4），只有图片地址命中的处于临界（0.2）
async fn mount_vans_page(server: &MockServer) -> String {
    mount_html(
        server,
        "/product/p1",
        r#"<html><head><title>Skate shoe</title></head><body>
            <div><img class="product-image" src="/img/vans-1.png"><p>Canvas upper</p></div>
            <div><img class="product-image" src="/img/vans-2.png" alt="Vans Old Skool"><p>Rubber sole</p></div>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_png(server, "/img/vans-1.png", noise_png(false)).await;
    mount_png(server, "/img/vans-2.png", noise_png(true)).await;
    format!("{}/product/p1", server.uri())
}

async fn scrape_vans_with_ocr(
    server: &MockServer,
    dir: &Path,
    ocr_text: &'static str,
) -> (ImageScraper, ScrapeOutcome) {
    let product_url = mount_vans_page(server).await;
    let mut settings = fast_settings(server, dir);
    settings.verification.ocr_enabled = true;

    let mut scraper = scraper(settings).with_text_recognizer(Arc::new(FixedText(ocr_text)));
    let request = ScrapeRequest::for_url(product_url, ItemDescriptor::new().with_brand("Vans"), 5);
    let outcome = scraper.scrape_and_download(&request).await.unwrap();
    (scraper, outcome)
}

#[tokio::test]
async fn test_ocr_rescues_borderline_download() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();

    // When: 识别出的文字包含品牌
    let (scraper, outcome) = scrape_vans_with_ocr(&server, dir.path(), "VANS off the wall").await;

    // Then: 临界图片被挽救，已接受的图片仅记为确认
    let names: Vec<String> = outcome.files.iter().map(|p| file_name(p)).collect();
    assert_eq!(names, vec!["Vans - 1.jpg", "Vans - 2.jpg"]);
    assert!(outcome.files.iter().all(|p| p.exists()));
    assert!(outcome.metadata.sources[1].image_url.ends_with("/img/vans-1.png"));

    let verification = &outcome.summary.verification;
    assert_eq!(verification.accepted, 2);
    assert_eq!(verification.ocr_rescued, 1);
    assert_eq!(verification.ocr_confirmed, 1);
    assert_eq!(verification.rejected, 0);
    assert_eq!(scraper.duplicate_index().len(), 2);
}

#[tokio::test]
async fn test_unrescued_borderline_download_is_deleted_and_purged() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();

    // When: 识别出的文字与商品无关
    let (scraper, outcome) = scrape_vans_with_ocr(&server, dir.path(), "size chart").await;

    // Then: 临界图片被删除并移出哈希索引，已接受的图片不受影响
    let names: Vec<String> = outcome.files.iter().map(|p| file_name(p)).collect();
    assert_eq!(names, vec!["Vans - 1.jpg"]);
    assert!(outcome.files[0].exists());
    assert!(!dir.path().join("Vans - 2.jpg").exists());
    // 保留的图片加上索引文件
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    assert_eq!(scraper.duplicate_index().len(), 1);

    let verification = &outcome.summary.verification;
    assert_eq!(verification.accepted, 1);
    assert_eq!(verification.ocr_rescued, 0);
    assert_eq!(verification.ocr_confirmed, 0);
    assert_eq!(verification.rejected, 1);
    let rejection = &verification.rejections[0];
    assert!(rejection.url.ends_with("/img/vans-1.png"));
    assert!(rejection.reasons.iter().any(|r| r == "ocr_no_match"));
    assert!(rejection.reasons.iter().any(|r| r == "img_url_match:vans"));
}
