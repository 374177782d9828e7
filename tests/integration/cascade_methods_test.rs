// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 各检索方法对 mock 搜索引擎与零售商的集成测试

use super::helpers::{empty_panel, fast_settings, mount_html, toolkit};
use garmentrs::domain::models::candidate::CandidateImage;
use garmentrs::domain::search::engine::{AcquisitionMethod, CascadeState, SearchError};
use garmentrs::infrastructure::search::cascade::SearchCascade;
use garmentrs::infrastructure::search::google::SearchMode;
use garmentrs::infrastructure::search::methods::{
    ImageSearch, MobileAmpProbe, RetailerScraping, ShoppingSearch, SiteSpecificSearch,
    StructuredDataSearch, UrlManipulation,
};
use garmentrs::infrastructure::search::retailers::{RetailerPanel, RetailerTemplate};
use tempfile::tempdir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_shopping_search_collects_foreign_images_and_deep_links() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tbm", "shop"))
        .and(query_param("q", "Acme Runner"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
                <img src="{uri}/img/shop-1.png">
                <img src="https://www.google.com/images/logo.png">
                <a href="/imgres?imgurl={uri}/img/shop-2.png&amp;imgrefurl=x">more</a>
            </body></html>"#
        )))
        .expect(1)
        .mount(&server)
        .await;

    // Given: 指向 mock 引擎的购物检索
    let kit = toolkit(&settings, empty_panel());
    let search_url = kit.engine.search_url("Acme Runner", SearchMode::Shopping);
    let method = ShoppingSearch::new(kit);
    let mut state = CascadeState::new(10);

    // When: 执行一次查询
    let added = method
        .acquire(&["Acme Runner".to_string()], &mut state)
        .await
        .unwrap();

    // Then: 引擎自身的图片被过滤，深链中的原图被还原
    assert_eq!(added, 2);
    let urls = state.candidates.urls();
    assert_eq!(
        urls,
        vec![format!("{uri}/img/shop-1.png"), format!("{uri}/img/shop-2.png")]
    );
    for candidate in state.candidates.iter() {
        assert_eq!(candidate.source_name, "Google Shopping");
        assert_eq!(candidate.source_page_url, search_url);
    }
}

#[tokio::test]
async fn test_blocked_search_page_is_logged_and_reported_as_error() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="g-recaptcha" data-sitekey="k"></div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let method = ImageSearch::new(toolkit(&settings, empty_panel()));
    let mut state = CascadeState::new(5);

    let result = method.acquire(&["Acme".to_string()], &mut state).await;

    assert!(matches!(result, Err(SearchError::Fetch(_))));
    assert!(state.candidates.is_empty());
    assert_eq!(state.recorder.captcha.len(), 1);
}

#[tokio::test]
async fn test_retailer_scraping_follows_first_product_link() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();

    mount_html(
        &server,
        "/shop/search",
        r#"<html><body>
            <a href="/about">About us</a>
            <a href="/product/acme-runner">Acme Runner</a>
            <a href="/product/other">Other</a>
        </body></html>"#
            .to_string(),
    )
    .await;
    mount_html(
        &server,
        "/product/acme-runner",
        r#"<html><head><title>Acme Runner Black</title>
            <meta property="og:image" content="OG_URL"></head>
            <body><img class="product-image" src="/img/front.png" alt="Acme Runner front"></body></html>"#
            .replace("OG_URL", &format!("{uri}/img/og.png")),
    )
    .await;

    // Given: 只有一个 mock 零售商的面板
    let panel = RetailerPanel::new(
        vec![RetailerTemplate::new("Mock Shop", format!("{uri}/shop/search?q={{query}}"))],
        None,
    );
    let method = RetailerScraping::new(toolkit(&settings, panel));
    let mut state = CascadeState::new(10);

    // When
    let added = method
        .acquire(&["Acme Runner".to_string()], &mut state)
        .await
        .unwrap();

    // Then: 商品页的图片都以零售商名义收录，并带上页面标题
    assert_eq!(added, 2);
    let urls = state.candidates.urls();
    assert!(urls.contains(&format!("{uri}/img/og.png")));
    assert!(urls.contains(&format!("{uri}/img/front.png")));
    for candidate in state.candidates.iter() {
        assert_eq!(candidate.source_name, "Mock Shop");
        assert_eq!(candidate.source_page_url, format!("{uri}/product/acme-runner"));
        assert_eq!(candidate.page_title.as_deref(), Some("Acme Runner Black"));
    }
}

#[tokio::test]
async fn test_retailer_scraping_without_product_pages_finds_nothing() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());

    mount_html(
        &server,
        "/shop/search",
        "<html><body><a href=\"/help\">No results</a></body></html>".to_string(),
    )
    .await;
    let panel = RetailerPanel::new(
        vec![RetailerTemplate::new(
            "Mock Shop",
            format!("{}/shop/search?q={{query}}", server.uri()),
        )],
        None,
    );
    let method = RetailerScraping::new(toolkit(&settings, panel));
    let mut state = CascadeState::new(10);

    let added = method.acquire(&["Acme".to_string()], &mut state).await.unwrap();

    assert_eq!(added, 0);
    assert!(state.candidates.is_empty());
}

#[tokio::test]
async fn test_structured_data_stops_at_first_productive_page() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();
    let first_site = settings.search.site_filters[0].clone();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", format!("Acme Runner {}", first_site).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
                <a href="{uri}/listing/empty">Empty listing</a>
                <a href="{uri}/listing/acme">Acme Runner listing</a>
                <a href="{uri}/listing/never">Never visited</a>
            </body></html>"#
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/listing/empty",
        "<html><body><p>Nothing here</p></body></html>".to_string(),
    )
    .await;
    mount_html(
        &server,
        "/listing/acme",
        format!(
            r#"<html><head><script type="application/ld+json">
                {{"@type": "Product", "name": "Acme Runner", "image": ["{uri}/img/ld-1.png", "{uri}/img/ld-2.png"]}}
            </script></head><body></body></html>"#
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/listing/never"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let method = StructuredDataSearch::new(toolkit(&settings, empty_panel()));
    let mut state = CascadeState::new(10);

    let added = method
        .acquire(&["Acme Runner".to_string()], &mut state)
        .await
        .unwrap();

    assert_eq!(added, 2);
    assert!(state
        .candidates
        .iter()
        .all(|c| c.source_name == "Structured Data" && c.source_page_url.ends_with("/listing/acme")));
}

#[tokio::test]
async fn test_site_specific_search_is_capped_at_three() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("tbm", "isch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
                <img src="{uri}/img/s-1.png"><img src="{uri}/img/s-2.png">
                <img src="{uri}/img/s-3.png"><img src="{uri}/img/s-4.png">
            </body></html>"#
        )))
        .mount(&server)
        .await;

    let method = SiteSpecificSearch::new(toolkit(&settings, empty_panel()));
    let mut state = CascadeState::new(20);

    let added = method
        .acquire(&["Acme".to_string(), "Acme Runner".to_string()], &mut state)
        .await
        .unwrap();

    assert_eq!(added, 3);
    assert_eq!(state.candidates.len(), 3);
    let first = state.candidates.iter().next().unwrap();
    assert_eq!(first.source_name, "Site-Specific Search");
    assert_eq!(first.source_page_url, settings.search.site_filters[0]);
}

#[tokio::test]
async fn test_amp_variant_of_source_page_is_probed() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();

    mount_html(
        &server,
        "/p/acme/amp",
        r#"<html><body>
            <img class="product-image" src="/img/amp-1.png">
            <img class="product-image" src="/img/amp-2.png">
            <img class="product-image" src="/img/amp-3.png">
        </body></html>"#
            .to_string(),
    )
    .await;

    // Given: 已有一个来自该商品页的候选
    let mut state = CascadeState::new(10);
    state.offer(CandidateImage::new(
        format!("{uri}/img/known.png"),
        "Mock Shop",
        format!("{uri}/p/acme"),
    ));
    let method = MobileAmpProbe::new(toolkit(&settings, empty_panel()));

    // When
    let added = method.acquire(&[], &mut state).await.unwrap();

    // Then: 每个变体最多两张
    assert_eq!(added, 2);
    let amp: Vec<_> = state
        .candidates
        .iter()
        .filter(|c| c.source_name == "AMP Endpoint")
        .collect();
    assert_eq!(amp.len(), 2);
    assert_eq!(amp[0].source_page_url, format!("{uri}/p/acme/amp"));
}

#[tokio::test]
async fn test_url_manipulation_keeps_only_live_upgrades() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());
    let uri = server.uri();

    Mock::given(method("HEAD"))
        .and(path("/img/original/live.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/img/original/page.png"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .mount(&server)
        .await;

    let mut state = CascadeState::new(10);
    for name in ["live", "page", "gone"] {
        state.offer(
            CandidateImage::new(
                format!("{uri}/img/thumbnail/{name}.png"),
                "Google Images",
                "https://search.test/q",
            )
            .with_alt_text(Some(format!("Acme {name}"))),
        );
    }
    let method = UrlManipulation::new(toolkit(&settings, empty_panel()));

    let added = method.acquire(&[], &mut state).await.unwrap();

    assert_eq!(added, 1);
    let upgraded = state
        .candidates
        .iter()
        .find(|c| c.source_name == "URL Manipulation")
        .unwrap();
    assert_eq!(upgraded.url, format!("{uri}/img/original/live.png"));
    assert_eq!(upgraded.source_page_url, format!("{uri}/img/thumbnail/live.png"));
    assert_eq!(upgraded.alt_text.as_deref(), Some("Acme live"));
    assert_eq!(state.recorder.quality.upgraded, 1);
}

#[tokio::test]
async fn test_standard_cascade_order_without_browser() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());

    let cascade = SearchCascade::new(toolkit(&settings, empty_panel()), None);

    assert_eq!(
        cascade.method_names(),
        vec![
            "google_shopping",
            "google_images",
            "retailer_scraping",
            "structured_data",
            "site_specific_search",
            "mobile_amp",
            "url_manipulation",
        ]
    );
}

#[tokio::test]
async fn test_cascade_against_silent_engine_records_every_method() {
    let server = MockServer::start().await;
    let dir = tempdir().unwrap();
    let settings = fast_settings(&server, dir.path());

    // Given: 引擎对所有请求都返回 404
    let cascade = SearchCascade::new(toolkit(&settings, empty_panel()), None);

    // When
    let state = cascade
        .run(&["Acme Runner".to_string(), "Acme".to_string()], 3)
        .await;

    // Then: 没有候选，每个方法都有统计且全部失败
    assert!(state.candidates.is_empty());
    assert_eq!(state.recorder.methods.len(), 7);
    assert_eq!(state.recorder.method("google_shopping").unwrap().attempts, 2);
    assert_eq!(state.recorder.method("url_manipulation").unwrap().attempts, 1);
    assert!(state.recorder.methods.iter().all(|m| m.successes == 0));
}
