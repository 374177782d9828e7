// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 抽取结果经过相关性验证的完整路径

use garmentrs::application::use_cases::scrape_use_case::verify_candidates;
use garmentrs::config::settings::Settings;
use garmentrs::domain::models::item::ItemDescriptor;
use garmentrs::domain::models::run_stats::RunRecorder;
use garmentrs::domain::services::extraction_service::PageExtractor;
use garmentrs::domain::services::query_builder::build_search_queries;
use garmentrs::domain::services::relevance_scorer::{OcrReview, RelevanceVerifier};

const PRODUCT_PAGE: &str = r#"<html>
<head><title>Vans Old Skool Navy | Shoes</title></head>
<body>
  <div><img class="product-image" src="/images/old-skool-navy_thumb.jpg" alt="Vans Old Skool in navy"><p>Canvas skate shoe</p></div>
  <div><img class="product-image" src="https://cdn.test/banner.jpg" alt="Summer sale"><p>Free shipping</p></div>
</body>
</html>"#;

fn item() -> ItemDescriptor {
    ItemDescriptor::new()
        .with_brand("Vans")
        .with_style("Old Skool")
        .with_color("Navy")
}

#[test]
fn test_queries_for_brand_style_color() {
    assert_eq!(build_search_queries(&item()), vec!["Vans Old Skool Navy"]);
}

#[test]
fn test_extracted_candidates_are_scored_against_the_item() {
    let settings = Settings::defaults().unwrap();
    let extraction = PageExtractor::default()
        .extract("https://www.vans.com/shop/old-skool", PRODUCT_PAGE)
        .unwrap();

    // Given: 缩略图地址被升级为原图
    assert_eq!(extraction.upgraded, 1);
    let candidates = extraction.into_candidates("Vans", 10);
    assert_eq!(candidates[0].url, "https://www.vans.com/images/old-skool-navy.jpg");

    // When
    let verifier = RelevanceVerifier::new(&item(), &settings.verification, false);
    let mut recorder = RunRecorder::new();
    let queue = verify_candidates(&verifier, candidates, &mut recorder);

    // Then: 页面标题与可信零售商对两张图都成立，alt 文本和图片地址只对商品图成立
    assert_eq!(queue.len(), 2);
    let product = &queue[0].outcome;
    assert!(product
        .reasons
        .iter()
        .any(|r| r == "alt_text_match:vans"));
    assert!(product
        .reasons
        .iter()
        .any(|r| r == "reliable_retailer:vans.com"));
    assert!((product.score - 0.8).abs() < 1e-9);
    assert!((queue[1].outcome.score - 0.4).abs() < 1e-9);
    assert_eq!(recorder.verification.accepted, 2);
}

#[test]
fn test_borderline_candidate_needs_ocr_evidence() {
    let mut settings = Settings::defaults().unwrap();
    settings.verification.reliable_retailers.clear();
    let verifier = RelevanceVerifier::new(&item(), &settings.verification, true);

    let extraction = PageExtractor::default()
        .extract(
            "https://shop.test/listing/42",
            r#"<html><body><img class="product-image" src="/a.jpg" alt="navy canvas shoe"></body></html>"#,
        )
        .unwrap();
    let candidate = extraction.into_candidates("Shop", 1).remove(0);

    // Given: 只有 alt 文本命中，0.2 加上 0.15 的 OCR 加分才达到阈值
    let outcome = verifier.verify(&candidate);
    assert!(outcome.is_borderline());

    // Then: OCR 读到标识符即挽救，读不到则丢弃
    assert!(matches!(
        verifier.review_with_ocr(&outcome, "VANS OLD SKOOL"),
        OcrReview::Rescued { .. }
    ));
    assert_eq!(
        verifier.review_with_ocr(&outcome, "size chart"),
        OcrReview::Discarded { score: outcome.score }
    );
}
