// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use garmentrs::infrastructure::search::retailers::{find_product_link, RetailerPanel, RetailerTemplate};

#[test]
fn test_brand_direct_sites_only_join_for_their_brand() {
    let panel = RetailerPanel::default();

    let nike: Vec<String> = panel
        .search_urls("Nike Air Max 270")
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let generic: Vec<String> = panel
        .search_urls("Acme Runner")
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    assert!(nike.contains(&"Nike".to_string()));
    assert!(!generic.contains(&"Nike".to_string()));
    assert!(!nike.contains(&"Vans".to_string()));
    assert_eq!(nike.len(), generic.len() + 1);
    // 通用零售商始终排在品牌直营站之前
    assert_eq!(generic[0], "Zappos");
    assert_eq!(panel.warmup().unwrap().name, "Reversible");
}

#[test]
fn test_template_encodes_the_query() {
    let template = RetailerTemplate::new("Amazon", "https://www.amazon.com/s?k={query}");
    assert_eq!(
        template.search_url("New Balance 990 v5"),
        "https://www.amazon.com/s?k=New%20Balance%20990%20v5"
    );
}

#[test]
fn test_first_product_link_is_resolved() {
    let html = r#"<html><body>
        <a href="/help">Help</a>
        <a href="/dp/B0001?ref=sr">Result</a>
        <a href="/product/other">Other</a>
    </body></html>"#;

    assert_eq!(
        find_product_link("https://www.amazon.com/s?k=acme", html).as_deref(),
        Some("https://www.amazon.com/dp/B0001?ref=sr")
    );
    assert_eq!(find_product_link("https://www.amazon.com/s", "<html></html>"), None);
}
