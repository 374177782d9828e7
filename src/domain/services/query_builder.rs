// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::item::ItemDescriptor;

fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// 根据商品描述生成有序的检索词列表
///
/// 规则彼此独立，满足前提即追加（顺序即优先级）：
/// 1. brand+model+color 之后紧跟更宽的 brand+model；没有颜色时只有 brand+model
/// 2. brand+barcode，否则单独 barcode
/// 3. brand+style+color，否则 brand+style
/// 4. 以上都没有产出时，仅 brand
///
/// 不跨规则去重，后续阶段可以合法地用相同字符串再次检索。
/// 所有字段都缺失时返回空列表，由调用方处理。
pub fn build_search_queries(item: &ItemDescriptor) -> Vec<String> {
    let brand = present(&item.brand);
    let model = present(&item.model);
    let style = present(&item.style);
    let color = present(&item.color);
    let barcode = present(&item.barcode);

    let mut queries = Vec::new();

    match (brand, model, color) {
        (Some(b), Some(m), Some(c)) => {
            queries.push(format!("{} {} {}", b, m, c));
            queries.push(format!("{} {}", b, m));
        }
        (Some(b), Some(m), None) => queries.push(format!("{} {}", b, m)),
        _ => {}
    }

    match (brand, barcode) {
        (Some(b), Some(code)) => queries.push(format!("{} {}", b, code)),
        (None, Some(code)) => queries.push(code.to_string()),
        _ => {}
    }

    match (brand, style, color) {
        (Some(b), Some(s), Some(c)) => queries.push(format!("{} {} {}", b, s, c)),
        (Some(b), Some(s), None) => queries.push(format!("{} {}", b, s)),
        _ => {}
    }

    if queries.is_empty() {
        if let Some(b) = brand {
            queries.push(b.to_string());
        }
    }

    queries
}
