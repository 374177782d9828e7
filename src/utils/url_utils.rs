// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 把页面中的图片/链接地址规范为绝对 http(s) 地址
///
/// 协议相对地址强制使用 HTTPS；`data:`、`javascript:` 等地址返回 `None`
pub fn absolutize(base_url: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Url::parse(&format!("https://{}", rest))
            .ok()
            .map(String::from);
    }
    let resolved = resolve_url(base_url, raw).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.into())
}

/// 小写主机名
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(str::to_lowercase))
}

/// 移动站地址：`www.` 换成 `m.`，保留路径与查询串
pub fn mobile_variant(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_string();
    let bare = host.strip_prefix("www.").unwrap_or(&host);
    if bare.starts_with("m.") {
        return None;
    }
    url.set_host(Some(&format!("m.{}", bare))).ok()?;
    url.set_fragment(None);
    Some(url.into())
}

/// AMP 地址：去掉结尾斜杠后追加 `/amp`
pub fn amp_variant(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    let path = format!("{}/amp", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    Some(url.into())
}
