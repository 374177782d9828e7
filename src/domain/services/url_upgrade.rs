// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// 文件名中常见的低分辨率后缀
pub const LOW_RES_SUFFIXES: &[&str] = &[
    "_thumb",
    "_small",
    "_tiny",
    "_mini",
    "_xs",
    "_sm",
    "_med",
    "_150x150",
    "_200x200",
    "_300x300",
    "_100x100",
    "_64x64",
    "_thumbnail",
    "_preview",
    "_low",
    "_lowres",
];

/// 低分辨率路径段与对应的高分辨率路径段
pub const PATH_REPLACEMENTS: &[(&str, &str)] = &[
    ("/thumbnail/", "/original/"),
    ("/thumbnails/", "/originals/"),
    ("/preview/", "/full/"),
    ("/small/", "/large/"),
    ("/medium/", "/large/"),
    ("/thumbs/", "/images/"),
];

/// 尺寸/质量查询参数及其大尺寸取值
pub const PARAM_UPGRADES: &[(&str, &str)] = &[
    ("width", "1200"),
    ("w", "1200"),
    ("wid", "1200"),
    ("size", "large"),
    ("quality", "100"),
    ("q", "100"),
];

static DIMENSION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_-]\d{2,4}x\d{2,4}([_.-]|$)").unwrap());

// Longest first so "_thumbnail" wins over "_thumb".
static SUFFIXES_BY_LENGTH: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut suffixes = LOW_RES_SUFFIXES.to_vec();
    suffixes.sort_by_key(|s| std::cmp::Reverse(s.len()));
    suffixes
});

/// 去掉单个路径段中的尺寸标记
///
/// 只在标记后紧跟分隔符或文件名结尾时才移除，避免误伤 `_medium` 之类的词
pub fn strip_size_tokens(segment: &str) -> String {
    let (stem, ext) = split_extension(segment);
    let mut stem = stem.to_string();

    for suffix in SUFFIXES_BY_LENGTH.iter() {
        let mut search_from = 0;
        while let Some(offset) = stem[search_from..].find(suffix) {
            let start = search_from + offset;
            let end = start + suffix.len();
            let at_boundary = stem[end..]
                .chars()
                .next()
                .is_none_or(|c| matches!(c, '_' | '-' | '.'));
            if at_boundary {
                stem.replace_range(start..end, "");
                search_from = start;
            } else {
                search_from = end;
            }
        }
    }

    let stem = DIMENSION_TOKEN.replace_all(&stem, "$1").into_owned();
    format!("{}{}", stem, ext)
}

fn split_extension(segment: &str) -> (&str, &str) {
    match segment.rfind('.') {
        Some(pos)
            if pos > 0
                && segment.len() - pos <= 6
                && segment[pos + 1..].chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (&segment[..pos], &segment[pos..])
        }
        _ => (segment, ""),
    }
}

/// 尝试把图片地址改写为更高分辨率的版本
///
/// 依次执行：路径段替换、文件名尺寸后缀去除、尺寸/质量参数改写。
/// 没有任何规则生效时原样返回输入。
pub fn upgrade_image_url(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    let original_path = url.path().to_string();
    let mut path = original_path.clone();
    for (low, high) in PATH_REPLACEMENTS {
        if path.contains(low) {
            path = path.replace(low, high);
        }
    }
    if let Some(pos) = path.rfind('/') {
        let (dir, file) = path.split_at(pos + 1);
        path = format!("{}{}", dir, strip_size_tokens(file));
    }
    let path_changed = path != original_path;

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut query_changed = false;
    let upgraded_pairs: Vec<(String, String)> = pairs
        .into_iter()
        .map(|(key, value)| {
            match PARAM_UPGRADES.iter().find(|(name, _)| *name == key) {
                Some((_, large)) => {
                    query_changed = true;
                    (key, large.to_string())
                }
                None => (key, value),
            }
        })
        .collect();

    if !path_changed && !query_changed {
        return raw.to_string();
    }

    if path_changed {
        url.set_path(&path);
    }
    if query_changed {
        url.set_fragment(None);
        url.query_pairs_mut().clear().extend_pairs(upgraded_pairs);
    }
    url.to_string()
}
