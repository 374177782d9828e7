// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::VerificationSettings;
use crate::domain::models::candidate::{CandidateImage, Verdict, VerificationOutcome};
use crate::domain::models::item::ItemDescriptor;
use crate::utils::url_utils::host_of;

const TITLE_OR_PAGE_WEIGHT: f64 = 0.3;
const ALT_TEXT_WEIGHT: f64 = 0.2;
const IMAGE_URL_WEIGHT: f64 = 0.2;
const SURROUNDING_TEXT_WEIGHT: f64 = 0.2;
const RELIABLE_RETAILER_WEIGHT: f64 = 0.1;

/// 所有类别权重之和
pub const MAX_SCORE: f64 = 1.0;

// Absorbs float drift such as 0.2 + 0.1 = 0.30000000000000004.
const SCORE_EPSILON: f64 = 1e-9;

/// 下载后 OCR 复核的结论
#[derive(Debug, Clone, PartialEq)]
pub enum OcrReview {
    /// 临界候选加分后达到阈值
    Rescued { score: f64, matched: Vec<String> },
    /// 临界候选加分后仍未达到阈值，文件应删除
    Discarded { score: f64 },
    /// 已接受的候选 OCR 也命中了标识符，仅计入统计
    Confirmed { matched: Vec<String> },
    /// 已接受的候选 OCR 没有命中
    Unconfirmed,
}

/// 相关性验证器
///
/// 按页面标题/来源地址、alt 文本、图片地址、周边文本、可信零售商五类证据
/// 独立加权打分，每类最多计一次。
#[derive(Debug, Clone)]
pub struct RelevanceVerifier {
    identifiers: Vec<String>,
    threshold: f64,
    ocr_boost: f64,
    reliable_retailers: Vec<String>,
    borderline_enabled: bool,
}

impl RelevanceVerifier {
    /// 创建验证器
    ///
    /// # 参数
    ///
    /// * `item` - 商品描述
    /// * `settings` - 验证配置
    /// * `ocr_available` - OCR 引擎是否可用；不可用时不产生临界结论
    pub fn new(item: &ItemDescriptor, settings: &VerificationSettings, ocr_available: bool) -> Self {
        Self {
            identifiers: item.identifiers(),
            threshold: settings.confidence_threshold,
            ocr_boost: settings.ocr_boost,
            reliable_retailers: settings
                .reliable_retailers
                .iter()
                .map(|r| r.to_lowercase())
                .collect(),
            borderline_enabled: settings.ocr_enabled && ocr_available,
        }
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    fn first_match(&self, haystack: &str) -> Option<&str> {
        if haystack.is_empty() {
            return None;
        }
        self.identifiers
            .iter()
            .find(|ident| haystack.contains(ident.as_str()))
            .map(String::as_str)
    }

    fn reliable_retailer(&self, candidate: &CandidateImage) -> Option<&str> {
        let hosts = [
            host_of(&candidate.source_page_url),
            host_of(&candidate.url),
        ];
        hosts.iter().flatten().find_map(|host| {
            self.reliable_retailers
                .iter()
                .find(|retailer| {
                    host == retailer.as_str() || host.ends_with(&format!(".{}", retailer))
                })
                .map(String::as_str)
        })
    }

    /// 计算预下载相关性分数，结果位于 `[0, 1]`
    pub fn score(&self, candidate: &CandidateImage) -> (f64, Vec<String>) {
        if self.identifiers.is_empty() {
            return (MAX_SCORE, vec!["no_identifiers_to_check".to_string()]);
        }

        let lower = |value: &Option<String>| value.as_deref().unwrap_or_default().to_lowercase();
        let title = lower(&candidate.page_title);
        let alt = lower(&candidate.alt_text);
        let surrounding = lower(&candidate.surrounding_text);
        let source_url = candidate.source_page_url.to_lowercase();
        let image_url = candidate.url.to_lowercase();

        let mut score = 0.0;
        let mut reasons = Vec::new();

        if let Some(ident) = self.first_match(&title).or_else(|| self.first_match(&source_url)) {
            score += TITLE_OR_PAGE_WEIGHT;
            reasons.push(format!("page_title_or_url_match:{}", ident));
        }
        if let Some(ident) = self.first_match(&alt) {
            score += ALT_TEXT_WEIGHT;
            reasons.push(format!("alt_text_match:{}", ident));
        }
        if let Some(ident) = self.first_match(&image_url) {
            score += IMAGE_URL_WEIGHT;
            reasons.push(format!("img_url_match:{}", ident));
        }
        if let Some(ident) = self.first_match(&surrounding) {
            score += SURROUNDING_TEXT_WEIGHT;
            reasons.push(format!("surrounding_text_match:{}", ident));
        }
        if let Some(retailer) = self.reliable_retailer(candidate) {
            score += RELIABLE_RETAILER_WEIGHT;
            reasons.push(format!("reliable_retailer:{}", retailer));
        }

        (score.clamp(0.0, MAX_SCORE), reasons)
    }

    fn meets_threshold(&self, score: f64) -> bool {
        score + SCORE_EPSILON >= self.threshold
    }

    /// 预下载验证，得到接受/拒绝/临界三种结论
    pub fn verify(&self, candidate: &CandidateImage) -> VerificationOutcome {
        let (score, reasons) = self.score(candidate);
        let verdict = if self.meets_threshold(score) {
            Verdict::Accepted
        } else if self.borderline_enabled && score + self.ocr_boost + SCORE_EPSILON >= self.threshold {
            Verdict::Borderline
        } else {
            Verdict::Rejected
        };
        VerificationOutcome {
            verdict,
            score,
            reasons,
        }
    }

    /// OCR 文本中出现的标识符
    pub fn ocr_matches(&self, ocr_text: &str) -> Vec<String> {
        let text = ocr_text.to_lowercase();
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.identifiers
            .iter()
            .filter(|ident| text.contains(ident.as_str()))
            .cloned()
            .collect()
    }

    /// 下载后的 OCR 复核
    ///
    /// 临界候选命中标识符时在原分数上加 `ocr_boost`，达到阈值即挽救；
    /// 已接受的候选只记录是否命中，不改变结论。
    pub fn review_with_ocr(&self, outcome: &VerificationOutcome, ocr_text: &str) -> OcrReview {
        let matched = self.ocr_matches(ocr_text);

        if outcome.is_borderline() {
            let boosted = if matched.is_empty() {
                outcome.score
            } else {
                outcome.score + self.ocr_boost
            };
            if !matched.is_empty() && self.meets_threshold(boosted) {
                OcrReview::Rescued {
                    score: boosted,
                    matched,
                }
            } else {
                OcrReview::Discarded { score: boosted }
            }
        } else if matched.is_empty() {
            OcrReview::Unconfirmed
        } else {
            OcrReview::Confirmed { matched }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;

    fn verifier(item: &ItemDescriptor, ocr_available: bool) -> RelevanceVerifier {
        let settings = Settings::defaults().unwrap();
        RelevanceVerifier::new(item, &settings.verification, ocr_available)
    }

    #[test]
    fn test_no_identifiers_accepts_everything() {
        let verifier = verifier(&ItemDescriptor::new(), true);
        let candidate = CandidateImage::new("https://x.example/a.jpg", "generic", "");

        let outcome = verifier.verify(&candidate);
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert_eq!(outcome.score, 1.0);
    }

    #[test]
    fn test_filename_and_reliable_retailer_meet_threshold() {
        let item = ItemDescriptor::new().with_brand("nike").with_color("black");
        let verifier = verifier(&item, false);
        let candidate = CandidateImage::new(
            "https://static.example-cdn.com/img/shoe-black.jpg",
            "Nike",
            "https://www.nike.com/w?q=shoe",
        );

        let outcome = verifier.verify(&candidate);
        // Source url also contains "nike", so the page category fires too.
        assert!(outcome.score >= 0.3);
        assert_eq!(outcome.verdict, Verdict::Accepted);
        assert!(outcome
            .reasons
            .iter()
            .any(|r| r == "reliable_retailer:nike.com"));
        assert!(outcome.reasons.iter().any(|r| r.starts_with("img_url_match")));
    }

    #[test]
    fn test_each_category_counts_once() {
        let item = ItemDescriptor::new()
            .with_brand("adidas")
            .with_model("samba")
            .with_color("white");
        let verifier = verifier(&item, false);
        let candidate = CandidateImage::new(
            "https://assets.adidas.com/samba-white.jpg",
            "Adidas",
            "https://www.adidas.com/us/samba",
        )
        .with_page_title(Some("Adidas Samba OG White".into()))
        .with_alt_text(Some("adidas samba white side".into()))
        .with_surrounding_text(Some("The Samba in white".into()));

        let (score, reasons) = verifier.score(&candidate);
        assert!(score <= MAX_SCORE);
        assert!((score - 1.0).abs() < 1e-9);
        assert_eq!(reasons.len(), 5);
    }

    #[test]
    fn test_borderline_requires_ocr() {
        let item = ItemDescriptor::new().with_brand("vans");
        let candidate = CandidateImage::new("https://cdn.example/vans-1.jpg", "generic", "https://blog.example/post");

        let with_ocr = verifier(&item, true).verify(&candidate);
        assert_eq!(with_ocr.verdict, Verdict::Borderline);

        let without_ocr = verifier(&item, false).verify(&candidate);
        assert_eq!(without_ocr.verdict, Verdict::Rejected);
    }

    #[test]
    fn test_low_score_is_rejected() {
        let item = ItemDescriptor::new().with_brand("vans");
        let candidate = CandidateImage::new("https://cdn.example/a.jpg", "generic", "https://blog.example/post");

        let outcome = verifier(&item, true).verify(&candidate);
        assert_eq!(outcome.verdict, Verdict::Rejected);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_ocr_rescue_and_discard() {
        let item = ItemDescriptor::new().with_brand("vans");
        let verifier = verifier(&item, true);
        let candidate = CandidateImage::new("https://cdn.example/vans-1.jpg", "generic", "https://blog.example/post");
        let outcome = verifier.verify(&candidate);

        match verifier.review_with_ocr(&outcome, "VANS OFF THE WALL") {
            OcrReview::Rescued { score, matched } => {
                assert!((score - 0.35).abs() < 1e-9);
                assert_eq!(matched, vec!["vans"]);
            }
            other => panic!("expected rescue, got {:?}", other),
        }

        assert_eq!(
            verifier.review_with_ocr(&outcome, "nothing useful"),
            OcrReview::Discarded { score: 0.2 }
        );
    }

    #[test]
    fn test_ocr_confirmation_does_not_change_acceptance() {
        let item = ItemDescriptor::new().with_brand("nike");
        let verifier = verifier(&item, true);
        let accepted = VerificationOutcome {
            verdict: Verdict::Accepted,
            score: 0.5,
            reasons: vec![],
        };

        assert_eq!(
            verifier.review_with_ocr(&accepted, "Nike Air"),
            OcrReview::Confirmed {
                matched: vec!["nike".to_string()]
            }
        );
        assert_eq!(verifier.review_with_ocr(&accepted, ""), OcrReview::Unconfirmed);
    }
}
