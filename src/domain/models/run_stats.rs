// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::VerificationOutcome;
use crate::domain::models::hash_entry::{DuplicateKind, DuplicateMatch, DuplicateReport};
use crate::domain::services::captcha_detector::CaptchaKind;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// 单个检索方法的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodStat {
    pub method: String,
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    /// 累计耗时（秒）
    pub total_time: f64,
}

impl MethodStat {
    fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            attempts: 0,
            successes: 0,
            failures: 0,
            total_time: 0.0,
        }
    }

    fn absorb(&mut self, other: &MethodStat) {
        self.attempts += other.attempts;
        self.successes += other.successes;
        self.failures += other.failures;
        self.total_time += other.total_time;
    }
}

/// 一次验证码检测事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptchaEvent {
    pub url: String,
    pub kind: CaptchaKind,
    pub timestamp: DateTime<Utc>,
}

/// 只追加的验证码事件日志
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptchaLog {
    pub events: Vec<CaptchaEvent>,
}

impl CaptchaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, url: &str, kind: CaptchaKind) {
        warn!("CAPTCHA detected ({}) at {}", kind, url);
        counter!("captcha_detected_total", "kind" => kind.as_str()).increment(1);
        self.events.push(CaptchaEvent {
            url: url.to_string(),
            kind,
            timestamp: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn merge(&mut self, other: CaptchaLog) {
        self.events.extend(other.events);
    }
}

/// 被拒绝的候选及原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionDetail {
    pub url: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub accepted: u32,
    pub rejected: u32,
    pub ocr_rescued: u32,
    pub ocr_confirmed: u32,
    pub rejections: Vec<RejectionDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateDetail {
    pub url: String,
    pub original: String,
    pub kind: DuplicateKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateStats {
    pub exact: u32,
    pub perceptual: u32,
    pub details: Vec<DuplicateDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub checked: u32,
    pub passed: u32,
    pub failed: u32,
    /// 被升级规则改写过的地址数量
    pub upgraded: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptchaSummary {
    pub count: usize,
    pub events: Vec<CaptchaEvent>,
}

/// 交给调用方的运行摘要
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub verification: VerificationStats,
    pub duplicates: DuplicateStats,
    /// 按首次执行顺序排列
    pub methods: Vec<MethodStat>,
    pub quality: QualityStats,
    pub captcha: CaptchaSummary,
    pub hash_report: DuplicateReport,
}

/// 运行记录器
///
/// 作为显式累加值在各阶段之间传递，运行结束时合并为一份 [`RunSummary`]。
/// 每次记录同时写入 `metrics` 计数器，宿主进程可自行安装导出器。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecorder {
    pub methods: Vec<MethodStat>,
    pub verification: VerificationStats,
    pub duplicates: DuplicateStats,
    pub quality: QualityStats,
    pub captcha: CaptchaLog,
}

impl RunRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn method_entry(&mut self, method: &str) -> &mut MethodStat {
        let pos = match self.methods.iter().position(|m| m.method == method) {
            Some(pos) => pos,
            None => {
                self.methods.push(MethodStat::new(method));
                self.methods.len() - 1
            }
        };
        &mut self.methods[pos]
    }

    /// 记录一次方法执行；找到新候选即视为成功
    pub fn record_method(&mut self, method: &str, success: bool, elapsed: Duration) {
        let stat = self.method_entry(method);
        stat.attempts += 1;
        if success {
            stat.successes += 1;
        } else {
            stat.failures += 1;
        }
        stat.total_time += elapsed.as_secs_f64();

        let outcome = if success { "success" } else { "failure" };
        counter!(
            "cascade_method_attempts_total",
            "method" => method.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("cascade_method_duration_seconds", "method" => method.to_string())
            .record(elapsed.as_secs_f64());
    }

    pub fn method(&self, method: &str) -> Option<&MethodStat> {
        self.methods.iter().find(|m| m.method == method)
    }

    pub fn record_accepted(&mut self) {
        self.verification.accepted += 1;
    }

    pub fn record_rejected(&mut self, url: &str, outcome: &VerificationOutcome) {
        self.verification.rejected += 1;
        self.verification.rejections.push(RejectionDetail {
            url: url.to_string(),
            score: outcome.score,
            reasons: outcome.reasons.clone(),
        });
    }

    pub fn record_ocr_rescued(&mut self) {
        self.verification.ocr_rescued += 1;
        counter!("ocr_rescued_total").increment(1);
    }

    pub fn record_ocr_confirmed(&mut self) {
        self.verification.ocr_confirmed += 1;
    }

    pub fn record_duplicate(&mut self, url: &str, found: &DuplicateMatch) {
        match found.kind {
            DuplicateKind::Exact => self.duplicates.exact += 1,
            DuplicateKind::Perceptual => self.duplicates.perceptual += 1,
        }
        counter!("duplicates_detected_total", "kind" => found.kind.as_str()).increment(1);
        self.duplicates.details.push(DuplicateDetail {
            url: url.to_string(),
            original: found.original.clone(),
            kind: found.kind,
        });
    }

    pub fn record_quality(&mut self, passed: bool) {
        self.quality.checked += 1;
        if passed {
            self.quality.passed += 1;
        } else {
            self.quality.failed += 1;
        }
    }

    pub fn record_upgraded(&mut self, count: u32) {
        self.quality.upgraded += count;
    }

    pub fn record_download(&mut self) {
        counter!("images_downloaded_total").increment(1);
    }

    /// 合并另一段运行记录；方法统计按名称相加并保持首次出现的顺序
    pub fn merge(&mut self, other: RunRecorder) {
        for stat in &other.methods {
            self.method_entry(&stat.method).absorb(stat);
        }

        let v = other.verification;
        self.verification.accepted += v.accepted;
        self.verification.rejected += v.rejected;
        self.verification.ocr_rescued += v.ocr_rescued;
        self.verification.ocr_confirmed += v.ocr_confirmed;
        self.verification.rejections.extend(v.rejections);

        let d = other.duplicates;
        self.duplicates.exact += d.exact;
        self.duplicates.perceptual += d.perceptual;
        self.duplicates.details.extend(d.details);

        let q = other.quality;
        self.quality.checked += q.checked;
        self.quality.passed += q.passed;
        self.quality.failed += q.failed;
        self.quality.upgraded += q.upgraded;

        self.captcha.merge(other.captcha);
    }

    pub fn into_summary(self, hash_report: DuplicateReport) -> RunSummary {
        RunSummary {
            verification: self.verification,
            duplicates: self.duplicates,
            methods: self.methods,
            quality: self.quality,
            captcha: CaptchaSummary {
                count: self.captcha.len(),
                events: self.captcha.events,
            },
            hash_report,
        }
    }
}
