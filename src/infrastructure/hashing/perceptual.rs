// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 64 位感知哈希 (pHash) 与差值哈希 (dHash)
//!
//! 相近的图片哈希的汉明距离也小。十六进制字符串按最高位优先编码，共 16 个字符。

use image::imageops::FilterType;
use image::DynamicImage;
use std::f64::consts::PI;

const HASH_SIZE: usize = 8;
const PHASH_SAMPLE: usize = HASH_SIZE * 4;

fn pack_bits(bits: impl Iterator<Item = bool>) -> u64 {
    bits.fold(0u64, |acc, bit| (acc << 1) | u64::from(bit))
}

/// DCT 感知哈希
///
/// 灰度缩放到 32x32，做二维 DCT-II，取左上 8x8 低频系数与其中位数比较
pub fn phash(image: &DynamicImage) -> u64 {
    let gray = image
        .grayscale()
        .resize_exact(PHASH_SAMPLE as u32, PHASH_SAMPLE as u32, FilterType::Lanczos3)
        .to_luma8();

    let pixels: Vec<f64> = gray.pixels().map(|p| f64::from(p.0[0])).collect();
    let n = PHASH_SAMPLE as f64;
    let cosines: Vec<Vec<f64>> = (0..HASH_SIZE)
        .map(|k| {
            (0..PHASH_SAMPLE)
                .map(|i| (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect();

    // Rows first, then columns; only the low-frequency block is needed.
    let mut row_pass = vec![0.0f64; PHASH_SAMPLE * HASH_SIZE];
    for y in 0..PHASH_SAMPLE {
        for u in 0..HASH_SIZE {
            row_pass[y * HASH_SIZE + u] = (0..PHASH_SAMPLE)
                .map(|x| pixels[y * PHASH_SAMPLE + x] * cosines[u][x])
                .sum();
        }
    }

    let mut low_freq = Vec::with_capacity(HASH_SIZE * HASH_SIZE);
    for v in 0..HASH_SIZE {
        for u in 0..HASH_SIZE {
            let coeff: f64 = (0..PHASH_SAMPLE)
                .map(|y| row_pass[y * HASH_SIZE + u] * cosines[v][y])
                .sum();
            low_freq.push(coeff);
        }
    }

    let median = median(&low_freq);
    pack_bits(low_freq.iter().map(|&c| c > median))
}

/// 差值哈希：灰度缩放到 9x8，比较每行相邻像素
pub fn dhash(image: &DynamicImage) -> u64 {
    let gray = image
        .grayscale()
        .resize_exact((HASH_SIZE + 1) as u32, HASH_SIZE as u32, FilterType::Lanczos3)
        .to_luma8();

    let bits = (0..HASH_SIZE as u32).flat_map(|y| {
        let gray = &gray;
        (0..HASH_SIZE as u32).map(move |x| gray.get_pixel(x + 1, y).0[0] > gray.get_pixel(x, y).0[0])
    });
    pack_bits(bits)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

pub fn to_hex(hash: u64) -> String {
    format!("{:016x}", hash)
}

pub fn from_hex(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex.trim(), 16).ok()
}
