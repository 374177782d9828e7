// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::perceptual::{dhash, from_hex, hamming_distance, phash, to_hex};
use crate::domain::models::hash_entry::{
    DuplicateGroup, DuplicateGroupMember, DuplicateKind, DuplicateMatch, DuplicateReport,
    HashEntry,
};
use chrono::Utc;
use image::ImageReader;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// 去重索引错误类型
#[derive(Error, Debug)]
pub enum HashIndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 持久化格式：内容哈希 → 记录，感知哈希 → 内容哈希列表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    index: BTreeMap<String, HashEntry>,
    #[serde(default)]
    phash_map: BTreeMap<String, Vec<String>>,
}

/// 持久化的精确 + 感知去重索引
///
/// 启动时整体读入，每次修改后整体写回（先写同目录临时文件再重命名）。
/// 假定单进程单会话写入。
#[derive(Debug)]
pub struct DuplicateIndex {
    path: PathBuf,
    similarity_threshold: u32,
    data: IndexFile,
}

impl DuplicateIndex {
    /// 打开索引文件；文件不存在或损坏时从空索引开始
    pub fn open(path: impl Into<PathBuf>, similarity_threshold: u32) -> Self {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<IndexFile>(&bytes) {
                Ok(data) => {
                    info!("Loaded hash index with {} entries", data.index.len());
                    data
                }
                Err(e) => {
                    warn!("Hash index {} is unreadable, starting empty: {}", path.display(), e);
                    IndexFile::default()
                }
            },
            Err(_) => IndexFile::default(),
        };

        Self {
            path,
            similarity_threshold,
            data,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.index.is_empty()
    }

    pub fn entry(&self, content_hash: &str) -> Option<&HashEntry> {
        self.data.index.get(content_hash)
    }

    pub fn phash_bucket(&self, phash: &str) -> Option<&[String]> {
        self.data.phash_map.get(phash).map(Vec::as_slice)
    }

    /// 检查文件是否与已索引图片重复
    ///
    /// 先比较内容哈希，再线性扫描感知哈希。任何读取或解码错误都按“不重复”处理。
    pub fn is_duplicate(&self, file: &Path) -> Option<DuplicateMatch> {
        let content_hash = match content_hash(file) {
            Ok(hash) => hash,
            Err(e) => {
                warn!("Duplicate check skipped for {}: {}", file.display(), e);
                return None;
            }
        };

        if let Some(entry) = self.data.index.get(&content_hash) {
            return Some(DuplicateMatch {
                original: entry.filepath.clone(),
                kind: DuplicateKind::Exact,
            });
        }

        let (phash, _) = perceptual_hashes(file)?;
        self.nearest_within_threshold(phash)
            .map(|original| DuplicateMatch {
                original,
                kind: DuplicateKind::Perceptual,
            })
    }

    fn nearest_within_threshold(&self, phash: u64) -> Option<String> {
        self.data.phash_map.iter().find_map(|(existing, hashes)| {
            let existing = from_hex(existing)?;
            if hamming_distance(phash, existing) > self.similarity_threshold {
                return None;
            }
            let first = hashes.first()?;
            Some(
                self.data
                    .index
                    .get(first)
                    .map(|entry| entry.filepath.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
            )
        })
    }

    /// 计算哈希并加入索引，返回内容哈希
    ///
    /// 相同内容重复加入只保留一条记录
    pub fn add_image(&mut self, file: &Path, item_name: &str) -> Result<String, HashIndexError> {
        let content_hash = content_hash(file)?;
        let hashes = perceptual_hashes(file);
        let phash = hashes.map(|(p, _)| to_hex(p));
        let dhash = hashes.map(|(_, d)| to_hex(d));

        let entry = HashEntry {
            filepath: file.to_string_lossy().into_owned(),
            content_hash: content_hash.clone(),
            phash: phash.clone(),
            dhash,
            item_name: item_name.to_string(),
            timestamp: Utc::now(),
        };
        self.data.index.insert(content_hash.clone(), entry);

        if let Some(phash) = phash {
            let bucket = self.data.phash_map.entry(phash).or_default();
            if !bucket.contains(&content_hash) {
                bucket.push(content_hash.clone());
            }
        }

        self.save()?;
        debug!("Indexed {} as {}", file.display(), content_hash);
        Ok(content_hash)
    }

    /// 按文件路径移除记录，同时清理感知哈希桶；桶空则删除
    pub fn remove_image(&mut self, file: &Path) -> Result<bool, HashIndexError> {
        let filepath = file.to_string_lossy();
        let target = self
            .data
            .index
            .iter()
            .find(|(_, entry)| entry.filepath == filepath)
            .map(|(hash, _)| hash.clone());

        let Some(content_hash) = target else {
            return Ok(false);
        };

        if let Some(entry) = self.data.index.remove(&content_hash) {
            if let Some(phash) = entry.phash {
                if let Some(bucket) = self.data.phash_map.get_mut(&phash) {
                    bucket.retain(|hash| hash != &content_hash);
                    if bucket.is_empty() {
                        self.data.phash_map.remove(&phash);
                    }
                }
            }
        }

        self.save()?;
        Ok(true)
    }

    /// 按共享或阈值内相近的感知哈希分组
    pub fn duplicate_report(&self) -> DuplicateReport {
        let keys: Vec<(&String, Option<u64>)> = self
            .data
            .phash_map
            .keys()
            .map(|key| (key, from_hex(key)))
            .collect();
        let mut assigned = vec![false; keys.len()];
        let mut groups = Vec::new();

        for i in 0..keys.len() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let (seed_key, seed_hash) = keys[i];
            let mut members: Vec<&String> = vec![seed_key];

            if let Some(seed_hash) = seed_hash {
                for j in (i + 1)..keys.len() {
                    if assigned[j] {
                        continue;
                    }
                    if let Some(other) = keys[j].1 {
                        if hamming_distance(seed_hash, other) <= self.similarity_threshold {
                            assigned[j] = true;
                            members.push(keys[j].0);
                        }
                    }
                }
            }

            let images: Vec<DuplicateGroupMember> = members
                .iter()
                .filter_map(|key| self.data.phash_map.get(*key))
                .flatten()
                .map(|hash| {
                    let entry = self.data.index.get(hash);
                    DuplicateGroupMember {
                        filepath: entry
                            .map(|e| e.filepath.clone())
                            .unwrap_or_else(|| "unknown".to_string()),
                        item_name: entry.map(|e| e.item_name.clone()).unwrap_or_default(),
                        content_hash: hash.clone(),
                    }
                })
                .collect();

            if images.len() > 1 {
                groups.push(DuplicateGroup {
                    phash: seed_key.clone(),
                    count: images.len(),
                    images,
                });
            }
        }

        DuplicateReport {
            total_images: self.data.index.len(),
            unique_phashes: self.data.phash_map.len(),
            duplicate_groups: groups,
        }
    }

    fn save(&self) -> Result<(), HashIndexError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "image_hashes.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let bytes = serde_json::to_vec_pretty(&self.data)?;
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// 文件内容的 SHA-256 十六进制摘要
pub fn content_hash(file: &Path) -> Result<String, std::io::Error> {
    let bytes = fs::read(file)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// (pHash, dHash)；无法解码时返回 `None`
fn perceptual_hashes(file: &Path) -> Option<(u64, u64)> {
    let decoded = ImageReader::open(file)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(image::ImageError::IoError)
        .and_then(|reader| reader.decode());
    match decoded {
        Ok(image) => Some((phash(&image), dhash(&image))),
        Err(e) => {
            debug!("Could not compute perceptual hash for {}: {}", file.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[path = "duplicate_index_test.rs"]
mod tests;
