use std::path::PathBuf;

use serde::Deserialize;

/// Blob storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the filesystem blob store. Default: "data/blobs".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Largest accepted payload in bytes. Default: 256 MiB.
    #[serde(default = "default_max_blob_size")]
    pub max_blob_size: u64,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/blobs")
}
fn default_max_blob_size() -> u64 {
    256 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            max_blob_size: default_max_blob_size(),
        }
    }
}

/// External converter configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ConversionConfig {
    /// Converter executable. Default: "soffice".
    #[serde(default = "default_binary_path")]
    pub binary_path: String,
    /// Hard wall-clock bound for one conversion. Default: 120000.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Parent directory for scratch files. Default: the system temp dir.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_binary_path() -> String {
    "soffice".into()
}
fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            timeout_ms: default_timeout_ms(),
            work_dir: None,
        }
    }
}

/// Conversion scheduler configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Default: true.
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// Delay between ticks. Default: 60000.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Records selected per tick. Default: 100.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Conversions running in parallel inside one tick. Default: 1.
    ///
    /// `soffice` instances sharing a user profile hand their work to the
    /// instance already running and exit without output, so only raise this
    /// for a converter that is safe to run in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Mime types that are viewable as-is. A pattern ending in `/*` matches
    /// by prefix, anything else by substring. Default: ["pdf", "image/*"].
    #[serde(default = "default_skip_mime_patterns")]
    pub skip_mime_patterns: Vec<String>,
}

fn default_scheduler_enabled() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    60_000
}
fn default_batch_size() -> u64 {
    100
}
fn default_concurrency() -> usize {
    1
}
fn default_skip_mime_patterns() -> Vec<String> {
    vec!["pdf".into(), "image/*".into()]
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            interval_ms: default_interval_ms(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            skip_mime_patterns: default_skip_mime_patterns(),
        }
    }
}

impl SchedulerConfig {
    /// Returns true if files of this mime type never go through the converter.
    pub fn skips_conversion(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        self.skip_mime_patterns.iter().any(|pattern| {
            let pattern = pattern.trim().to_ascii_lowercase();
            match pattern.strip_suffix('*') {
                Some(prefix) if pattern.ends_with("/*") => mime_type.starts_with(prefix),
                _ => !pattern.is_empty() && mime_type.contains(&pattern),
            }
        })
    }
}
