use anyhow::{anyhow, Result};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;

const SUFFIX_LEN: usize = 7;
const MAX_NAME_ATTEMPTS: usize = 100;

/// Uploaded files on local disk, addressed by paths relative to the media
/// root (`posts/small.gif`).
#[derive(Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        fs::create_dir_all(&config.media_root).await?;
        Ok(Self {
            root: config.media_root.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `data` under `<root>/<upload_to>/` and returns the relative
    /// path. An existing file is never overwritten: the stem gets a random
    /// suffix instead.
    pub async fn save(&self, upload_to: &str, file_name: &str, data: &[u8]) -> Result<String> {
        let dir = self.root.join(upload_to);
        fs::create_dir_all(&dir).await?;

        let name = valid_file_name(file_name);
        let mut candidate = name.clone();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(&candidate);
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(data).await?;
                    file.flush().await?;
                    return Ok(format!("{}/{}", upload_to, candidate));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&name);
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(anyhow!("could not find a free name for {}", name))
    }

    pub async fn delete(&self, relative: &str) -> Result<()> {
        match fs::remove_file(self.root.join(relative)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps the final path component, turns spaces into `_` and drops
/// anything outside `[A-Za-z0-9._-]`.
pub fn valid_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn with_random_suffix(name: &str) -> String {
    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}
