//! On-disk response cache, one directory per cache slot

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use skycast_core::CacheSlot;

use crate::ArchiveResult;

#[derive(Debug, Clone)]
pub struct DiskCache {
    history_dir: PathBuf,
    lookup_dir: PathBuf,
}

impl DiskCache {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(history_dir: P, lookup_dir: Q) -> Self {
        Self {
            history_dir: history_dir.as_ref().to_path_buf(),
            lookup_dir: lookup_dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self, slot: CacheSlot) -> &Path {
        match slot {
            CacheSlot::History => &self.history_dir,
            CacheSlot::Lookup => &self.lookup_dir,
        }
    }

    pub fn path(&self, slot: CacheSlot, key: &str) -> PathBuf {
        self.dir(slot).join(sanitize(key))
    }

    /// Cached body for `key`, or the result of `fetch` written through to disk
    pub async fn get_or_fetch<F, Fut>(
        &self,
        slot: CacheSlot,
        key: &str,
        fetch: F,
    ) -> ArchiveResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ArchiveResult<String>>,
    {
        let path = self.path(slot, key);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => {
                tracing::debug!(path = %path.display(), "cache hit");
                return Ok(body);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let body = fetch().await?;
        let dir = self.dir(slot).to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let target = path.clone();
        let contents = body.clone();
        tokio::task::spawn_blocking(move || persist(&dir, &target, contents.as_bytes()))
            .await
            .map_err(std::io::Error::other)??;
        tracing::debug!(path = %path.display(), bytes = body.len(), "cached");
        Ok(body)
    }
}

/// Write through a private temp file in `dir`, then move it onto `target`
///
/// Readers never see a partial file. When several writers race on one key,
/// any of them completing leaves a full copy in place.
fn persist(dir: &Path, target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    match file.persist(target) {
        Ok(_) => Ok(()),
        Err(e) if target.exists() => {
            tracing::debug!(
                path = %target.display(),
                error = %e.error,
                "already cached by another writer"
            );
            Ok(())
        }
        Err(e) => Err(e.error),
    }
}

/// File name safe on every platform
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
