//! Scoped staging directory for one record attempt.
//!
//! Downloads land here before being renamed and uploaded. The directory is
//! created per attempt and removed when the [`StagingArea`] drops, so a
//! failed attempt never leaks partial files into the next one.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::Instant;

/// Suffixes the browser gives in-progress downloads.
const PARTIAL_MARKERS: [&str; 2] = [".crdownload", ".tmp"];

/// Wait ceilings for staging-directory polling.
#[derive(Debug, Clone)]
pub struct StagingSettings {
    /// Poll interval while waiting for a clicked download to appear.
    pub new_file_poll: Duration,
    /// Ceiling on the wait for a clicked download to appear.
    pub new_file_timeout: Duration,
    /// Pause after a new file shows up, letting its name settle.
    pub new_file_settle: Duration,
    /// Poll interval while waiting for downloads to finish.
    pub settle_poll: Duration,
    /// Ceiling on the wait for all partial markers to disappear.
    pub settle_timeout: Duration,
    /// Extra 1-per-second polls granted when fewer files than expected
    /// are present after settling.
    pub grace_polls: u32,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            new_file_poll: Duration::from_millis(300),
            new_file_timeout: Duration::from_secs(25),
            new_file_settle: Duration::from_secs(1),
            settle_poll: Duration::from_secs(1),
            settle_timeout: Duration::from_secs(120),
            grace_polls: 3,
        }
    }
}

impl StagingSettings {
    /// Millisecond-scale settings for tests.
    pub fn fast() -> Self {
        Self {
            new_file_poll: Duration::from_millis(5),
            new_file_timeout: Duration::from_millis(100),
            new_file_settle: Duration::ZERO,
            settle_poll: Duration::from_millis(5),
            settle_timeout: Duration::from_millis(100),
            grace_polls: 1,
        }
    }
}

/// One attempt's staging directory.
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::with_prefix("tender-harvest-")?,
        })
    }

    /// Path downloads should be directed into.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Names of all entries currently in the directory.
    pub async fn list_names(&self) -> io::Result<BTreeSet<String>> {
        let mut names: BTreeSet<String> = BTreeSet::new();
        let mut entries = tokio::fs::read_dir(self.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.insert(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Wait for a file not in `known` to appear.
    ///
    /// Polls every `new_file_poll` up to `new_file_timeout`. The name
    /// returned may still carry a partial-download marker.
    ///
    /// # Returns
    /// The new file's name, or `None` on timeout.
    pub async fn wait_for_new_file(
        &self,
        known: &BTreeSet<String>,
        settings: &StagingSettings,
    ) -> io::Result<Option<String>> {
        let deadline: Instant = Instant::now() + settings.new_file_timeout;
        loop {
            let names: BTreeSet<String> = self.list_names().await?;
            if names.iter().any(|n| !known.contains(n)) {
                // Give the browser a beat to finish naming the file.
                tokio::time::sleep(settings.new_file_settle).await;
                let names: BTreeSet<String> = self.list_names().await?;
                return Ok(names.into_iter().find(|n| !known.contains(n)));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(settings.new_file_poll).await;
        }
    }

    /// Wait until no partial-download markers remain.
    ///
    /// A clean listing is confirmed with one extra poll before returning,
    /// catching renames that are mid-flight.
    ///
    /// # Returns
    /// `false` if partial files still remain at the ceiling.
    pub async fn wait_until_settled(&self, settings: &StagingSettings) -> io::Result<bool> {
        let deadline: Instant = Instant::now() + settings.settle_timeout;
        loop {
            let names: BTreeSet<String> = self.list_names().await?;
            if !names.iter().any(|n| is_partial_marker(n)) {
                tokio::time::sleep(settings.settle_poll).await;
                let names: BTreeSet<String> = self.list_names().await?;
                if !names.iter().any(|n| is_partial_marker(n)) {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(settings.settle_poll).await;
        }
    }

    /// Grant up to `grace_polls` extra waits for stragglers when fewer
    /// files than expected are present.
    pub async fn await_expected_count(
        &self,
        expected: usize,
        settings: &StagingSettings,
    ) -> io::Result<()> {
        let mut extra: u32 = 0;
        while self.list_names().await?.len() < expected && extra < settings.grace_polls {
            tokio::time::sleep(settings.settle_poll).await;
            extra += 1;
        }
        Ok(())
    }

    /// Rename a staged file to its final name.
    ///
    /// # Returns
    /// The renamed file's full path.
    pub async fn finalize(&self, staged: &str, final_name: &str) -> io::Result<PathBuf> {
        let target: PathBuf = self.path().join(final_name);
        tokio::fs::rename(self.path().join(staged), &target).await?;
        Ok(target)
    }
}

/// Whether a file name marks an in-progress download.
pub fn is_partial_marker(name: &str) -> bool {
    PARTIAL_MARKERS.iter().any(|m| name.ends_with(m))
}

/// Drop in-progress markers from a staged file name.
pub fn strip_partial_markers(name: &str) -> String {
    let mut base: &str = name;
    for marker in PARTIAL_MARKERS {
        base = base.strip_suffix(marker).unwrap_or(base);
    }
    base.to_string()
}

/// Compose the final remote name: `{base}__{description}{ext}`, or the
/// staged name unchanged when the description is empty.
pub fn compose_final_name(staged: &str, description: &str) -> String {
    if description.is_empty() {
        return staged.to_string();
    }
    match staged.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{}__{}.{}", stem, description, ext)
        }
        _ => format!("{}__{}", staged, description),
    }
}
