// ABOUTME: Artifact store holding each bot's uploaded source tree on local disk
// ABOUTME: Ingest stages into a scratch directory and swaps atomically into place

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use botdock_models::{BotRuntime, SourceType};
use botdock_runtimes::{extension_allowed, runtime_config};
use botdock_security::{sanitize_filename, split_extension};

/// Sentinel file kept across artifact replacement and ignored by the
/// emptiness check
const SENTINEL: &str = ".gitkeep";

#[derive(Error, Debug)]
pub enum ArtifactError {
    /// The payload failed a static check; reported verbatim to the caller
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

fn bad(msg: impl Into<String>) -> ArtifactError {
    ArtifactError::Validation(msg.into())
}

/// On-disk store of bot source trees, one directory per bot ID under a
/// configurable base (`BOT_STORAGE_PATH`, default `/var/lib/bots`).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Canonical directory for a bot's source tree, created if absent
    pub fn bot_dir(&self, bot_id: i64) -> Result<PathBuf> {
        let dir = self.base.join(bot_id.to_string());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Whether the bot directory holds any user content (the sentinel does
    /// not count)
    pub fn is_empty(&self, bot_id: i64) -> Result<bool> {
        let dir = self.base.join(bot_id.to_string());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            if entry?.file_name() != SENTINEL {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Delete the bot's directory tree. Missing directory counts as removed.
    pub fn remove(&self, bot_id: i64) -> Result<()> {
        let dir = self.base.join(bot_id.to_string());
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ingest an uploaded payload as the bot's new source tree.
    ///
    /// The client filename is sanitized first; a `.zip` name makes the
    /// payload an archive, anything else a single file whose extension must
    /// be in the runtime allow-list. The new tree is fully staged and
    /// validated before it replaces the previous contents, so a rejected
    /// upload leaves the bot's existing source untouched.
    ///
    /// Returns the stored filename and the recorded source kind.
    pub fn ingest(
        &self,
        bot_id: i64,
        client_filename: &str,
        payload: &[u8],
        runtime: BotRuntime,
    ) -> Result<(String, SourceType)> {
        let config = runtime_config(runtime);

        let filename = sanitize_filename(client_filename);
        if filename.is_empty() {
            return Err(bad("Invalid filename"));
        }

        let dir = self.bot_dir(bot_id)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.base)?;

        let source_type = if filename.ends_with(".zip") {
            extract_archive(payload, staging.path(), runtime)?;
            SourceType::Zip
        } else {
            if !extension_allowed(config, &filename, true) {
                let (_, ext) = split_extension(&filename);
                return Err(bad(format!(
                    "File type {} not allowed for {} runtime",
                    ext,
                    runtime.as_str()
                )));
            }
            fs::write(staging.path().join(&filename), payload)?;
            SourceType::File
        };

        if dir.join(SENTINEL).exists() {
            fs::write(staging.path().join(SENTINEL), b"")?;
        }

        self.swap_in(bot_id, &dir, staging.path())?;

        debug!("Stored {} for bot {}", filename, bot_id);
        Ok((filename, source_type))
    }

    // Replace the live directory with the staged tree. The previous tree is
    // parked next to it and restored if the second rename fails.
    fn swap_in(&self, bot_id: i64, dir: &Path, staged: &Path) -> Result<()> {
        let parked = self.base.join(format!(".previous-{}", bot_id));
        if parked.exists() {
            fs::remove_dir_all(&parked)?;
        }

        fs::rename(dir, &parked)?;
        if let Err(e) = fs::rename(staged, dir) {
            warn!("Failed to swap staged artifacts for bot {}: {}", bot_id, e);
            fs::rename(&parked, dir)?;
            return Err(e.into());
        }

        fs::remove_dir_all(&parked)?;
        Ok(())
    }
}

/// Validate then extract a zip payload into `dest`.
///
/// Every member is checked before any file is written: absolute paths and
/// `..` segments are rejected, and every non-directory member's extension
/// (when present) must be in the runtime allow-list.
fn extract_archive(payload: &[u8], dest: &Path, runtime: BotRuntime) -> Result<()> {
    let config = runtime_config(runtime);

    let mut archive = zip::ZipArchive::new(io::Cursor::new(payload))
        .map_err(|_| bad("Invalid zip file"))?;

    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|_| bad("Invalid zip file"))?;
        let name = entry.name().to_string();

        if member_path_is_unsafe(&name) {
            return Err(bad("Invalid file path in zip"));
        }

        if !entry.is_dir() {
            let basename = name.rsplit(['/', '\\']).next().unwrap_or(&name);
            if !extension_allowed(config, basename, false) {
                let (_, ext) = split_extension(basename);
                return Err(bad(format!(
                    "File type {} not allowed for {} runtime",
                    ext,
                    runtime.as_str()
                )));
            }
        }
    }

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|_| bad("Invalid zip file"))?;
        let out = dest.join(entry.name());

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&out)?;
        io::copy(&mut entry, &mut file)?;
    }

    Ok(())
}

/// A member path may not be absolute and may not contain a `..` segment,
/// under either separator convention.
fn member_path_is_unsafe(name: &str) -> bool {
    if name.starts_with('/') || name.starts_with('\\') || Path::new(name).is_absolute() {
        return true;
    }
    name.split(['/', '\\']).any(|segment| segment == "..")
}
