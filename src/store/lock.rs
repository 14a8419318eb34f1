use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

static LOCK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Exclusive lock file guarding one partition's read-modify-write cycle.
///
/// The file holds the owner's token. On drop it is removed only while it
/// still holds that token, so a guard whose lock was taken over as stale
/// never releases the new owner's lock.
#[derive(Debug)]
pub struct PartitionLock {
    path: PathBuf,
    token: String,
}

#[derive(Debug)]
pub enum LockAttempt {
    Acquired(PartitionLock),
    Held { age: Duration },
}

impl PartitionLock {
    pub fn acquire(path: &Path, stale_after: Duration) -> io::Result<LockAttempt> {
        let token = owner_token();
        match Self::create(path, &token) {
            Ok(lock) => return Ok(LockAttempt::Acquired(lock)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }

        let Some(observed) = read_owner(path)? else {
            // Released between our create attempt and the read.
            return match Self::create(path, &token) {
                Ok(lock) => Ok(LockAttempt::Acquired(lock)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    Ok(LockAttempt::Held { age: Duration::ZERO })
                }
                Err(err) => Err(err),
            };
        };
        let age = lock_age(path)?;
        if age < stale_after {
            return Ok(LockAttempt::Held { age });
        }

        warn!(
            path = %path.display(),
            owner = %observed,
            age = %humantime::format_duration(truncate_to_secs(age)),
            "обнаружена брошенная блокировка, она будет перехвачена"
        );
        Self::take_over(path, token, &observed, stale_after)
    }

    /// Replaces a stale lock by renaming a fresh one over it, then reads the
    /// file back: only the taker whose token is in place holds the lock.
    fn take_over(
        path: &Path,
        token: String,
        observed: &str,
        stale_after: Duration,
    ) -> io::Result<LockAttempt> {
        let tmp = takeover_path(path, &token);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        if let Err(err) = write_owner(&mut file, &token) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        drop(file);

        let still_stale = read_owner(path)?.as_deref() == Some(observed)
            && lock_age(path)? >= stale_after;
        if !still_stale {
            let _ = fs::remove_file(&tmp);
            return Ok(LockAttempt::Held { age: Duration::ZERO });
        }
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }

        if read_owner(path)?.as_deref() == Some(token.as_str()) {
            Ok(LockAttempt::Acquired(Self {
                path: path.to_path_buf(),
                token,
            }))
        } else {
            Ok(LockAttempt::Held { age: Duration::ZERO })
        }
    }

    fn create(path: &Path, token: &str) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        Self::finish_create(path, file, token)
    }

    /// Writes the owner token into a just-created lock file. A failed write
    /// removes the file, since no guard exists yet to release it.
    fn finish_create(path: &Path, mut file: impl Write, token: &str) -> io::Result<Self> {
        if let Err(err) = write_owner(&mut file, token) {
            drop(file);
            let _ = fs::remove_file(path);
            return Err(err);
        }
        Ok(Self {
            path: path.to_path_buf(),
            token: token.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PartitionLock {
    fn drop(&mut self) {
        match read_owner(&self.path) {
            Ok(Some(owner)) if owner == self.token => {
                if let Err(err) = fs::remove_file(&self.path) {
                    warn!(path = %self.path.display(), error = %err, "не удалось снять блокировку");
                }
            }
            Ok(owner) => warn!(
                path = %self.path.display(),
                owner = owner.as_deref().unwrap_or("-"),
                "блокировка перехвачена другим процессом, файл оставлен"
            ),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "не удалось проверить блокировку")
            }
        }
    }
}

/// `<pid>-<unix nanos>-<seq>`: unique across processes and across guards
/// taken by one process.
fn owner_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = LOCK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{nanos}-{seq}", std::process::id())
}

fn takeover_path(path: &Path, token: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{token}.tmp"))
}

fn write_owner(file: &mut impl Write, token: &str) -> io::Result<()> {
    writeln!(file, "{token}")?;
    file.flush()
}

fn read_owner(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.trim().to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn lock_age(path: &Path) -> io::Result<Duration> {
    let modified = match fs::metadata(path) {
        Ok(meta) => meta.modified()?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Duration::MAX),
        Err(err) => return Err(err),
    };
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

fn truncate_to_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}
