//! lock: advisory lock of one bank directory.
//!
//! Opt-in via PersistConfig::lock_banks. The lock file is `<bank_path>/LOCK`
//! (fs2, cross-platform):
//! - Exclusive: the writer of frames + metadata.
//! - Shared: readers serving the bank.
//!
//! A busy lock is reported as `None` by the `try_*` constructors; the
//! blocking constructors wait. Released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub struct BankLock {
    file: File,
    bank_path: PathBuf,
    mode: LockMode,
}

impl BankLock {
    /// Block until the bank can be read.
    pub fn shared(bank_path: &Path) -> Result<Self> {
        Self::acquire(bank_path, LockMode::Shared)
    }

    /// Block until the bank can be written.
    pub fn exclusive(bank_path: &Path) -> Result<Self> {
        Self::acquire(bank_path, LockMode::Exclusive)
    }

    pub fn acquire(bank_path: &Path, mode: LockMode) -> Result<Self> {
        let file = open_lock_file(bank_path)?;
        let res = match mode {
            LockMode::Shared => FileExt::lock_shared(&file),
            LockMode::Exclusive => FileExt::lock_exclusive(&file),
        };
        res.with_context(|| format!("{:?} lock on bank {}", mode, bank_path.display()))?;
        Ok(Self {
            file,
            bank_path: bank_path.to_path_buf(),
            mode,
        })
    }

    /// Non-blocking variant: Ok(None) while another holder keeps the bank.
    pub fn try_acquire(bank_path: &Path, mode: LockMode) -> Result<Option<Self>> {
        let file = open_lock_file(bank_path)?;
        let res = match mode {
            LockMode::Shared => FileExt::try_lock_shared(&file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
        };
        match res {
            Ok(()) => Ok(Some(Self {
                file,
                bank_path: bank_path.to_path_buf(),
                mode,
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("{:?} lock on bank {}", mode, bank_path.display()))),
        }
    }

    /// Try first, then wait (logging once) if the bank is busy.
    pub fn acquire_or_wait(bank_path: &Path, mode: LockMode) -> Result<Self> {
        if let Some(lock) = Self::try_acquire(bank_path, mode)? {
            return Ok(lock);
        }
        log::info!("bank {} is busy, waiting for {:?} lock", bank_path.display(), mode);
        Self::acquire(bank_path, mode)
    }

    pub fn bank_path(&self) -> &Path {
        &self.bank_path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for BankLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(bank_path: &Path) -> Result<File> {
    let path = bank_path.join(LOCK_FILE);
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_excludes_other_holders() {
        let dir = tempfile::tempdir().unwrap();
        let w = BankLock::exclusive(dir.path()).unwrap();
        assert_eq!(w.mode(), LockMode::Exclusive);
        assert_eq!(w.bank_path(), dir.path());
        assert!(dir.path().join(LOCK_FILE).is_file());

        assert!(BankLock::try_acquire(dir.path(), LockMode::Exclusive)
            .unwrap()
            .is_none());
        assert!(BankLock::try_acquire(dir.path(), LockMode::Shared)
            .unwrap()
            .is_none());

        drop(w);
        assert!(BankLock::try_acquire(dir.path(), LockMode::Exclusive)
            .unwrap()
            .is_some());
    }

    #[test]
    fn readers_share_the_bank() {
        let dir = tempfile::tempdir().unwrap();
        let _a = BankLock::shared(dir.path()).unwrap();
        let b = BankLock::acquire_or_wait(dir.path(), LockMode::Shared).unwrap();
        assert_eq!(b.mode(), LockMode::Shared);
    }

    #[test]
    fn missing_bank_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BankLock::try_acquire(&dir.path().join("absent"), LockMode::Shared).is_err());
    }
}
