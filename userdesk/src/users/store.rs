// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::types::{StoreError, UsersData, YamlUsersFile};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
use super::types::UserRecord;
#[cfg(test)]
use std::sync::{Arc, RwLock};

pub trait UserStore: Send + Sync {
    fn load(&self) -> Result<UsersData, StoreError>;
    fn save(&self, users: &UsersData) -> Result<(), StoreError>;
}

pub struct FileUserStore {
    users_file: PathBuf,
}

impl FileUserStore {
    pub fn new(users_file: PathBuf) -> Result<Self, StoreError> {
        if users_file.as_os_str().is_empty() {
            return Err(StoreError::FileError("Users file path is empty".to_string()));
        }

        Ok(Self { users_file })
    }

    fn parse_users(content: &str) -> Result<UsersData, StoreError> {
        if content.trim().is_empty() {
            return Ok(UsersData::from_records(Vec::new(), None));
        }
        let file: YamlUsersFile = serde_yaml::from_str(content)
            .map_err(|e| StoreError::ParseError(format!("Failed to parse users file: {}", e)))?;

        let mut seen = std::collections::HashSet::new();
        for record in &file.users {
            if record.id <= 0 {
                return Err(StoreError::ParseError(format!(
                    "User id must be positive, got {}",
                    record.id
                )));
            }
            if !seen.insert(record.id) {
                return Err(StoreError::ParseError(format!(
                    "Duplicate user id {} in users file",
                    record.id
                )));
            }
        }

        Ok(UsersData::from_records(file.users, file.next_id))
    }

    fn serialize_users(users_data: &UsersData) -> Result<String, StoreError> {
        let file = YamlUsersFile {
            next_id: Some(users_data.next_id),
            users: users_data.records.values().cloned().collect(),
        };

        serde_yaml::to_string(&file)
            .map_err(|e| StoreError::ParseError(format!("Failed to serialize users: {}", e)))
    }

    fn write_users_file(&self, content: &str) -> Result<(), StoreError> {
        let parent = self.users_file.parent().ok_or_else(|| {
            StoreError::FileError("Users file path has no parent directory".to_string())
        })?;
        let file_name = self
            .users_file
            .file_name()
            .ok_or_else(|| StoreError::FileError("Users file path has no file name".to_string()))?;
        let (mut file, temp_path) = create_temp_file(parent, file_name)?;

        if let Err(err) = file.write_all(content.as_bytes()) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::FileError(format!(
                "Failed to write users temp file: {}",
                err
            )));
        }
        if let Err(err) = file.sync_all() {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::FileError(format!(
                "Failed to sync users temp file: {}",
                err
            )));
        }

        if let Err(err) = std::fs::rename(&temp_path, &self.users_file) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StoreError::FileError(format!(
                "Failed to replace users file: {}",
                err
            )));
        }

        #[cfg(unix)]
        {
            if let Err(err) = sync_parent_dir(parent) {
                log::warn!("Users directory sync failed: {}", err);
            }
        }

        Ok(())
    }
}

fn create_temp_file(
    dir: &Path,
    file_name: &std::ffi::OsStr,
) -> Result<(std::fs::File, PathBuf), StoreError> {
    use std::fs::OpenOptions;
    const MAX_ATTEMPTS: u32 = 100;
    let base = file_name.to_string_lossy();
    for attempt in 0..MAX_ATTEMPTS {
        let candidate = dir.join(format!(".{}.tmp.{}.{}", base, std::process::id(), attempt));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((file, candidate)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(StoreError::FileError(format!(
                    "Failed to create temp users file: {}",
                    err
                )));
            }
        }
    }
    Err(StoreError::FileError(
        "Failed to create temp users file after repeated attempts".to_string(),
    ))
}

#[cfg(unix)]
fn sync_parent_dir(parent: &Path) -> Result<(), StoreError> {
    let dir = std::fs::File::open(parent).map_err(|err| {
        StoreError::FileError(format!("Failed to open users directory for sync: {}", err))
    })?;
    dir.sync_all()
        .map_err(|err| StoreError::FileError(format!("Failed to sync users directory: {}", err)))
}

impl UserStore for FileUserStore {
    fn load(&self) -> Result<UsersData, StoreError> {
        match std::fs::read_to_string(&self.users_file) {
            Ok(content) => Self::parse_users(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "Users file {} does not exist yet; starting with no users",
                    self.users_file.display()
                );
                Ok(UsersData::from_records(Vec::new(), None))
            }
            Err(err) => Err(StoreError::FileError(format!(
                "Failed to read users file: {}",
                err
            ))),
        }
    }

    fn save(&self, users: &UsersData) -> Result<(), StoreError> {
        let content = Self::serialize_users(users)?;
        self.write_users_file(&content)
    }
}

#[cfg(test)]
pub struct MemoryUserStore {
    users: Arc<RwLock<UsersData>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl MemoryUserStore {
    pub fn new(initial: UsersData) -> Self {
        Self {
            users: Arc::new(RwLock::new(initial)),
            fail_saves: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn from_users(users: Vec<UserRecord>) -> Self {
        Self::new(UsersData::from_records(users, None))
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> UsersData {
        match self.users.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
impl UserStore for MemoryUserStore {
    fn load(&self) -> Result<UsersData, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&self, users: &UsersData) -> Result<(), StoreError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::FileError("simulated save failure".to_string()));
        }
        match self.users.write() {
            Ok(mut guard) => {
                *guard = users.clone();
                Ok(())
            }
            Err(poisoned) => {
                log::error!("MemoryUserStore lock poisoned on write; recovering");
                let mut guard = poisoned.into_inner();
                *guard = users.clone();
                Ok(())
            }
        }
    }
}
