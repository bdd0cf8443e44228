// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type UserId = i64;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

/// The authenticated user a request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: UserId,
    pub email: String,
    pub role: String,
}

impl From<&UserRecord> for Actor {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            role: record.role.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub role: String,
    pub password_hash: String,
}

/// Fields an edit may change. The password hash is never part of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateEmail(String),
    Unavailable(String),
    FileError(String),
    ParseError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DuplicateEmail(email) => {
                write!(f, "A user with email {} already exists", email)
            }
            StoreError::Unavailable(what) => write!(f, "{} is unavailable", what),
            StoreError::FileError(msg) => write!(f, "File error: {}", msg),
            StoreError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// Mutation commands for the background task
#[derive(Debug)]
pub enum UserMutation {
    Insert { user: NewUser },
    InsertFirst { user: NewUser },
    Update { id: UserId, update: UserUpdate },
    Delete { id: UserId },
}

#[derive(Debug, PartialEq, Eq)]
pub enum UserMutationResult {
    Inserted(UserId),
    /// `InsertFirst` found existing users and did nothing.
    NotInserted,
    /// Rows touched by an update or delete; zero when the id no longer exists.
    Affected(usize),
}

/// In-memory table: records keyed by id plus the next id to hand out.
/// Ids are never reused, even after the highest record is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsersData {
    pub next_id: UserId,
    pub records: BTreeMap<UserId, UserRecord>,
}

impl UsersData {
    pub fn from_records(records: Vec<UserRecord>, next_id: Option<UserId>) -> Self {
        let highest = records.iter().map(|record| record.id).max().unwrap_or(0);
        let next_id = next_id.unwrap_or(0).max(highest + 1);
        Self {
            next_id,
            records: records
                .into_iter()
                .map(|record| (record.id, record))
                .collect(),
        }
    }

    pub fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.records
            .values()
            .any(|record| Some(record.id) != except && record.email.eq_ignore_ascii_case(email))
    }
}

// Structure matching the YAML file format
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct YamlUsersFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<UserId>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}
