// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::Argon2Params;
use crate::security::normalize_email;
use crate::users::{Actor, PasswordError, UserDirectory, hash_password, verify_password};

/// Checks email and password against the user directory.
#[derive(Clone)]
pub struct Authenticator {
    directory: UserDirectory,
    // Verified against when the email is unknown so both paths cost the same.
    dummy_stored_hash: String,
}

impl Authenticator {
    pub fn new(directory: UserDirectory, params: &Argon2Params) -> Result<Self, PasswordError> {
        let dummy_stored_hash = hash_password("dummy-password", params)?;
        Ok(Self {
            directory,
            dummy_stored_hash,
        })
    }

    /// Returns the actor when the credentials match a stored user.
    pub async fn verify(&self, email: &str, password: &str) -> Option<Actor> {
        let email = normalize_email(email);
        let record = match self.directory.find_by_email(&email) {
            Ok(record) => record,
            Err(err) => {
                log::error!("User lookup failed during sign-in: {}", err);
                return None;
            }
        };

        let stored_hash = record
            .as_ref()
            .map(|record| record.password_hash.clone())
            .unwrap_or_else(|| self.dummy_stored_hash.clone());
        let password = password.to_string();
        let valid = match tokio::task::spawn_blocking(move || {
            verify_password(&password, &stored_hash)
        })
        .await
        {
            Ok(Ok(valid)) => valid,
            Ok(Err(err)) => {
                log::warn!("Stored password hash could not be verified: {}", err);
                false
            }
            Err(err) => {
                log::error!("Password verification task failed: {}", err);
                false
            }
        };

        match record {
            Some(record) if valid => Some(Actor::from(&record)),
            _ => None,
        }
    }
}
