// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Two-step edit and delete flows.
//!
//! A selection GET stages the chosen user id in the session; the confirming
//! POST acts only on whatever id is staged there. Request bodies never name
//! the target.

use super::directory::UserDirectory;
use super::error::UserRouteError;
use super::forms::{UserAddForm, UserEditForm, UserFormDto};
use super::password::hash_password;
use super::types::{Actor, NewUser, UserId, UserRecord, UserUpdate};
use crate::access::Action;
use crate::config::ValidatedConfig;
use crate::security::{normalize_email, normalize_role, validate_email_field, validate_password_field};
use crate::session::{PendingAction, PendingCommand, SessionStore};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EditSelection {
    pub target: UserRecord,
    pub form: UserFormDto,
    pub command: PendingCommand,
}

#[derive(Debug, Clone)]
pub struct DeleteSelection {
    pub target: UserRecord,
    /// The actor picked their own account.
    pub current: bool,
    /// Warning shown when `current` is set.
    pub message: Option<String>,
    pub command: PendingCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(UserId),
    /// The staged target was the actor; nothing was deleted and the slot stays staged.
    SelfGuarded(UserId),
}

#[derive(Clone)]
pub struct UserCoordinator {
    directory: UserDirectory,
    sessions: SessionStore,
    config: Arc<ValidatedConfig>,
}

impl UserCoordinator {
    pub fn new(directory: UserDirectory, sessions: SessionStore, config: Arc<ValidatedConfig>) -> Self {
        Self {
            directory,
            sessions,
            config,
        }
    }

    pub fn list(&self) -> Result<Vec<UserRecord>, UserRouteError> {
        Ok(self.directory.list()?)
    }

    pub fn setup_available(&self) -> Result<bool, UserRouteError> {
        Ok(self.directory.is_empty()?)
    }

    pub async fn select_for_edit(
        &self,
        session_id: &str,
        raw_id: &str,
    ) -> Result<EditSelection, UserRouteError> {
        let target = self.find_target(raw_id, &self.config.users.messages.errors.edit)?;
        let command = self
            .sessions
            .stage(session_id, PendingAction::Edit, target.id)
            .await?;
        log::info!("Staged user {} for edit", target.id);
        Ok(EditSelection {
            form: UserFormDto::from(&target),
            target,
            command,
        })
    }

    pub async fn apply_edit(
        &self,
        session_id: &str,
        form: &UserEditForm,
    ) -> Result<UserId, UserRouteError> {
        let command = self.staged(session_id, PendingAction::Edit).await?;
        let safe = self.config.users.edit_selection_path(command.target_id);
        let update = self.validated_update(UserFormDto::from(form), &safe)?;

        let affected = self.directory.update(command.target_id, update).await?;
        self.sessions.clear_if(session_id, &command).await?;
        if affected == 0 {
            log::warn!(
                "Staged edit target {} no longer exists; nothing updated",
                command.target_id
            );
            return Err(self.not_found(&self.config.users.messages.errors.edit));
        }

        log::info!("Updated user {}", command.target_id);
        Ok(command.target_id)
    }

    pub async fn select_for_delete(
        &self,
        session_id: &str,
        actor: &Actor,
        raw_id: &str,
    ) -> Result<DeleteSelection, UserRouteError> {
        let target = self.find_target(raw_id, &self.config.users.messages.errors.delete)?;
        let command = self
            .sessions
            .stage(session_id, PendingAction::Delete, target.id)
            .await?;
        let current = target.id == actor.id;
        let message = current.then(|| self.config.users.messages.errors.current.clone());
        log::info!("Staged user {} for delete", target.id);
        Ok(DeleteSelection {
            target,
            current,
            message,
            command,
        })
    }

    pub async fn confirm_delete(
        &self,
        session_id: &str,
        actor: &Actor,
    ) -> Result<DeleteOutcome, UserRouteError> {
        let command = self.staged(session_id, PendingAction::Delete).await?;
        if command.target_id == actor.id {
            log::info!("User {} tried to delete their own account; skipped", actor.id);
            return Ok(DeleteOutcome::SelfGuarded(command.target_id));
        }

        let affected = self.directory.delete(command.target_id).await?;
        self.sessions.clear_if(session_id, &command).await?;
        if affected == 0 {
            log::warn!(
                "Staged delete target {} no longer exists; nothing deleted",
                command.target_id
            );
            return Err(self.not_found(&self.config.users.messages.errors.delete));
        }

        log::info!("User {} deleted user {}", actor.id, command.target_id);
        Ok(DeleteOutcome::Deleted(command.target_id))
    }

    pub async fn create(&self, form: UserAddForm) -> Result<UserId, UserRouteError> {
        let safe = self.config.users.add_path();
        let new_user = self.new_user(form, &safe).await?;
        let id = self.directory.insert(new_user).await?;
        log::info!("Created user {}", id);
        Ok(id)
    }

    /// Create the first account with the managing role. Refused once any user exists.
    pub async fn create_first(&self, mut form: UserAddForm) -> Result<UserId, UserRouteError> {
        let safe = self.config.users.setup_path.clone();
        let closed = || UserRouteError::Forbidden {
            action: Action::Create,
            safe: self.config.users.list_path(),
        };
        if !self.directory.is_empty()? {
            return Err(closed());
        }
        let Some(role) = self.config.manager_role() else {
            return Err(UserRouteError::Invalid {
                message: "No role is configured to manage users.".to_string(),
                safe,
            });
        };
        form.role = role.to_string();

        let new_user = self.new_user(form, &safe).await?;
        match self.directory.insert_first(new_user).await? {
            Some(id) => {
                log::info!("Created first user {} during setup", id);
                Ok(id)
            }
            None => Err(closed()),
        }
    }

    async fn staged(
        &self,
        session_id: &str,
        action: PendingAction,
    ) -> Result<PendingCommand, UserRouteError> {
        match self.sessions.pending(session_id, action).await? {
            Some(command) => Ok(command),
            None => {
                log::info!("No {} target staged in session ({})", action, action.slot_name());
                Err(self.not_found(&self.config.users.messages.errors.missing))
            }
        }
    }

    fn find_target(&self, raw_id: &str, message: &str) -> Result<UserRecord, UserRouteError> {
        let id = match raw_id.trim().parse::<UserId>() {
            Ok(id) if id > 0 => id,
            _ => return Err(self.not_found(message)),
        };
        self.directory
            .find(id)?
            .ok_or_else(|| self.not_found(message))
    }

    fn validated_update(&self, dto: UserFormDto, safe: &str) -> Result<UserUpdate, UserRouteError> {
        let invalid = |message: String| UserRouteError::Invalid {
            message,
            safe: safe.to_string(),
        };
        validate_email_field(&dto.email).map_err(invalid)?;
        let role = normalize_role(&dto.role).map_err(|err| invalid(err.to_string()))?;
        if !self.config.has_role(&role) {
            return Err(invalid(format!("Role '{}' is not configured", role)));
        }
        Ok(UserUpdate {
            email: normalize_email(&dto.email),
            role,
        })
    }

    async fn new_user(&self, form: UserAddForm, safe: &str) -> Result<NewUser, UserRouteError> {
        let UserUpdate { email, role } = self.validated_update(
            UserFormDto {
                email: form.email,
                role: form.role,
            },
            safe,
        )?;
        validate_password_field(&form.password).map_err(|message| UserRouteError::Invalid {
            message,
            safe: safe.to_string(),
        })?;

        let params = self.config.password.clone();
        let password = form.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, &params))
            .await
            .map_err(|err| {
                log::error!("Password hashing task failed: {}", err);
                UserRouteError::from(super::types::StoreError::Unavailable(
                    "Password hashing".to_string(),
                ))
            })?
            .map_err(|err| {
                log::error!("Password hashing failed: {}", err);
                UserRouteError::from(super::types::StoreError::Unavailable(
                    "Password hashing".to_string(),
                ))
            })?;

        Ok(NewUser {
            email,
            role,
            password_hash,
        })
    }

    fn not_found(&self, message: &str) -> UserRouteError {
        UserRouteError::NotFound {
            message: message.to_string(),
            safe: self.config.users.list_path(),
        }
    }
}
