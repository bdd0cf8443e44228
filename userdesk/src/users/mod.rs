// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod coordinator;
mod directory;
mod error;
mod forms;
mod password;
mod routes;
pub mod store;
mod types;

pub use coordinator::{DeleteOutcome, DeleteSelection, EditSelection, UserCoordinator};
pub use directory::UserDirectory;
pub use error::{ErrorPayload, UserRouteError};
pub use forms::{
    EMAIL_FIELD, FormField, FormSchema, PASSWORD_FIELD, ROLE_FIELD, SelectOption, UserAddForm,
    UserEditForm, UserFormDto, from_form_values, to_form_values, user_form_schema,
};
pub use password::{PasswordError, hash_password, verify_password};
pub use routes::{MINIMUM_LEVEL, configure};
pub use store::{FileUserStore, UserStore};
pub use types::{
    Actor, NewUser, StoreError, UserId, UserMutation, UserMutationResult, UserRecord, UserUpdate,
    UsersData, YamlUsersFile,
};
