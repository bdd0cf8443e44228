// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::access::Action;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    LoadError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::LoadError(msg) => write!(f, "Configuration load error: {}", msg),
            ConfigError::ValidationError(msg) => {
                write!(f, "Configuration validation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub users: UsersConfig,
    pub access: AccessConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub password: Argon2ParamsConfig,
}

#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub logging: LoggingConfig,
    pub users: UsersConfig,
    pub access: AccessConfig,
    pub sessions: SessionConfig,
    pub password: Argon2Params,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl ServerConfig {
    pub fn address_tuple(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

/// Route layout and user-facing copy for the user management pages.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UsersConfig {
    #[serde(default = "default_users_base")]
    pub base: String,
    #[serde(default = "default_setup_path")]
    pub setup_path: String,
    #[serde(default)]
    pub actions: UserActionsConfig,
    #[serde(default)]
    pub messages: UserMessagesConfig,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            base: default_users_base(),
            setup_path: default_setup_path(),
            actions: UserActionsConfig::default(),
            messages: UserMessagesConfig::default(),
        }
    }
}

impl UsersConfig {
    /// `/users`
    pub fn list_path(&self) -> String {
        format!("/{}", self.base)
    }

    /// `/users/add`
    pub fn add_path(&self) -> String {
        format!("/{}/{}", self.base, self.actions.add)
    }

    /// `/users/edit`
    pub fn edit_path(&self) -> String {
        format!("/{}/{}", self.base, self.actions.edit)
    }

    /// `/users/delete`
    pub fn delete_path(&self) -> String {
        format!("/{}/{}", self.base, self.actions.delete)
    }

    /// `/users/{id}/edit`, as an actix route pattern.
    pub fn edit_selection_pattern(&self) -> String {
        format!("/{}/{{id}}/{}", self.base, self.actions.edit)
    }

    /// `/users/{id}/delete`, as an actix route pattern.
    pub fn delete_selection_pattern(&self) -> String {
        format!("/{}/{{id}}/{}", self.base, self.actions.delete)
    }

    pub fn edit_selection_path(&self, id: i64) -> String {
        format!("/{}/{}/{}", self.base, id, self.actions.edit)
    }

    pub fn delete_selection_path(&self, id: i64) -> String {
        format!("/{}/{}/{}", self.base, id, self.actions.delete)
    }
}

fn default_users_base() -> String {
    "users".to_string()
}

fn default_setup_path() -> String {
    "/users/setup".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserActionsConfig {
    #[serde(default = "default_action_add")]
    pub add: String,
    #[serde(default = "default_action_edit")]
    pub edit: String,
    #[serde(default = "default_action_delete")]
    pub delete: String,
}

impl Default for UserActionsConfig {
    fn default() -> Self {
        Self {
            add: default_action_add(),
            edit: default_action_edit(),
            delete: default_action_delete(),
        }
    }
}

fn default_action_add() -> String {
    "add".to_string()
}

fn default_action_edit() -> String {
    "edit".to_string()
}

fn default_action_delete() -> String {
    "delete".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UserMessagesConfig {
    #[serde(default)]
    pub errors: UserErrorMessages,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UserErrorMessages {
    #[serde(default = "default_error_edit")]
    pub edit: String,
    #[serde(default = "default_error_delete")]
    pub delete: String,
    #[serde(default = "default_error_current")]
    pub current: String,
    #[serde(default = "default_error_missing")]
    pub missing: String,
}

impl Default for UserErrorMessages {
    fn default() -> Self {
        Self {
            edit: default_error_edit(),
            delete: default_error_delete(),
            current: default_error_current(),
            missing: default_error_missing(),
        }
    }
}

fn default_error_edit() -> String {
    "The user you are trying to edit does not exist.".to_string()
}

fn default_error_delete() -> String {
    "The user you are trying to delete does not exist.".to_string()
}

fn default_error_current() -> String {
    "You cannot delete the account you are signed in with.".to_string()
}

fn default_error_missing() -> String {
    "No user was selected for this action.".to_string()
}

/// Role grants for the `users` resource, keyed by role name.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AccessConfig {
    pub roles: BTreeMap<String, RoleGrantConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RoleGrantConfig {
    #[serde(default = "default_role_level")]
    pub level: u8,
    #[serde(default)]
    pub users: Vec<Action>,
}

fn default_role_level() -> u8 {
    1
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_session_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie_name(),
            ttl_seconds: default_session_ttl_seconds(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_session_cookie_name() -> String {
    "userdesk_session".to_string()
}

fn default_session_ttl_seconds() -> u64 {
    8 * 60 * 60
}

fn default_max_sessions() -> usize {
    10000
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Argon2ParamsConfig {
    pub memory_kib: Option<u32>,
    pub iterations: Option<u32>,
    pub parallelism: Option<u32>,
    pub output_len: Option<u32>,
    pub salt_len: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    pub output_len: u32,
    pub salt_len: u32,
}

pub const DEFAULT_ARGON2_PARAMS: Argon2Params = Argon2Params {
    memory_kib: 19456,
    iterations: 2,
    parallelism: 1,
    output_len: 32,
    salt_len: 16,
};

impl Argon2Params {
    fn resolve(config: &Argon2ParamsConfig, defaults: Argon2Params) -> Result<Self, ConfigError> {
        let resolved = Argon2Params {
            memory_kib: config.memory_kib.unwrap_or(defaults.memory_kib),
            iterations: config.iterations.unwrap_or(defaults.iterations),
            parallelism: config.parallelism.unwrap_or(defaults.parallelism),
            output_len: config.output_len.unwrap_or(defaults.output_len),
            salt_len: config.salt_len.unwrap_or(defaults.salt_len),
        };

        if resolved.memory_kib == 0
            || resolved.iterations == 0
            || resolved.parallelism == 0
            || resolved.output_len == 0
            || resolved.salt_len == 0
        {
            return Err(ConfigError::ValidationError(
                "Argon2id password params must be non-zero".to_string(),
            ));
        }

        if resolved.salt_len < 8 {
            return Err(ConfigError::ValidationError(format!(
                "Argon2id salt_len must be at least 8 bytes, got {}",
                resolved.salt_len
            )));
        }

        let output_len = usize::try_from(resolved.output_len).map_err(|_| {
            ConfigError::ValidationError(format!(
                "Argon2id output_len is too large: {}",
                resolved.output_len
            ))
        })?;

        if let Err(err) = argon2::Params::new(
            resolved.memory_kib,
            resolved.iterations,
            resolved.parallelism,
            Some(output_len),
        ) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid Argon2id params: {}",
                err
            )));
        }

        Ok(resolved)
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let config_path = root.join("config.yaml");
        let config_content = fs::read_to_string(&config_path).map_err(|e| {
            ConfigError::LoadError(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;
        Self::parse(&config_content).map_err(|e| match e {
            ConfigError::LoadError(msg) => ConfigError::LoadError(format!(
                "Failed to parse config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::LoadError(e.to_string()))
    }

    /// Loads and validates configuration at startup. If validation fails, the application should not start.
    pub fn load_and_validate(root: &Path) -> Result<ValidatedConfig, ConfigError> {
        Self::load(root)?.validate()
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        Self::validate_users(&self.users)?;
        Self::validate_access(&self.access)?;
        Self::validate_sessions(&self.sessions)?;
        Self::validate_logging(&self.logging)?;
        let password = Argon2Params::resolve(&self.password, DEFAULT_ARGON2_PARAMS)?;

        Ok(ValidatedConfig {
            server: self.server,
            app: self.app,
            logging: self.logging,
            users: self.users,
            access: self.access,
            sessions: self.sessions,
            password,
        })
    }

    fn validate_users(users: &UsersConfig) -> Result<(), ConfigError> {
        let segments = [
            ("users.base", &users.base),
            ("users.actions.add", &users.actions.add),
            ("users.actions.edit", &users.actions.edit),
            ("users.actions.delete", &users.actions.delete),
        ];
        for (label, value) in segments {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} must not be empty",
                    label
                )));
            }
            if value.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a single path segment, got '{}'",
                    label, value
                )));
            }
        }

        let actions = &users.actions;
        if actions.add == actions.edit
            || actions.add == actions.delete
            || actions.edit == actions.delete
        {
            return Err(ConfigError::ValidationError(
                "users.actions segments must be distinct".to_string(),
            ));
        }

        if !users.setup_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "users.setup_path must start with '/', got '{}'",
                users.setup_path
            )));
        }

        Ok(())
    }

    fn validate_access(access: &AccessConfig) -> Result<(), ConfigError> {
        if access.roles.is_empty() {
            return Err(ConfigError::ValidationError(
                "access.roles must define at least one role".to_string(),
            ));
        }
        for name in access.roles.keys() {
            crate::security::normalize_role(name)
                .map_err(|err| ConfigError::ValidationError(err.to_string()))?;
        }
        let has_manager = access
            .roles
            .values()
            .any(|grant| Action::ALL.iter().all(|action| grant.users.contains(action)));
        if !has_manager {
            log::warn!(
                "No role in access.roles holds every users capability; first-run setup will be unavailable"
            );
        }
        Ok(())
    }

    fn validate_sessions(sessions: &SessionConfig) -> Result<(), ConfigError> {
        if sessions.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sessions.cookie_name must not be empty".to_string(),
            ));
        }
        if sessions.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.ttl_seconds must be greater than 0".to_string(),
            ));
        }
        if sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        match logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "logging.level must be one of trace, debug, info, warn, error; got '{}'",
                other
            ))),
        }
    }
}

impl ValidatedConfig {
    /// Role names in display order.
    pub fn role_names(&self) -> Vec<String> {
        self.access.roles.keys().cloned().collect()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.access.roles.contains_key(role)
    }

    /// The first role that may perform every action on users; used for first-run setup.
    pub fn manager_role(&self) -> Option<&str> {
        self.access
            .roles
            .iter()
            .find(|(_, grant)| Action::ALL.iter().all(|action| grant.users.contains(action)))
            .map(|(name, _)| name.as_str())
    }
}
