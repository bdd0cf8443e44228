// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use crate::access::Action;
use crate::config::{
    AccessConfig, AppConfig, Argon2Params, LoggingConfig, RoleGrantConfig, ServerConfig,
    SessionConfig, UsersConfig, ValidatedConfig,
};
use std::collections::BTreeMap;

/// Cheap hashing so tests that create users stay fast.
pub const TEST_ARGON2_PARAMS: Argon2Params = Argon2Params {
    memory_kib: 1024,
    iterations: 1,
    parallelism: 1,
    output_len: 32,
    salt_len: 16,
};

#[derive(Debug, Clone)]
pub struct TestConfigBuilder {
    config: ValidatedConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ValidatedConfig {
                server: ServerConfig {
                    host: "127.0.0.1".to_string(),
                    port: 7080,
                    workers: 1,
                },
                app: AppConfig {
                    name: "Test App".to_string(),
                    description: "Test Description".to_string(),
                },
                logging: LoggingConfig {
                    level: "info".to_string(),
                },
                users: UsersConfig::default(),
                access: build_test_access_config(),
                sessions: SessionConfig::default(),
                password: TEST_ARGON2_PARAMS,
            },
        }
    }

    pub fn with_users_base(mut self, base: &str) -> Self {
        self.config.users.base = base.to_string();
        self
    }

    pub fn with_role(mut self, name: &str, level: u8, users: &[Action]) -> Self {
        self.config.access.roles.insert(
            name.to_string(),
            RoleGrantConfig {
                level,
                users: users.to_vec(),
            },
        );
        self
    }

    pub fn with_session_ttl(mut self, ttl_seconds: u64) -> Self {
        self.config.sessions.ttl_seconds = ttl_seconds;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.config.sessions.max_sessions = max_sessions;
        self
    }

    pub fn build(self) -> ValidatedConfig {
        self.config
    }
}

pub fn test_config() -> ValidatedConfig {
    TestConfigBuilder::new().build()
}

fn build_test_access_config() -> AccessConfig {
    let mut roles = BTreeMap::new();
    roles.insert(
        "admin".to_string(),
        RoleGrantConfig {
            level: 3,
            users: Action::ALL.to_vec(),
        },
    );
    roles.insert(
        "editor".to_string(),
        RoleGrantConfig {
            level: 2,
            users: vec![Action::Read, Action::Update],
        },
    );
    roles.insert(
        "viewer".to_string(),
        RoleGrantConfig {
            level: 1,
            users: vec![Action::Read],
        },
    );
    AccessConfig { roles }
}
