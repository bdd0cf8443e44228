// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::config::AccessConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The only resource type guarded here.
pub const USERS_RESOURCE: &str = "users";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability oracle consulted by the route middleware.
pub trait CapabilityCheck: Send + Sync {
    fn allows(&self, role: &str, minimum_level: u8, resource: &str, action: Action) -> bool;
}

#[derive(Debug, Clone)]
struct RoleGrant {
    level: u8,
    users: BTreeSet<Action>,
}

/// Role grants loaded from the `access` config section.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    roles: HashMap<String, RoleGrant>,
}

impl AccessPolicy {
    pub fn from_config(config: &AccessConfig) -> Self {
        let roles = config
            .roles
            .iter()
            .map(|(name, grant)| {
                (
                    name.clone(),
                    RoleGrant {
                        level: grant.level,
                        users: grant.users.iter().copied().collect(),
                    },
                )
            })
            .collect();
        Self { roles }
    }
}

impl CapabilityCheck for AccessPolicy {
    fn allows(&self, role: &str, minimum_level: u8, resource: &str, action: Action) -> bool {
        if resource != USERS_RESOURCE {
            return false;
        }
        match self.roles.get(role) {
            Some(grant) => grant.level >= minimum_level && grant.users.contains(&action),
            None => false,
        }
    }
}
