// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::users::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The two multi-step actions that carry a target between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    Edit,
    Delete,
}

impl PendingAction {
    /// Name of the per-session slot holding this action's target.
    pub fn slot_name(self) -> &'static str {
        match self {
            PendingAction::Edit => "userEditId",
            PendingAction::Delete => "deleteUserId",
        }
    }
}

impl std::fmt::Display for PendingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingAction::Edit => write!(f, "edit"),
            PendingAction::Delete => write!(f, "delete"),
        }
    }
}

/// A target chosen on a selection page, waiting for its confirming POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    pub action: PendingAction,
    pub target_id: UserId,
    pub issued_at: DateTime<Utc>,
}

impl PendingCommand {
    pub fn new(action: PendingAction, target_id: UserId) -> Self {
        Self {
            action,
            target_id,
            issued_at: Utc::now(),
        }
    }
}
