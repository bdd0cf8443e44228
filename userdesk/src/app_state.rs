// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use std::sync::Arc;

use crate::access::{AccessPolicy, CapabilityCheck};
use crate::config::ValidatedConfig;
use crate::error_page::ErrorRenderer;
use crate::session::{SessionRequest, SessionStore};
use crate::templates::{MiniJinjaEngine, PageChrome, TemplateEngine};
use actix_web::HttpRequest;

pub struct AppState {
    pub config: Arc<ValidatedConfig>,
    pub templates: Arc<dyn TemplateEngine>,
    pub error_renderer: ErrorRenderer,
    pub sessions: SessionStore,
    pub access: Arc<dyn CapabilityCheck>,
}

impl AppState {
    pub fn new(config: Arc<ValidatedConfig>, sessions: SessionStore) -> Self {
        Self {
            templates: Arc::new(MiniJinjaEngine::new()),
            error_renderer: ErrorRenderer::new(config.app.name.clone()),
            access: Arc::new(AccessPolicy::from_config(&config.access)),
            sessions,
            config,
        }
    }

    /// Layout fields for the page answering `req`.
    pub fn chrome(&self, req: &HttpRequest) -> PageChrome {
        PageChrome::new(
            &self.config.app.name,
            req.actor(),
            &self.config.users.list_path(),
            req.csrf_token(),
        )
    }
}
