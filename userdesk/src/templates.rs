// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use actix_web::HttpResponse;
use minijinja::Value;

mod context;
mod engine;

pub use context::{
    ErrorPageContext, LoginPageContext, PageChrome, SetupPageContext, UserDeleteContext,
    UserFormContext, UserListContext, UserRow,
};
pub use engine::{MiniJinjaEngine, TemplateEngine};

/// Render a minijinja template with the given context
pub fn render_minijinja_template(
    engine: &dyn TemplateEngine,
    template_name: &str,
    context: Value,
) -> Result<String, minijinja::Error> {
    engine.render(template_name, context)
}

/// Render a page into a 200 HTML response. Template failures become a 500.
pub fn render_page(
    engine: &dyn TemplateEngine,
    template_name: &str,
    context: Value,
) -> actix_web::Result<HttpResponse> {
    let html = render_minijinja_template(engine, template_name, context).map_err(|e| {
        log::error!("Failed to render template {}: {}", template_name, e);
        actix_web::error::ErrorInternalServerError("Template rendering failed")
    })?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .body(html))
}
