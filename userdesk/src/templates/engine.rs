// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use minijinja::{Environment, Value, default_auto_escape_callback};

pub trait TemplateEngine: Send + Sync {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error>;
}

pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(default_auto_escape_callback);
        env.set_loader(embedded_template_loader);
        Self { env }
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, template_name: &str, context: Value) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(template_name)?;
        tmpl.render(context)
    }
}

/// Template loader for minijinja that loads from embedded sources
fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let template_content = match name {
        "layout.html" => Some(include_str!("layout.html")),
        "error.html" => Some(include_str!("error.html")),

        // User management
        "users/list.html" => Some(include_str!("../users/templates/list.html")),
        "users/form.html" => Some(include_str!("../users/templates/form.html")),
        "users/delete.html" => Some(include_str!("../users/templates/delete.html")),
        "users/setup.html" => Some(include_str!("../users/templates/setup.html")),
        "users/_fields.html" => Some(include_str!("../users/templates/_fields.html")),

        "login/login_page.html" => Some(include_str!("../login/templates/login_page.html")),

        _ => None,
    };

    Ok(template_content.map(|s| s.to_string()))
}
