// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::app_state::AppState;
use crate::templates::{ErrorPageContext, TemplateEngine, render_minijinja_template};
use crate::users::{ErrorPayload, UserRouteError};
use actix_web::dev::ServiceResponse;
use actix_web::http::header::{CONTENT_TYPE, HeaderValue};
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::web::Data;
use actix_web::{HttpResponse, Result};

#[derive(Clone)]
pub struct ErrorRenderer {
    app_name: String,
}

impl ErrorRenderer {
    pub fn new(app_name: String) -> Self {
        Self { app_name }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn render(
        &self,
        payload: &ErrorPayload,
        template_engine: Option<&dyn TemplateEngine>,
    ) -> String {
        let context = ErrorPageContext::new(&self.app_name, payload.clone()).to_value();
        match template_engine {
            Some(engine) => match render_minijinja_template(engine, "error.html", context) {
                Ok(html) => html,
                Err(e) => {
                    log::error!("Failed to render error template: {}", e);
                    fallback_error_html(&self.app_name, payload)
                }
            },
            None => fallback_error_html(&self.app_name, payload),
        }
    }
}

/// Payload for a response: the attached `UserRouteError` when there is one,
/// otherwise the status line's reason.
pub fn payload_for<B>(res: &ServiceResponse<B>) -> ErrorPayload {
    if let Some(err) = res
        .response()
        .error()
        .and_then(|err| err.as_error::<UserRouteError>())
    {
        return err.to_payload();
    }
    let status = res.status();
    ErrorPayload {
        message: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        safe: "/".to_string(),
    }
}

/// Default handler for `ErrorHandlers`: replaces every 4xx/5xx body with the
/// error page. Pages a handler rendered itself (HTML, no attached error) pass through.
pub fn render_error_page<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let handler_rendered = res.response().error().is_none()
        && res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/html"));
    if handler_rendered {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }

    let payload = payload_for(&res);
    if payload.status >= 500
        && let Some(err) = res.response().error()
    {
        log::error!("Request to {} failed: {}", res.request().path(), err);
    }

    let (req, _) = res.into_parts();
    let state = req.app_data::<Data<AppState>>().cloned();
    let html = match state.as_ref() {
        Some(state) => state
            .error_renderer
            .render(&payload, Some(state.templates.as_ref())),
        None => fallback_error_html("Userdesk", &payload),
    };

    let status = actix_web::http::StatusCode::from_u16(payload.status)
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    let response = HttpResponse::build(status)
        .insert_header((CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8")))
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .insert_header(("Pragma", "no-cache"))
        .insert_header(("Expires", "0"))
        .body(html);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, response).map_into_right_body(),
    ))
}

fn fallback_error_html(app_name: &str, payload: &ErrorPayload) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>{status} | {app}</title></head>
<body><h1>{status}</h1><p>{message}</p><p><a href="{safe}">Continue</a></p></body></html>"#,
        status = payload.status,
        app = escape_html(app_name),
        message = escape_html(&payload.message),
        safe = escape_html(&payload.safe),
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
