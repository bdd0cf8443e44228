// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::authenticator::Authenticator;
use crate::access::LOGIN_PATH;
use crate::app_state::AppState;
use crate::session::{
    CsrfField, SessionRequest, expired_session_cookie, session_cookie, verify_csrf,
};
use crate::templates::{LoginPageContext, render_minijinja_template};
use crate::users::UserRouteError;
use actix_web::http::header::LOCATION;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use serde::Deserialize;

pub const LOGOUT_PATH: &str = "/logout";
const LOGIN_FAILED: &str = "Invalid email or password.";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "email--email", default)]
    pub email: String,
    #[serde(rename = "password--password", default)]
    pub password: String,
}

fn login_response(
    state: &AppState,
    req: &HttpRequest,
    email: &str,
    error: Option<String>,
) -> Result<HttpResponse> {
    let failed = error.is_some();
    let context =
        LoginPageContext::new(state.chrome(req), LOGIN_PATH, email, error).to_value();
    let html = render_minijinja_template(state.templates.as_ref(), "login/login_page.html", context)
        .map_err(|e| {
            log::error!("Failed to render login page: {}", e);
            actix_web::error::ErrorInternalServerError("Template rendering failed")
        })?;

    let mut builder = if failed {
        HttpResponse::Unauthorized()
    } else {
        HttpResponse::Ok()
    };
    Ok(builder
        .content_type("text/html; charset=utf-8")
        .insert_header(("Cache-Control", "no-cache, no-store, must-revalidate"))
        .body(html))
}

pub async fn login_page(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    if req.actor().is_some() {
        return Ok(HttpResponse::Found()
            .insert_header((LOCATION, state.config.users.list_path()))
            .finish());
    }
    login_response(&state, &req, "", None)
}

pub async fn login_submit(
    state: web::Data<AppState>,
    authenticator: web::Data<Authenticator>,
    req: HttpRequest,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let Some(context) = req.session_context() else {
        return Err(UserRouteError::from(crate::session::SessionError::Unavailable).into());
    };

    let Some(actor) = authenticator.verify(&form.email, &form.password).await else {
        log::info!("Failed sign-in attempt");
        return login_response(&state, &req, &form.email, Some(LOGIN_FAILED.to_string()));
    };

    let rotated = state
        .sessions
        .authenticate(&context.id, actor.id)
        .await
        .map_err(UserRouteError::from)?;
    log::info!("User {} signed in", actor.id);

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, state.config.users.list_path()))
        .cookie(session_cookie(&state.config.sessions.cookie_name, &rotated))
        .finish())
}

pub async fn logout(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<CsrfField>,
) -> Result<HttpResponse> {
    verify_csrf(&req, &form.csrf_token, &state.config.users.list_path())?;
    if let Some(context) = req.session_context() {
        state
            .sessions
            .sign_out(&context.id)
            .await
            .map_err(UserRouteError::from)?;
        if let Some(actor) = context.actor {
            log::info!("User {} signed out", actor.id);
        }
    }

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, LOGIN_PATH))
        .cookie(expired_session_cookie(&state.config.sessions.cookie_name))
        .finish())
}
