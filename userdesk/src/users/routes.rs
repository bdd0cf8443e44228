// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::coordinator::{DeleteOutcome, UserCoordinator};
use super::error::UserRouteError;
use super::forms::{
    ROLE_FIELD, UserAddForm, UserEditForm, UserFormDto, to_form_values, user_form_schema,
};
use super::types::Actor;
use crate::access::{Action, LOGIN_PATH, RequireCapability};
use crate::app_state::AppState;
use crate::config::ValidatedConfig;
use crate::session::{
    CsrfField, CsrfForm, SessionError, SessionRequest, actor_id_from_session, verify_csrf,
};
use crate::templates::{
    SetupPageContext, UserDeleteContext, UserFormContext, UserListContext, UserRow, render_page,
};
use actix_web::http::header::LOCATION;
use actix_web::{HttpRequest, HttpResponse, Result, web};

/// Every capability-guarded route requires at least this role level.
pub const MINIMUM_LEVEL: u8 = 1;

/// Register the user management routes under the configured paths.
pub fn configure(cfg: &mut web::ServiceConfig, config: &ValidatedConfig) {
    let users = &config.users;
    let capability =
        |action: Action| RequireCapability::new(MINIMUM_LEVEL, actor_id_from_session, action);

    cfg.service(
        web::resource(users.setup_path.clone())
            .route(web::get().to(setup_page))
            .route(web::post().to(setup_submit)),
    )
    .route(&users.list_path(), web::get().to(list_users))
    .service(
        web::resource(users.add_path())
            .wrap(capability(Action::Create))
            .route(web::get().to(add_page))
            .route(web::post().to(add_submit)),
    )
    .service(
        web::resource(users.edit_selection_pattern())
            .wrap(capability(Action::Update))
            .route(web::get().to(edit_page)),
    )
    .service(
        web::resource(users.edit_path())
            .wrap(capability(Action::Update))
            .route(web::post().to(edit_submit)),
    )
    .service(
        web::resource(users.delete_selection_pattern())
            .wrap(capability(Action::Delete))
            .route(web::get().to(delete_page)),
    )
    .service(
        web::resource(users.delete_path())
            .wrap(capability(Action::Delete))
            .route(web::post().to(delete_submit)),
    );
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location.to_string()))
        .finish()
}

fn session_id(req: &HttpRequest) -> Result<String, UserRouteError> {
    req.session_context()
        .map(|context| context.id)
        .ok_or_else(|| UserRouteError::from(SessionError::Unavailable))
}

fn require_actor(req: &HttpRequest, action: Action) -> Result<Actor, UserRouteError> {
    req.actor().ok_or_else(|| UserRouteError::Forbidden {
        action,
        safe: LOGIN_PATH.to_string(),
    })
}

async fn list_users(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let users = &state.config.users;
    let rows = coordinator
        .list()?
        .iter()
        .map(|record| {
            UserRow::new(
                record,
                users.edit_selection_path(record.id),
                users.delete_selection_path(record.id),
            )
        })
        .collect();
    let context = UserListContext::new(state.chrome(&req), rows, &users.add_path());
    render_page(state.templates.as_ref(), "users/list.html", context.to_value())
}

async fn setup_page(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let available = coordinator.setup_available()?;
    let mut form = user_form_schema(&to_form_values(&UserFormDto::default()), &[], true);
    // The first account always gets the managing role.
    form.fields.retain(|field| field.name != ROLE_FIELD);
    let context = SetupPageContext::new(
        state.chrome(&req),
        available,
        &state.config.users.setup_path,
        form,
    );
    render_page(state.templates.as_ref(), "users/setup.html", context.to_value())
}

async fn setup_submit(
    coordinator: web::Data<UserCoordinator>,
    form: web::Form<UserAddForm>,
) -> Result<HttpResponse> {
    coordinator.create_first(form.into_inner()).await?;
    Ok(redirect(LOGIN_PATH))
}

async fn add_page(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let users = &state.config.users;
    let form = user_form_schema(
        &to_form_values(&UserFormDto::default()),
        &state.config.role_names(),
        true,
    );
    let context = UserFormContext::new(
        state.chrome(&req),
        &users.actions.add,
        &users.add_path(),
        form,
    );
    render_page(state.templates.as_ref(), "users/form.html", context.to_value())
}

async fn add_submit(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
    form: web::Form<CsrfForm<UserAddForm>>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    verify_csrf(&req, &form.csrf_token, &state.config.users.add_path())?;
    coordinator.create(form.fields).await?;
    Ok(redirect(&state.config.users.list_path()))
}

async fn edit_page(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let session_id = session_id(&req)?;
    let selection = coordinator
        .select_for_edit(&session_id, &path.into_inner())
        .await?;
    let users = &state.config.users;
    let form = user_form_schema(
        &to_form_values(&selection.form),
        &state.config.role_names(),
        false,
    );
    let context = UserFormContext::new(
        state.chrome(&req),
        &users.actions.edit,
        &users.edit_path(),
        form,
    );
    render_page(state.templates.as_ref(), "users/form.html", context.to_value())
}

async fn edit_submit(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
    form: web::Form<CsrfForm<UserEditForm>>,
) -> Result<HttpResponse> {
    let session_id = session_id(&req)?;
    verify_csrf(&req, &form.csrf_token, &state.config.users.list_path())?;
    coordinator.apply_edit(&session_id, &form.fields).await?;
    Ok(redirect(&state.config.users.list_path()))
}

async fn delete_page(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let session_id = session_id(&req)?;
    let actor = require_actor(&req, Action::Delete)?;
    let selection = coordinator
        .select_for_delete(&session_id, &actor, &path.into_inner())
        .await?;
    let users = &state.config.users;
    let context = UserDeleteContext::new(
        state.chrome(&req),
        &users.actions.delete,
        &selection.target.email,
        &users.delete_path(),
        selection.current,
        selection.message,
    );
    render_page(state.templates.as_ref(), "users/delete.html", context.to_value())
}

async fn delete_submit(
    state: web::Data<AppState>,
    coordinator: web::Data<UserCoordinator>,
    req: HttpRequest,
    form: web::Form<CsrfField>,
) -> Result<HttpResponse> {
    let session_id = session_id(&req)?;
    let actor = require_actor(&req, Action::Delete)?;
    verify_csrf(&req, &form.csrf_token, &state.config.users.list_path())?;
    match coordinator.confirm_delete(&session_id, &actor).await? {
        DeleteOutcome::Deleted(_) | DeleteOutcome::SelfGuarded(_) => {
            Ok(redirect(&state.config.users.list_path()))
        }
    }
}
