// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::store::SessionStore;
use crate::users::{Actor, UserDirectory, UserId, UserRouteError};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{Error, HttpMessage, HttpRequest};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

/// Per-request view of the session, stored in request extensions.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: String,
    pub actor: Option<Actor>,
    /// Present once the session is signed in.
    pub csrf_token: Option<String>,
}

/// Trait to read the session context from HttpRequest
pub trait SessionRequest {
    fn session_context(&self) -> Option<SessionContext>;
    fn actor(&self) -> Option<Actor>;
    fn actor_id(&self) -> Option<UserId>;
    fn csrf_token(&self) -> Option<String>;
}

impl SessionRequest for HttpRequest {
    fn session_context(&self) -> Option<SessionContext> {
        self.extensions().get::<SessionContext>().cloned()
    }

    fn actor(&self) -> Option<Actor> {
        self.session_context().and_then(|context| context.actor)
    }

    fn actor_id(&self) -> Option<UserId> {
        self.actor().map(|actor| actor.id)
    }

    fn csrf_token(&self) -> Option<String> {
        self.session_context().and_then(|context| context.csrf_token)
    }
}

/// Actor resolver used by the capability middleware.
pub fn actor_id_from_session(req: &HttpRequest) -> Option<UserId> {
    req.actor_id()
}

pub fn session_cookie(name: &str, session_id: &str) -> Cookie<'static> {
    Cookie::build(name.to_string(), session_id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

pub fn expired_session_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = session_cookie(name, "");
    cookie.make_removal();
    cookie
}

/// Opens the session (or mints an anonymous id) for every request and resolves the signed-in actor.
pub struct SessionMiddleware {
    sessions: SessionStore,
    directory: UserDirectory,
    cookie_name: Rc<str>,
}

impl SessionMiddleware {
    pub fn new(sessions: SessionStore, directory: UserDirectory, cookie_name: &str) -> Self {
        Self {
            sessions,
            directory,
            cookie_name: Rc::from(cookie_name),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            sessions: self.sessions.clone(),
            directory: self.directory.clone(),
            cookie_name: self.cookie_name.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    sessions: SessionStore,
    directory: UserDirectory,
    cookie_name: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let sessions = self.sessions.clone();
        let directory = self.directory.clone();
        let cookie_name = self.cookie_name.clone();

        Box::pin(async move {
            let presented = req
                .cookie(&cookie_name)
                .map(|cookie| cookie.value().to_string());
            let snapshot = sessions
                .open(presented)
                .await
                .map_err(UserRouteError::from)?;

            let actor = match snapshot.actor_id {
                Some(actor_id) => match directory.find(actor_id).map_err(UserRouteError::from)? {
                    Some(record) => Some(Actor::from(&record)),
                    None => {
                        log::warn!(
                            "Session bound to user id {} which no longer exists",
                            actor_id
                        );
                        None
                    }
                },
                None => None,
            };

            req.extensions_mut().insert(SessionContext {
                id: snapshot.id.clone(),
                actor,
                csrf_token: snapshot.csrf_token.clone(),
            });

            let mut res = service.call(req).await?;

            let already_set = res
                .response()
                .cookies()
                .any(|cookie| cookie.name() == &*cookie_name);
            if snapshot.created && !already_set {
                let cookie = session_cookie(&cookie_name, &snapshot.id);
                if let Err(err) = res.response_mut().add_cookie(&cookie) {
                    log::error!("Failed to set session cookie: {}", err);
                }
            }

            Ok(res)
        })
    }
}
