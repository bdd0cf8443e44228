// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::policy::{Action, USERS_RESOURCE};
use crate::app_state::AppState;
use crate::users::{UserDirectory, UserId, UserRouteError};
use actix_web::{
    Error, HttpRequest,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    web::Data,
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// Pulls the acting user's id out of a request.
pub type ActorIdResolver = fn(&HttpRequest) -> Option<UserId>;

pub const LOGIN_PATH: &str = "/login";

/// Rejects the request with `Forbidden` unless the actor's role grants `action`
/// on users at `minimum_level` or above. Runs before the handler, so neither the
/// store nor the session is touched on rejection.
pub struct RequireCapability {
    minimum_level: u8,
    resolver: ActorIdResolver,
    action: Action,
}

impl RequireCapability {
    pub fn new(minimum_level: u8, resolver: ActorIdResolver, action: Action) -> Self {
        Self {
            minimum_level,
            resolver,
            action,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireCapability
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireCapabilityService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireCapabilityService {
            service,
            minimum_level: self.minimum_level,
            resolver: self.resolver,
            action: self.action,
        }))
    }
}

pub struct RequireCapabilityService<S> {
    service: S,
    minimum_level: u8,
    resolver: ActorIdResolver,
    action: Action,
}

impl<S> RequireCapabilityService<S> {
    fn check(&self, req: &HttpRequest) -> Result<(), UserRouteError> {
        let state = req.app_data::<Data<AppState>>().ok_or_else(|| {
            log::error!("AppState missing from app data; denying request");
            self.forbidden(LOGIN_PATH.to_string())
        })?;
        let list_path = state.config.users.list_path();

        let Some(actor_id) = (self.resolver)(req) else {
            log::info!(
                "Anonymous request denied {} on {}",
                self.action,
                USERS_RESOURCE
            );
            return Err(self.forbidden(LOGIN_PATH.to_string()));
        };

        let directory = req.app_data::<Data<UserDirectory>>().ok_or_else(|| {
            log::error!("UserDirectory missing from app data; denying request");
            self.forbidden(list_path.clone())
        })?;

        let role = match directory.find(actor_id)? {
            Some(record) => record.role,
            None => return Err(self.forbidden(LOGIN_PATH.to_string())),
        };

        if state
            .access
            .allows(&role, self.minimum_level, USERS_RESOURCE, self.action)
        {
            Ok(())
        } else {
            log::info!(
                "User {} with role '{}' denied {} on {}",
                actor_id,
                role,
                self.action,
                USERS_RESOURCE
            );
            Err(self.forbidden(list_path))
        }
    }

    fn forbidden(&self, safe: String) -> UserRouteError {
        UserRouteError::Forbidden {
            action: self.action,
            safe,
        }
    }
}

impl<S, B> Service<ServiceRequest> for RequireCapabilityService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Err(err) = self.check(req.request()) {
            let (http_req, _) = req.into_parts();
            let response = ServiceResponse::from_err(err, http_req).map_into_right_body();
            return Box::pin(async move { Ok(response) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}
