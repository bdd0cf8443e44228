// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::middleware::SessionRequest;
use crate::users::UserRouteError;
use actix_web::HttpRequest;
use serde::Deserialize;
use subtle::ConstantTimeEq;

pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "X-CSRF-Token";

/// Body of a POST that carries nothing but the form token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsrfField {
    #[serde(rename = "csrf_token", default)]
    pub csrf_token: String,
}

/// A form body plus its token.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfForm<T> {
    #[serde(rename = "csrf_token", default)]
    pub csrf_token: String,
    #[serde(flatten)]
    pub fields: T,
}

/// Check the submitted token against the signed-in session's token.
/// Anonymous sessions hold no token and are not checked. The
/// `X-CSRF-Token` header is accepted when the body carries none.
pub fn verify_csrf(req: &HttpRequest, submitted: &str, safe: &str) -> Result<(), UserRouteError> {
    let Some(expected) = req.session_context().and_then(|context| context.csrf_token) else {
        return Ok(());
    };

    let header = req
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let presented = if submitted.is_empty() { header } else { submitted };

    if !presented.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        return Ok(());
    }

    log::warn!(
        "Rejected {} {} with a missing or stale form token",
        req.method(),
        req.path()
    );
    Err(UserRouteError::StaleForm {
        safe: safe.to_string(),
    })
}
