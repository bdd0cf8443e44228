// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::access::LOGIN_PATH;
use actix_web::web;

mod authenticator;
mod handlers;

pub use authenticator::Authenticator;
pub use handlers::{LOGOUT_PATH, LoginForm};

/// Configure sign-in and sign-out routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(LOGIN_PATH)
            .route(web::get().to(handlers::login_page))
            .route(web::post().to(handlers::login_submit)),
    )
    .route(LOGOUT_PATH, web::post().to(handlers::logout));
}
