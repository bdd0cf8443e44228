// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod csrf;
mod middleware;
mod pending;
mod store;

pub use csrf::{CSRF_FIELD, CSRF_HEADER_NAME, CsrfField, CsrfForm, verify_csrf};
pub use middleware::{
    SessionContext, SessionMiddleware, SessionRequest, actor_id_from_session,
    expired_session_cookie, session_cookie,
};
pub use pending::{PendingAction, PendingCommand};
pub use store::{SessionError, SessionSnapshot, SessionStore};
