// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::header::{CONTENT_TYPE, LOCATION};
use actix_web::middleware::ErrorHandlers;
use actix_web::{App, Error, test, web};
use std::sync::Arc;
use userdesk::app_state::AppState;
use userdesk::config::ValidatedConfig;
use userdesk::error_page::render_error_page;
use userdesk::login::{self, Authenticator};
use userdesk::session::{CSRF_HEADER_NAME, SessionMiddleware, SessionStore};
use userdesk::users::{
    self, FileUserStore, UserCoordinator, UserDirectory, UserRecord, hash_password,
};
use userdesk::util::test_fixtures::TestFixtureRoot;
use userdesk::util::{TEST_ARGON2_PARAMS, test_config};

pub const ADMIN_ID: i64 = 1;
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const EDITOR_EMAIL: &str = "editor@example.com";
pub const VIEWER_EMAIL: &str = "viewer@example.com";
pub const MEMBER_ID: i64 = 5;
pub const MEMBER_EMAIL: &str = "member@example.com";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestHarness {
    pub fixture: TestFixtureRoot,
    pub config: Arc<ValidatedConfig>,
    pub directory: UserDirectory,
    pub sessions: SessionStore,
    pub app_state: web::Data<AppState>,
    pub coordinator: web::Data<UserCoordinator>,
    pub authenticator: web::Data<Authenticator>,
}

impl TestHarness {
    /// Admin (id 1), editor (2), viewer (3) and a plain member (5) sharing one password.
    pub async fn new() -> Self {
        let hash = hash_password(PASSWORD, &TEST_ARGON2_PARAMS).expect("hash");
        Self::with_users(vec![
            record(ADMIN_ID, ADMIN_EMAIL, "admin", &hash),
            record(2, EDITOR_EMAIL, "editor", &hash),
            record(3, VIEWER_EMAIL, "viewer", &hash),
            record(MEMBER_ID, MEMBER_EMAIL, "viewer", &hash),
        ])
        .await
    }

    pub async fn empty() -> Self {
        Self::with_users(Vec::new()).await
    }

    pub async fn with_users(users: Vec<UserRecord>) -> Self {
        Self::with_config(users, test_config()).await
    }

    pub async fn with_config(users: Vec<UserRecord>, config: ValidatedConfig) -> Self {
        let fixture = TestFixtureRoot::new_unique("userdesk-http").expect("fixture root");
        if !users.is_empty() {
            fixture.seed_users(users).expect("seed users");
        }

        let config = Arc::new(config);
        let store = FileUserStore::new(fixture.users_file()).expect("store");
        let directory = UserDirectory::new(Arc::new(store)).expect("directory");
        let sessions = SessionStore::new(&config.sessions);
        let authenticator =
            Authenticator::new(directory.clone(), &config.password).expect("authenticator");

        Self {
            app_state: web::Data::new(AppState::new(config.clone(), sessions.clone())),
            coordinator: web::Data::new(UserCoordinator::new(
                directory.clone(),
                sessions.clone(),
                config.clone(),
            )),
            authenticator: web::Data::new(authenticator),
            fixture,
            config,
            directory,
            sessions,
        }
    }

    pub async fn app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error>
    {
        let config = self.config.clone();
        test::init_service(
            App::new()
                .app_data(self.app_state.clone())
                .app_data(self.coordinator.clone())
                .app_data(web::Data::new(self.directory.clone()))
                .app_data(self.authenticator.clone())
                .wrap(ErrorHandlers::new().default_handler(render_error_page))
                .wrap(SessionMiddleware::new(
                    self.sessions.clone(),
                    self.directory.clone(),
                    &self.config.sessions.cookie_name,
                ))
                .configure(move |cfg| users::configure(cfg, &config))
                .configure(login::configure),
        )
        .await
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.sessions.cookie_name
    }

    pub fn user(&self, id: i64) -> Option<UserRecord> {
        self.directory.find(id).expect("directory read")
    }

    /// Form token of the signed-in session behind `cookie`; empty when there is none.
    pub async fn csrf_token(&self, cookie: &Cookie<'static>) -> String {
        self.sessions
            .open(Some(cookie.value().to_string()))
            .await
            .expect("open session")
            .csrf_token
            .unwrap_or_default()
    }
}

pub fn record(id: i64, email: &str, role: &str, password_hash: &str) -> UserRecord {
    UserRecord {
        id,
        email: email.to_string(),
        role: role.to_string(),
        password_hash: password_hash.to_string(),
    }
}

pub fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

pub fn form_post(uri: &str, body: String) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((CONTENT_TYPE, "application/x-www-form-urlencoded"))
        .set_payload(body)
}

/// Form POST carrying the session cookie and its form token.
pub async fn signed_in_post(
    harness: &TestHarness,
    uri: &str,
    body: String,
    cookie: &Cookie<'static>,
) -> test::TestRequest {
    let token = harness.csrf_token(cookie).await;
    form_post(uri, body)
        .cookie(cookie.clone())
        .insert_header((CSRF_HEADER_NAME, token))
}

/// Session cookie the response sets, if any.
pub fn session_cookie_from<B>(res: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| Cookie::new(name.to_string(), cookie.value().to_string()))
}

pub fn location<B>(res: &ServiceResponse<B>) -> Option<String> {
    res.headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Sign in through `POST /login` and return the authenticated session cookie.
pub async fn login<S, B>(app: &S, harness: &TestHarness, email: &str) -> Cookie<'static>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let body = form_body(&[("email--email", email), ("password--password", PASSWORD)]);
    let res = test::call_service(app, form_post("/login", body).to_request()).await;
    assert_eq!(res.status(), 302, "login for {} should redirect", email);
    session_cookie_from(&res, harness.cookie_name()).expect("session cookie")
}

/// Whether `body` carries `path` as a quoted attribute value, raw or HTML-escaped.
pub fn has_link(body: &str, path: &str) -> bool {
    let escaped = path.replace('/', "&#x2f;");
    body.contains(&format!("\"{}\"", path)) || body.contains(&format!("\"{}\"", escaped))
}

pub async fn body_text<B>(res: ServiceResponse<B>) -> String
where
    B: MessageBody,
{
    let bytes = test::read_body(res).await;
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}
