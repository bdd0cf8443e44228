// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use common::*;
use userdesk::session::PendingAction;
use userdesk::util::TestConfigBuilder;

#[actix_web::test]
async fn list_is_public() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/users").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(ADMIN_EMAIL));
    assert!(body.contains(MEMBER_EMAIL));
    assert!(has_link(&body, "/users/5/edit"));
}

#[actix_web::test]
async fn admin_edits_member_through_staged_selection() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/edit")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(MEMBER_EMAIL));
    assert!(has_link(&body, "/users/edit"));
    let staged = harness
        .sessions
        .pending(cookie.value(), PendingAction::Edit)
        .await
        .expect("pending");
    assert_eq!(staged.map(|command| command.target_id), Some(MEMBER_ID));

    let body = form_body(&[("email--email", "a@b.com"), ("role--select", "editor")]);
    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/edit", body, &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some("/users"));

    let updated = harness.user(MEMBER_ID).expect("member still exists");
    assert_eq!(updated.email, "a@b.com");
    assert_eq!(updated.role, "editor");
    assert_eq!(updated.password_hash, harness.user(ADMIN_ID).expect("admin").password_hash);

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Edit)
        .await
        .expect("pending");
    assert!(slot.is_none());
}

#[actix_web::test]
async fn edit_post_ignores_password_field() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;
    let before = harness.user(MEMBER_ID).expect("member").password_hash;

    test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/edit")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let body = form_body(&[
        ("email--email", MEMBER_EMAIL),
        ("role--select", "viewer"),
        ("password--password", "replaced"),
    ]);
    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/edit", body, &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(harness.user(MEMBER_ID).expect("member").password_hash, before);
}

#[actix_web::test]
async fn edit_post_without_selection_is_not_found() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let body = form_body(&[("email--email", "a@b.com"), ("role--select", "editor")]);
    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/edit", body, &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_text(res).await;
    assert!(body.contains("No user was selected for this action."));
    assert_eq!(harness.user(MEMBER_ID).expect("member").email, MEMBER_EMAIL);
}

#[actix_web::test]
async fn unknown_or_malformed_ids_are_not_found_and_stage_nothing() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    for uri in ["/users/999/delete", "/users/abc/delete", "/users/-3/delete"] {
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(uri)
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", uri);
        let body = body_text(res).await;
        assert!(body.contains("The user you are trying to delete does not exist."));
        assert!(has_link(&body, "/users"));
    }

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Delete)
        .await
        .expect("pending");
    assert!(slot.is_none());
}

#[actix_web::test]
async fn admin_deletes_member_and_slot_is_cleared() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/delete")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains(MEMBER_EMAIL));
    assert!(!body.contains("disabled"));

    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/delete", String::new(), &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some("/users"));
    assert!(harness.user(MEMBER_ID).is_none());

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Delete)
        .await
        .expect("pending");
    assert!(slot.is_none());
}

#[actix_web::test]
async fn admin_cannot_delete_own_account() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/1/delete")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains("You cannot delete the account you are signed in with."));

    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/delete", String::new(), &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some("/users"));
    assert!(harness.user(ADMIN_ID).is_some());

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Delete)
        .await
        .expect("pending");
    assert_eq!(slot.map(|command| command.target_id), Some(ADMIN_ID));
}

#[actix_web::test]
async fn later_selection_wins() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    for uri in ["/users/2/delete", "/users/5/delete"] {
        test::call_service(
            &app,
            test::TestRequest::get()
                .uri(uri)
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
    }
    test::call_service(
        &app,
        signed_in_post(&harness, "/users/delete", String::new(), &cookie)
            .await
            .to_request(),
    )
    .await;

    assert!(harness.user(2).is_some());
    assert!(harness.user(MEMBER_ID).is_none());
}

#[actix_web::test]
async fn viewer_is_forbidden_on_every_guarded_route() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, VIEWER_EMAIL).await;

    let requests = vec![
        test::TestRequest::get().uri("/users/add"),
        form_post(
            "/users/add",
            form_body(&[
                ("email--email", "new@example.com"),
                ("role--select", "viewer"),
                ("password--password", "secret"),
            ]),
        ),
        test::TestRequest::get().uri("/users/5/edit"),
        form_post("/users/edit", String::new()),
        test::TestRequest::get().uri("/users/5/delete"),
        form_post("/users/delete", String::new()),
    ];
    for request in requests {
        let res = test::call_service(&app, request.cookie(cookie.clone()).to_request()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_text(res).await;
        assert!(has_link(&body, "/users"));
    }

    assert!(harness.user(MEMBER_ID).is_some());
    assert!(harness
        .directory
        .find_by_email("new@example.com")
        .expect("lookup")
        .is_none());
    for action in [PendingAction::Edit, PendingAction::Delete] {
        let slot = harness
            .sessions
            .pending(cookie.value(), action)
            .await
            .expect("pending");
        assert!(slot.is_none());
    }
}

#[actix_web::test]
async fn editor_may_edit_but_not_delete() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, EDITOR_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/edit")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/delete")
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn anonymous_requests_point_to_login() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;

    let res = test::call_service(
        &app,
        test::TestRequest::get().uri("/users/5/delete").to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = body_text(res).await;
    assert!(has_link(&body, "/login"));
}

#[actix_web::test]
async fn admin_adds_user() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/add")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_text(res).await;
    assert!(body.contains("password--password"));

    let body = form_body(&[
        ("email--email", "New@Example.com"),
        ("role--select", "editor"),
        ("password--password", "another secret"),
    ]);
    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/add", body, &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(location(&res).as_deref(), Some("/users"));

    let created = harness
        .directory
        .find_by_email("new@example.com")
        .expect("lookup")
        .expect("created");
    assert_eq!(created.role, "editor");
    assert!(created.password_hash.starts_with("$argon2"));
    assert!(created.id > MEMBER_ID);
}

#[actix_web::test]
async fn add_rejects_invalid_input() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let cases = [
        (("not-an-email", "editor", "secret"), StatusCode::BAD_REQUEST),
        (("x@example.com", "superuser", "secret"), StatusCode::BAD_REQUEST),
        (("x@example.com", "editor", ""), StatusCode::BAD_REQUEST),
        ((MEMBER_EMAIL, "editor", "secret"), StatusCode::CONFLICT),
    ];
    for ((email, role, password), status) in cases {
        let body = form_body(&[
            ("email--email", email),
            ("role--select", role),
            ("password--password", password),
        ]);
        let res = test::call_service(
            &app,
            signed_in_post(&harness, "/users/add", body, &cookie)
            .await
            .to_request(),
        )
        .await;
        assert_eq!(res.status(), status, "{} / {}", email, role);
    }
    assert_eq!(harness.directory.list().expect("list").len(), 4);
}

#[actix_web::test]
async fn edit_of_user_deleted_after_selection_is_not_found() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/edit")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    harness.directory.delete(MEMBER_ID).await.expect("delete");

    let body = form_body(&[("email--email", "a@b.com"), ("role--select", "editor")]);
    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/edit", body, &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_text(res).await;
    assert!(body.contains("The user you are trying to edit does not exist."));

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Edit)
        .await
        .expect("pending");
    assert!(slot.is_none());
}

#[actix_web::test]
async fn anonymous_traffic_keeps_signed_in_selection() {
    let hash = userdesk::users::hash_password(PASSWORD, &userdesk::util::TEST_ARGON2_PARAMS)
        .expect("hash");
    let harness = TestHarness::with_config(
        vec![
            record(ADMIN_ID, ADMIN_EMAIL, "admin", &hash),
            record(MEMBER_ID, MEMBER_EMAIL, "viewer", &hash),
        ],
        TestConfigBuilder::new().with_max_sessions(2).build(),
    )
    .await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/delete")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    for _ in 0..50 {
        let res =
            test::call_service(&app, test::TestRequest::get().uri("/users").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Delete)
        .await
        .expect("signed-in session survives");
    assert_eq!(slot.map(|command| command.target_id), Some(MEMBER_ID));

    let res = test::call_service(
        &app,
        signed_in_post(&harness, "/users/delete", String::new(), &cookie)
            .await
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(harness.user(MEMBER_ID).is_none());
}

#[actix_web::test]
async fn mutation_without_form_token_is_rejected() {
    let harness = TestHarness::new().await;
    let app = harness.app().await;
    let cookie = login(&app, &harness, ADMIN_EMAIL).await;

    let res = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/users/5/delete")
            .cookie(cookie.clone())
            .to_request(),
    )
    .await;
    let body = body_text(res).await;
    let token = harness.csrf_token(&cookie).await;
    assert!(!token.is_empty());
    assert!(body.contains(&format!("name=\"csrf_token\" value=\"{}\"", token)));

    for body in [String::new(), form_body(&[("csrf_token", "forged")])] {
        let res = test::call_service(
            &app,
            form_post("/users/delete", body)
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = body_text(res).await;
        assert!(body.contains("This form has expired."));
    }
    assert!(harness.user(MEMBER_ID).is_some());

    let slot = harness
        .sessions
        .pending(cookie.value(), PendingAction::Delete)
        .await
        .expect("pending");
    assert_eq!(slot.map(|command| command.target_id), Some(MEMBER_ID));

    let res = test::call_service(
        &app,
        form_post("/users/delete", form_body(&[("csrf_token", &token)]))
            .cookie(cookie)
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FOUND);
    assert!(harness.user(MEMBER_ID).is_none());
}
