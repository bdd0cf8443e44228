// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use crate::users::{Actor, ErrorPayload, FormSchema, UserRecord};
use minijinja::{Value, context};
use serde::Serialize;

/// Fields every page layout reads.
#[derive(Debug, Clone)]
pub struct PageChrome {
    app_name: String,
    actor: Option<Actor>,
    list_path: String,
    csrf_token: Option<String>,
}

impl PageChrome {
    pub fn new(
        app_name: &str,
        actor: Option<Actor>,
        list_path: &str,
        csrf_token: Option<String>,
    ) -> Self {
        Self {
            app_name: app_name.to_string(),
            actor,
            list_path: list_path.to_string(),
            csrf_token,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorPageContext {
    app_name: String,
    payload: ErrorPayload,
}

impl ErrorPageContext {
    pub fn new(app_name: &str, payload: ErrorPayload) -> Self {
        Self {
            app_name: app_name.to_string(),
            payload,
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.app_name,
            message => &self.payload.message,
            status => self.payload.status,
            safe => &self.payload.safe
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub edit_path: String,
    pub delete_path: String,
}

impl UserRow {
    pub fn new(record: &UserRecord, edit_path: String, delete_path: String) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            role: record.role.clone(),
            edit_path,
            delete_path,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserListContext {
    chrome: PageChrome,
    users: Vec<UserRow>,
    add_path: String,
}

impl UserListContext {
    pub fn new(chrome: PageChrome, users: Vec<UserRow>, add_path: &str) -> Self {
        Self {
            chrome,
            users,
            add_path: add_path.to_string(),
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.chrome.app_name,
            actor => &self.chrome.actor,
            list_path => &self.chrome.list_path,
            csrf_token => &self.chrome.csrf_token,
            users => &self.users,
            add_path => &self.add_path
        }
    }
}

/// Add and edit share one form page.
#[derive(Debug, Clone)]
pub struct UserFormContext {
    chrome: PageChrome,
    title: String,
    action: String,
    form: FormSchema,
}

impl UserFormContext {
    pub fn new(chrome: PageChrome, title: &str, action: &str, form: FormSchema) -> Self {
        Self {
            chrome,
            title: title.to_string(),
            action: action.to_string(),
            form,
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.chrome.app_name,
            actor => &self.chrome.actor,
            list_path => &self.chrome.list_path,
            csrf_token => &self.chrome.csrf_token,
            title => &self.title,
            action => &self.action,
            form => &self.form
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserDeleteContext {
    chrome: PageChrome,
    title: String,
    email: String,
    action: String,
    current: bool,
    message: Option<String>,
}

impl UserDeleteContext {
    pub fn new(
        chrome: PageChrome,
        title: &str,
        email: &str,
        action: &str,
        current: bool,
        message: Option<String>,
    ) -> Self {
        Self {
            chrome,
            title: title.to_string(),
            email: email.to_string(),
            action: action.to_string(),
            current,
            message,
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.chrome.app_name,
            actor => &self.chrome.actor,
            list_path => &self.chrome.list_path,
            csrf_token => &self.chrome.csrf_token,
            title => &self.title,
            email => &self.email,
            action => &self.action,
            current => self.current,
            message => &self.message
        }
    }
}

#[derive(Debug, Clone)]
pub struct SetupPageContext {
    chrome: PageChrome,
    available: bool,
    action: String,
    form: FormSchema,
}

impl SetupPageContext {
    pub fn new(chrome: PageChrome, available: bool, action: &str, form: FormSchema) -> Self {
        Self {
            chrome,
            available,
            action: action.to_string(),
            form,
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.chrome.app_name,
            actor => &self.chrome.actor,
            list_path => &self.chrome.list_path,
            csrf_token => &self.chrome.csrf_token,
            available => self.available,
            action => &self.action,
            form => &self.form
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginPageContext {
    chrome: PageChrome,
    action: String,
    email: String,
    error: Option<String>,
}

impl LoginPageContext {
    pub fn new(chrome: PageChrome, action: &str, email: &str, error: Option<String>) -> Self {
        Self {
            chrome,
            action: action.to_string(),
            email: email.to_string(),
            error,
        }
    }

    pub fn to_value(&self) -> Value {
        context! {
            app_name => &self.chrome.app_name,
            actor => &self.chrome.actor,
            list_path => &self.chrome.list_path,
            csrf_token => &self.chrome.csrf_token,
            action => &self.action,
            email => &self.email,
            error => &self.error
        }
    }
}
