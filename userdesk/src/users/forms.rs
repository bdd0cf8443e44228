// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Form boundary for the user pages.
//!
//! Browsers post flat `<field>--<input type>` names; the rendered form is
//! described by a nested `{field: {type: {value}}}` schema value. Both shapes
//! are mapped to and from [`UserFormDto`] here so handlers never touch them.

use super::types::UserRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const EMAIL_FIELD: &str = "email--email";
pub const ROLE_FIELD: &str = "role--select";
pub const PASSWORD_FIELD: &str = "password--password";

/// Body of `POST /users/edit`. Any password field is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEditForm {
    #[serde(rename = "email--email", default)]
    pub email: String,
    #[serde(rename = "role--select", default)]
    pub role: String,
}

/// Body of `POST /users/add` and `POST /users/setup`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserAddForm {
    #[serde(rename = "email--email", default)]
    pub email: String,
    #[serde(rename = "role--select", default)]
    pub role: String,
    #[serde(rename = "password--password", default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserFormDto {
    pub email: String,
    pub role: String,
}

impl From<&UserRecord> for UserFormDto {
    fn from(record: &UserRecord) -> Self {
        Self {
            email: record.email.clone(),
            role: record.role.clone(),
        }
    }
}

impl From<&UserEditForm> for UserFormDto {
    fn from(form: &UserEditForm) -> Self {
        Self {
            email: form.email.clone(),
            role: form.role.clone(),
        }
    }
}

pub fn to_form_values(dto: &UserFormDto) -> Value {
    json!({
        "email": { "email": { "value": dto.email } },
        "role": { "select": { "value": dto.role } },
    })
}

/// Returns `None` when either field is missing or not a string.
pub fn from_form_values(values: &Value) -> Option<UserFormDto> {
    let email = values
        .get("email")?
        .get("email")?
        .get("value")?
        .as_str()?;
    let role = values.get("role")?.get("select")?.get("value")?.as_str()?;
    Some(UserFormDto {
        email: email.to_string(),
        role: role.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    /// Posted name, e.g. `email--email`.
    pub name: &'static str,
    pub label: &'static str,
    pub kind: &'static str,
    pub value: String,
    pub options: Vec<SelectOption>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSchema {
    pub fields: Vec<FormField>,
}

fn nested_value(values: &Value, field: &str, kind: &str) -> String {
    values
        .get(field)
        .and_then(|by_kind| by_kind.get(kind))
        .and_then(|entry| entry.get("value"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Build the renderable form from nested form values (see [`to_form_values`]).
/// Missing entries render empty. The password input is only offered when
/// creating a user.
pub fn user_form_schema(values: &Value, roles: &[String], include_password: bool) -> FormSchema {
    let role = nested_value(values, "role", "select");

    let mut fields = vec![
        FormField {
            name: EMAIL_FIELD,
            label: "Email",
            kind: "email",
            value: nested_value(values, "email", "email"),
            options: Vec::new(),
            required: true,
        },
        FormField {
            name: ROLE_FIELD,
            label: "Role",
            kind: "select",
            options: roles
                .iter()
                .map(|option| SelectOption {
                    value: option.clone(),
                    selected: *option == role,
                })
                .collect(),
            value: role,
            required: true,
        },
    ];

    if include_password {
        fields.push(FormField {
            name: PASSWORD_FIELD,
            label: "Password",
            kind: "password",
            value: String::new(),
            options: Vec::new(),
            required: true,
        });
    }

    FormSchema { fields }
}
