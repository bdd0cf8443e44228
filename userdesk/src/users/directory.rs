// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::store::UserStore;
use super::types::{
    NewUser, StoreError, UserId, UserMutation, UserMutationResult, UserRecord, UserUpdate,
    UsersData,
};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};

type MutationRequest = (
    UserMutation,
    oneshot::Sender<Result<UserMutationResult, StoreError>>,
);
type MutationSender = mpsc::UnboundedSender<MutationRequest>;
type MutationReceiver = mpsc::UnboundedReceiver<MutationRequest>;

const DIRECTORY: &str = "User directory";

/// The users table: reads are served from memory, writes go through one
/// background task that persists before publishing.
#[derive(Clone)]
pub struct UserDirectory {
    users_data: Arc<RwLock<UsersData>>,
    mutation_sender: MutationSender,
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    /// Load users from the store and start the background mutation task.
    pub fn new(store: Arc<dyn UserStore>) -> Result<Self, StoreError> {
        let users = store.load()?;
        log::info!("Loaded {} user(s) into the directory", users.records.len());

        let users_data = Arc::new(RwLock::new(users));

        let (mutation_sender, mut mutation_receiver): (MutationSender, MutationReceiver) =
            mpsc::unbounded_channel();

        let users_data_clone = users_data.clone();
        let store_clone = store.clone();

        tokio::spawn(async move {
            while let Some((mutation, response_sender)) = mutation_receiver.recv().await {
                let result = Self::handle_mutation(mutation, &users_data_clone, &store_clone);
                let _ = response_sender.send(result);
            }
        });

        Ok(UserDirectory {
            users_data,
            mutation_sender,
            store,
        })
    }

    fn reload_users_from_store(
        users_data: &Arc<RwLock<UsersData>>,
        store: &Arc<dyn UserStore>,
    ) -> Result<(), StoreError> {
        let users = store.load()?;
        match users_data.write() {
            Ok(mut guard) => {
                *guard = users;
            }
            Err(poisoned) => {
                log::error!("Users lock poisoned during reload; recovering");
                let mut guard = poisoned.into_inner();
                *guard = users;
            }
        }
        users_data.clear_poison();
        Ok(())
    }

    fn with_users_read<T>(&self, f: impl FnOnce(&UsersData) -> T) -> Result<T, StoreError> {
        match self.users_data.read() {
            Ok(guard) => Ok(f(&guard)),
            Err(_) => {
                log::error!("Users lock poisoned on read; reloading from store");
                Self::reload_users_from_store(&self.users_data, &self.store)?;
                let guard = self.users_data.read().map_err(|_| {
                    StoreError::Unavailable("User directory after lock recovery".to_string())
                })?;
                Ok(f(&guard))
            }
        }
    }

    fn with_users_write<T>(
        users_data: &Arc<RwLock<UsersData>>,
        store: &Arc<dyn UserStore>,
        f: impl FnOnce(&mut UsersData) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = match users_data.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::error!("Users lock poisoned on write; reloading from store");
                let mut guard = poisoned.into_inner();
                *guard = store.load()?;
                users_data.clear_poison();
                guard
            }
        };

        f(&mut guard)
    }

    /// Apply one mutation. The store is written before the in-memory table,
    /// so a failed save leaves readers on the previous state.
    fn handle_mutation(
        mutation: UserMutation,
        users_data: &Arc<RwLock<UsersData>>,
        store: &Arc<dyn UserStore>,
    ) -> Result<UserMutationResult, StoreError> {
        Self::with_users_write(users_data, store, |users| match mutation {
            UserMutation::Insert { user } => {
                let (updated, id) = Self::with_inserted(users, user)?;
                store.save(&updated)?;
                *users = updated;
                Ok(UserMutationResult::Inserted(id))
            }
            UserMutation::InsertFirst { user } => {
                if !users.records.is_empty() {
                    return Ok(UserMutationResult::NotInserted);
                }
                let (updated, id) = Self::with_inserted(users, user)?;
                store.save(&updated)?;
                *users = updated;
                Ok(UserMutationResult::Inserted(id))
            }
            UserMutation::Update { id, update } => {
                if !users.records.contains_key(&id) {
                    return Ok(UserMutationResult::Affected(0));
                }
                if users.email_taken(&update.email, Some(id)) {
                    return Err(StoreError::DuplicateEmail(update.email));
                }
                let mut updated = users.clone();
                if let Some(record) = updated.records.get_mut(&id) {
                    record.email = update.email;
                    record.role = update.role;
                }
                store.save(&updated)?;
                *users = updated;
                Ok(UserMutationResult::Affected(1))
            }
            UserMutation::Delete { id } => {
                let mut updated = users.clone();
                if updated.records.remove(&id).is_none() {
                    return Ok(UserMutationResult::Affected(0));
                }
                store.save(&updated)?;
                *users = updated;
                Ok(UserMutationResult::Affected(1))
            }
        })
    }

    fn with_inserted(users: &UsersData, user: NewUser) -> Result<(UsersData, UserId), StoreError> {
        if users.email_taken(&user.email, None) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        let mut updated = users.clone();
        let id = updated.next_id;
        updated.next_id = id + 1;
        updated.records.insert(
            id,
            UserRecord {
                id,
                email: user.email,
                role: user.role,
                password_hash: user.password_hash,
            },
        );
        Ok((updated, id))
    }

    async fn submit(&self, mutation: UserMutation) -> Result<UserMutationResult, StoreError> {
        let (response_sender, response_receiver) = oneshot::channel();

        self.mutation_sender
            .send((mutation, response_sender))
            .map_err(|_| StoreError::Unavailable(DIRECTORY.to_string()))?;

        response_receiver
            .await
            .map_err(|_| StoreError::Unavailable(DIRECTORY.to_string()))?
    }

    /// All users ordered by id.
    pub fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.with_users_read(|users| users.records.values().cloned().collect())
    }

    pub fn find(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        log::debug!("Looking up user id {}", id);
        self.with_users_read(|users| users.records.get(&id).cloned())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.with_users_read(|users| {
            users
                .records
                .values()
                .find(|record| record.email.eq_ignore_ascii_case(email))
                .cloned()
        })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.with_users_read(|users| users.records.is_empty())
    }

    pub async fn insert(&self, user: NewUser) -> Result<UserId, StoreError> {
        match self.submit(UserMutation::Insert { user }).await? {
            UserMutationResult::Inserted(id) => Ok(id),
            other => Err(StoreError::Unavailable(format!(
                "{} returned {:?} for insert",
                DIRECTORY, other
            ))),
        }
    }

    /// Insert only while the table is empty. Returns `None` when users already exist.
    pub async fn insert_first(&self, user: NewUser) -> Result<Option<UserId>, StoreError> {
        match self.submit(UserMutation::InsertFirst { user }).await? {
            UserMutationResult::Inserted(id) => Ok(Some(id)),
            UserMutationResult::NotInserted => Ok(None),
            other => Err(StoreError::Unavailable(format!(
                "{} returned {:?} for first insert",
                DIRECTORY, other
            ))),
        }
    }

    /// Returns the number of rows changed (0 or 1).
    pub async fn update(&self, id: UserId, update: UserUpdate) -> Result<usize, StoreError> {
        match self.submit(UserMutation::Update { id, update }).await? {
            UserMutationResult::Affected(count) => Ok(count),
            other => Err(StoreError::Unavailable(format!(
                "{} returned {:?} for update",
                DIRECTORY, other
            ))),
        }
    }

    /// Returns the number of rows removed (0 or 1).
    pub async fn delete(&self, id: UserId) -> Result<usize, StoreError> {
        match self.submit(UserMutation::Delete { id }).await? {
            UserMutationResult::Affected(count) => Ok(count),
            other => Err(StoreError::Unavailable(format!(
                "{} returned {:?} for delete",
                DIRECTORY, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::store::MemoryUserStore;

    fn record(id: UserId, email: &str, role: &str) -> UserRecord {
        UserRecord {
            id,
            email: email.to_string(),
            role: role.to_string(),
            password_hash: format!("hash-{}", id),
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            role: "editor".to_string(),
            password_hash: "hash-new".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids_and_persists() {
        let store = Arc::new(MemoryUserStore::from_users(vec![record(
            1,
            "admin@example.com",
            "admin",
        )]));
        let directory = UserDirectory::new(store.clone()).expect("directory");

        let first = directory.insert(new_user("a@b.com")).await.expect("insert");
        let second = directory.insert(new_user("c@d.com")).await.expect("insert");
        assert_eq!(first, 2);
        assert_eq!(second, 3);

        let persisted = store.snapshot();
        assert_eq!(persisted.records.len(), 3);
        assert_eq!(persisted.next_id, 4);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = Arc::new(MemoryUserStore::from_users(Vec::new()));
        let directory = UserDirectory::new(store).expect("directory");

        let id = directory.insert(new_user("a@b.com")).await.expect("insert");
        assert_eq!(directory.delete(id).await.expect("delete"), 1);
        let next = directory.insert(new_user("a@b.com")).await.expect("insert");
        assert!(next > id);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = Arc::new(MemoryUserStore::from_users(vec![record(
            1,
            "admin@example.com",
            "admin",
        )]));
        let directory = UserDirectory::new(store).expect("directory");

        let err = directory
            .insert(new_user("Admin@Example.com"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn update_changes_email_and_role_only() {
        let store = Arc::new(MemoryUserStore::from_users(vec![
            record(1, "admin@example.com", "admin"),
            record(5, "five@example.com", "viewer"),
        ]));
        let directory = UserDirectory::new(store).expect("directory");

        let affected = directory
            .update(
                5,
                UserUpdate {
                    email: "a@b.com".to_string(),
                    role: "editor".to_string(),
                },
            )
            .await
            .expect("update");
        assert_eq!(affected, 1);

        let updated = directory.find(5).expect("find").expect("user");
        assert_eq!(updated.email, "a@b.com");
        assert_eq!(updated.role, "editor");
        assert_eq!(updated.password_hash, "hash-5");
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_id_affect_nothing() {
        let store = Arc::new(MemoryUserStore::from_users(vec![record(
            1,
            "admin@example.com",
            "admin",
        )]));
        let directory = UserDirectory::new(store).expect("directory");

        let update = UserUpdate {
            email: "x@y.com".to_string(),
            role: "admin".to_string(),
        };
        assert_eq!(directory.update(99, update).await.expect("update"), 0);
        assert_eq!(directory.delete(99).await.expect("delete"), 0);
        assert_eq!(directory.list().expect("list").len(), 1);
    }

    #[tokio::test]
    async fn update_rejects_email_of_another_user() {
        let store = Arc::new(MemoryUserStore::from_users(vec![
            record(1, "admin@example.com", "admin"),
            record(2, "two@example.com", "viewer"),
        ]));
        let directory = UserDirectory::new(store).expect("directory");

        let err = directory
            .update(
                2,
                UserUpdate {
                    email: "admin@example.com".to_string(),
                    role: "viewer".to_string(),
                },
            )
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::DuplicateEmail(_)));

        // Keeping one's own email is not a conflict.
        let affected = directory
            .update(
                2,
                UserUpdate {
                    email: "two@example.com".to_string(),
                    role: "admin".to_string(),
                },
            )
            .await
            .expect("update");
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn failed_save_leaves_memory_unchanged() {
        let store = Arc::new(MemoryUserStore::from_users(vec![record(
            1,
            "admin@example.com",
            "admin",
        )]));
        let directory = UserDirectory::new(store.clone()).expect("directory");
        store.fail_saves(true);

        assert!(directory.insert(new_user("a@b.com")).await.is_err());
        assert!(directory.delete(1).await.is_err());
        let users = directory.list().expect("list");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "admin@example.com");
    }

    #[tokio::test]
    async fn insert_first_only_succeeds_on_empty_table() {
        let store = Arc::new(MemoryUserStore::from_users(Vec::new()));
        let directory = UserDirectory::new(store).expect("directory");

        let first = directory
            .insert_first(new_user("a@b.com"))
            .await
            .expect("insert first");
        assert_eq!(first, Some(1));

        let second = directory
            .insert_first(new_user("c@d.com"))
            .await
            .expect("insert first");
        assert_eq!(second, None);
        assert_eq!(directory.list().expect("list").len(), 1);
    }
}
