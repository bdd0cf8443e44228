// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

use super::pending::{PendingAction, PendingCommand};
use crate::config::SessionConfig;
use crate::users::UserId;
use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

const SESSION_CHANNEL_DEPTH: usize = 256;
const SESSION_ID_PREFIX: &str = "uds_";
const SESSION_ID_BYTES: usize = 32;
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Unavailable,
    UnknownSession,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Unavailable => write!(f, "Session store is unavailable"),
            SessionError::UnknownSession => write!(f, "Session has expired or does not exist"),
        }
    }
}

impl std::error::Error for SessionError {}

/// What a request sees of its session after `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub actor_id: Option<UserId>,
    /// Form token of a signed-in session.
    pub csrf_token: Option<String>,
    /// True when a new session id was minted for this request.
    pub created: bool,
}

/// Server-side sessions owned by one background task. Every operation is a
/// single message, so each is atomic with respect to concurrent requests.
///
/// Anonymous visitors only carry an id in their cookie. A record is kept
/// once the session is signed in, so unauthenticated traffic never grows the
/// store or evicts signed-in sessions. Expired records are swept on a timer.
#[derive(Clone)]
pub struct SessionStore {
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_DEPTH);
        let ttl = Duration::from_secs(config.ttl_seconds);
        let max_sessions = config.max_sessions;
        tokio::spawn(async move {
            let mut state = SessionState::new(ttl, max_sessions);
            state.run(receiver, CLEANUP_INTERVAL).await;
        });
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, receive) = oneshot::channel();
        if self.sender.send(build(reply)).await.is_err() {
            return Err(SessionError::Unavailable);
        }
        receive.await.map_err(|_| SessionError::Unavailable)
    }

    /// Resume the session named by the cookie, or mint a new anonymous id.
    pub async fn open(&self, id: Option<String>) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Open { id, reply }).await
    }

    /// Bind an actor to the session. The session id is rotated and the new id returned.
    pub async fn authenticate(&self, id: &str, actor_id: UserId) -> Result<String, SessionError> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::Authenticate {
            id,
            actor_id,
            reply,
        })
        .await?
    }

    pub async fn sign_out(&self, id: &str) -> Result<(), SessionError> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::SignOut { id, reply })
            .await
    }

    /// Record `target_id` as the pending target for `action`, replacing any earlier one.
    pub async fn stage(
        &self,
        id: &str,
        action: PendingAction,
        target_id: UserId,
    ) -> Result<PendingCommand, SessionError> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::Stage {
            id,
            action,
            target_id,
            reply,
        })
        .await?
    }

    pub async fn pending(
        &self,
        id: &str,
        action: PendingAction,
    ) -> Result<Option<PendingCommand>, SessionError> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::Pending { id, action, reply })
            .await?
    }

    /// Clear the slot only if it still holds `command`. Returns whether it was cleared.
    pub async fn clear_if(&self, id: &str, command: &PendingCommand) -> Result<bool, SessionError> {
        let id = id.to_string();
        let command = command.clone();
        self.request(|reply| SessionCommand::ClearIf { id, command, reply })
            .await?
    }
}

enum SessionCommand {
    Open {
        id: Option<String>,
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Authenticate {
        id: String,
        actor_id: UserId,
        reply: oneshot::Sender<Result<String, SessionError>>,
    },
    SignOut {
        id: String,
        reply: oneshot::Sender<()>,
    },
    Stage {
        id: String,
        action: PendingAction,
        target_id: UserId,
        reply: oneshot::Sender<Result<PendingCommand, SessionError>>,
    },
    Pending {
        id: String,
        action: PendingAction,
        reply: oneshot::Sender<Result<Option<PendingCommand>, SessionError>>,
    },
    ClearIf {
        id: String,
        command: PendingCommand,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
}

struct SessionRecord {
    actor_id: UserId,
    csrf_token: String,
    pending: HashMap<PendingAction, PendingCommand>,
    last_seen: Instant,
}

impl SessionRecord {
    fn signed_in(actor_id: UserId, now: Instant) -> Self {
        Self {
            actor_id,
            csrf_token: generate_token(),
            pending: HashMap::new(),
            last_seen: now,
        }
    }
}

struct SessionState {
    sessions: HashMap<String, SessionRecord>,
    session_order: VecDeque<String>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionState {
    fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            session_order: VecDeque::new(),
            ttl,
            max_sessions,
        }
    }

    async fn run(&mut self, mut receiver: mpsc::Receiver<SessionCommand>, sweep_every: Duration) {
        let mut sweep = tokio::time::interval(sweep_every);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let command = tokio::select! {
                command = receiver.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
                _ = sweep.tick() => {
                    self.cleanup_expired(Instant::now());
                    continue;
                }
            };
            let now = Instant::now();
            match command {
                SessionCommand::Open { id, reply } => {
                    let _ = reply.send(self.open(id, now));
                }
                SessionCommand::Authenticate {
                    id,
                    actor_id,
                    reply,
                } => {
                    let _ = reply.send(self.authenticate(&id, actor_id, now));
                }
                SessionCommand::SignOut { id, reply } => {
                    self.remove(&id);
                    let _ = reply.send(());
                }
                SessionCommand::Stage {
                    id,
                    action,
                    target_id,
                    reply,
                } => {
                    let _ = reply.send(self.stage(&id, PendingCommand::new(action, target_id), now));
                }
                SessionCommand::Pending { id, action, reply } => {
                    let _ = reply.send(self.pending(&id, action, now));
                }
                SessionCommand::ClearIf { id, command, reply } => {
                    let _ = reply.send(self.clear_if(&id, &command, now));
                }
            }
        }
    }

    fn open(&mut self, id: Option<String>, now: Instant) -> SessionSnapshot {
        let Some(id) = id.filter(|id| is_session_id(id)) else {
            return SessionSnapshot {
                id: generate_session_id(),
                actor_id: None,
                csrf_token: None,
                created: true,
            };
        };

        match self.live_record(&id, now) {
            Ok(record) => {
                record.last_seen = now;
                SessionSnapshot {
                    actor_id: Some(record.actor_id),
                    csrf_token: Some(record.csrf_token.clone()),
                    id,
                    created: false,
                }
            }
            // Anonymous or expired: keep the id, nothing is stored for it.
            Err(_) => SessionSnapshot {
                id,
                actor_id: None,
                csrf_token: None,
                created: false,
            },
        }
    }

    /// Sign-in always lands on a fresh id; pending targets never carry over.
    fn authenticate(
        &mut self,
        id: &str,
        actor_id: UserId,
        now: Instant,
    ) -> Result<String, SessionError> {
        self.remove(id);
        let rotated = generate_session_id();
        self.insert(rotated.clone(), SessionRecord::signed_in(actor_id, now));
        Ok(rotated)
    }

    fn stage(
        &mut self,
        id: &str,
        command: PendingCommand,
        now: Instant,
    ) -> Result<PendingCommand, SessionError> {
        let record = self.live_record(id, now)?;
        record.last_seen = now;
        record.pending.insert(command.action, command.clone());
        Ok(command)
    }

    fn pending(
        &mut self,
        id: &str,
        action: PendingAction,
        now: Instant,
    ) -> Result<Option<PendingCommand>, SessionError> {
        let record = self.live_record(id, now)?;
        record.last_seen = now;
        Ok(record.pending.get(&action).cloned())
    }

    fn clear_if(
        &mut self,
        id: &str,
        command: &PendingCommand,
        now: Instant,
    ) -> Result<bool, SessionError> {
        let record = self.live_record(id, now)?;
        record.last_seen = now;
        match record.pending.get(&command.action) {
            Some(current) if current == command => {
                record.pending.remove(&command.action);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn live_record(&mut self, id: &str, now: Instant) -> Result<&mut SessionRecord, SessionError> {
        let expired = match self.sessions.get(id) {
            Some(record) => now.duration_since(record.last_seen) >= self.ttl,
            None => return Err(SessionError::UnknownSession),
        };
        if expired {
            self.remove(id);
            return Err(SessionError::UnknownSession);
        }
        self.sessions
            .get_mut(id)
            .ok_or(SessionError::UnknownSession)
    }

    fn insert(&mut self, id: String, record: SessionRecord) {
        self.sessions.insert(id.clone(), record);
        self.session_order.push_back(id);
        self.prune_overflow();
    }

    fn remove(&mut self, id: &str) {
        self.sessions.remove(id);
        self.session_order.retain(|existing| existing != id);
    }

    fn cleanup_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.sessions
            .retain(|_, record| now.duration_since(record.last_seen) < ttl);
        self.session_order
            .retain(|id| self.sessions.contains_key(id));
    }

    fn prune_overflow(&mut self) {
        while self.sessions.len() > self.max_sessions {
            if let Some(oldest) = self.session_order.pop_front() {
                log::debug!("Session limit reached; evicting oldest session");
                self.sessions.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_session_id() -> String {
    format!("{}{}", SESSION_ID_PREFIX, generate_token())
}

/// Only ids this store could have minted are resumed; anything else gets a new one.
fn is_session_id(value: &str) -> bool {
    value
        .strip_prefix(SESSION_ID_PREFIX)
        .and_then(|token| URL_SAFE_NO_PAD.decode(token).ok())
        .is_some_and(|bytes| bytes.len() == SESSION_ID_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(Duration::from_secs(60), 100)
    }

    fn signed_in(state: &mut SessionState, actor_id: UserId, now: Instant) -> String {
        let anonymous = state.open(None, now).id;
        state.authenticate(&anonymous, actor_id, now).expect("auth")
    }

    #[test]
    fn anonymous_open_mints_id_without_storing_it() {
        let mut state = state();
        let now = Instant::now();
        let first = state.open(None, now);
        assert!(first.created);
        assert!(first.id.starts_with("uds_"));
        assert!(is_session_id(&first.id));
        assert_eq!(first.actor_id, None);
        assert!(state.sessions.is_empty());

        let again = state.open(Some(first.id.clone()), now);
        assert!(!again.created);
        assert_eq!(again.id, first.id);

        let forged = state.open(Some("uds_forged".to_string()), now);
        assert!(forged.created);
        assert_ne!(forged.id, "uds_forged");
        assert!(state.sessions.is_empty());
    }

    #[test]
    fn authenticate_rotates_id_and_issues_form_token() {
        let mut state = state();
        let now = Instant::now();
        let anonymous = state.open(None, now).id;

        let rotated = state.authenticate(&anonymous, 1, now).expect("auth");
        assert_ne!(rotated, anonymous);
        assert!(!state.sessions.contains_key(&anonymous));

        let snapshot = state.open(Some(rotated.clone()), now);
        assert_eq!(snapshot.actor_id, Some(1));
        assert!(snapshot.csrf_token.is_some());
        assert!(!snapshot.created);
        assert_eq!(
            state.pending(&rotated, PendingAction::Edit, now).expect("pending"),
            None
        );

        // Signing in again from a signed-in session drops its pending targets.
        state
            .stage(&rotated, PendingCommand::new(PendingAction::Edit, 5), now)
            .expect("stage");
        let again = state.authenticate(&rotated, 1, now).expect("auth");
        assert!(!state.sessions.contains_key(&rotated));
        assert_eq!(
            state.pending(&again, PendingAction::Edit, now).expect("pending"),
            None
        );
    }

    #[test]
    fn anonymous_ids_cannot_stage() {
        let mut state = state();
        let now = Instant::now();
        let anonymous = state.open(None, now).id;
        assert_eq!(
            state.stage(&anonymous, PendingCommand::new(PendingAction::Delete, 5), now),
            Err(SessionError::UnknownSession)
        );
    }

    #[test]
    fn stage_overwrites_and_slots_are_independent() {
        let mut state = state();
        let now = Instant::now();
        let id = signed_in(&mut state, 1, now);

        state
            .stage(&id, PendingCommand::new(PendingAction::Edit, 5), now)
            .expect("stage");
        state
            .stage(&id, PendingCommand::new(PendingAction::Edit, 7), now)
            .expect("stage");
        state
            .stage(&id, PendingCommand::new(PendingAction::Delete, 9), now)
            .expect("stage");

        let edit = state.pending(&id, PendingAction::Edit, now).expect("edit");
        let delete = state.pending(&id, PendingAction::Delete, now).expect("delete");
        assert_eq!(edit.map(|c| c.target_id), Some(7));
        assert_eq!(delete.map(|c| c.target_id), Some(9));
    }

    #[test]
    fn clear_if_only_clears_matching_command() {
        let mut state = state();
        let now = Instant::now();
        let id = signed_in(&mut state, 1, now);

        let stale = state
            .stage(&id, PendingCommand::new(PendingAction::Delete, 5), now)
            .expect("stage");
        let mut newer = PendingCommand::new(PendingAction::Delete, 6);
        newer.issued_at = stale.issued_at + chrono::Duration::seconds(1);
        state.stage(&id, newer.clone(), now).expect("stage");

        assert!(!state.clear_if(&id, &stale, now).expect("clear"));
        assert_eq!(
            state.pending(&id, PendingAction::Delete, now).expect("pending"),
            Some(newer.clone())
        );
        assert!(state.clear_if(&id, &newer, now).expect("clear"));
        assert_eq!(
            state.pending(&id, PendingAction::Delete, now).expect("pending"),
            None
        );
    }

    #[test]
    fn idle_sessions_expire() {
        let mut state = SessionState::new(Duration::from_secs(10), 100);
        let start = Instant::now();
        let id = signed_in(&mut state, 1, start);
        let later = start + Duration::from_secs(11);

        assert_eq!(
            state.pending(&id, PendingAction::Edit, later),
            Err(SessionError::UnknownSession)
        );
        assert_eq!(state.open(Some(id), later).actor_id, None);
    }

    #[test]
    fn cleanup_sweeps_only_expired_records() {
        let mut state = SessionState::new(Duration::from_secs(10), 100);
        let start = Instant::now();
        let idle = signed_in(&mut state, 1, start);
        let active = signed_in(&mut state, 2, start);
        state
            .pending(&active, PendingAction::Edit, start + Duration::from_secs(8))
            .expect("touch");

        state.cleanup_expired(start + Duration::from_secs(12));
        assert!(!state.sessions.contains_key(&idle));
        assert!(state.sessions.contains_key(&active));
        assert_eq!(state.session_order.len(), 1);
    }

    #[test]
    fn overflow_evicts_oldest_signed_in_session() {
        let mut state = SessionState::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        let first = signed_in(&mut state, 1, now);
        let second = signed_in(&mut state, 2, now);
        let third = signed_in(&mut state, 3, now);

        assert!(!state.sessions.contains_key(&first));
        assert!(state.sessions.contains_key(&second));
        assert!(state.sessions.contains_key(&third));
        assert_eq!(state.session_order.len(), 2);
    }

    #[test]
    fn anonymous_traffic_never_evicts_signed_in_sessions() {
        let mut state = SessionState::new(Duration::from_secs(60), 2);
        let now = Instant::now();
        let id = signed_in(&mut state, 1, now);
        let staged = state
            .stage(&id, PendingCommand::new(PendingAction::Delete, 5), now)
            .expect("stage");

        for _ in 0..1_000 {
            state.open(None, now);
        }

        assert_eq!(state.sessions.len(), 1);
        assert_eq!(
            state.pending(&id, PendingAction::Delete, now).expect("pending"),
            Some(staged)
        );
    }

    #[tokio::test]
    async fn store_round_trip_through_task() {
        let store = SessionStore::new(&SessionConfig::default());
        let opened = store.open(None).await.expect("open");
        let id = store.authenticate(&opened.id, 1).await.expect("auth");
        let staged = store
            .stage(&id, PendingAction::Edit, 5)
            .await
            .expect("stage");
        assert_eq!(
            store.pending(&id, PendingAction::Edit).await.expect("pending"),
            Some(staged.clone())
        );
        assert!(store.clear_if(&id, &staged).await.expect("clear"));
        store.sign_out(&id).await.expect("sign out");
        assert_eq!(
            store.pending(&id, PendingAction::Edit).await,
            Err(SessionError::UnknownSession)
        );
    }
}
