//! Cookie-keyed login sessions with a single-use login grant.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Per-session login state.
///
/// `LoggedOut --login--> LoggedInOnce --protected access--> LoggedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginState {
    #[default]
    LoggedOut,
    LoggedInOnce,
}

impl LoginState {
    pub fn on_login(self) -> Self { LoginState::LoggedInOnce }

    /// Next state and whether access is granted.
    pub fn on_protected_access(self) -> (Self, bool) {
        match self {
            LoginState::LoggedInOnce => (LoginState::LoggedOut, true),
            LoginState::LoggedOut => (LoginState::LoggedOut, false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self { Self(Uuid::new_v4().simple().to_string()) }

    /// Only ids we could have issued are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::try_parse(raw).ok().map(|u| Self(u.simple().to_string()))
    }

    pub fn from_jar(jar: &CookieJar, cookie_name: &str) -> Option<Self> {
        jar.get(cookie_name).and_then(|c| Self::parse(c.value()))
    }

    pub fn cookie(&self, cookie_name: &str) -> Cookie<'static> {
        Cookie::build((cookie_name.to_string(), self.0.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    state: LoginState,
    issued_at: Instant,
}

/// Only sessions holding an unconsumed, unexpired login are kept; absence means `LoggedOut`.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<SessionId, SessionEntry>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self { Self { inner: Arc::new(RwLock::new(HashMap::new())), ttl } }

    fn expired(&self, e: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(e.issued_at) >= self.ttl
    }

    pub fn state(&self, id: &SessionId) -> LoginState {
        let now = Instant::now();
        self.inner.read().get(id).filter(|e| !self.expired(e, now)).map(|e| e.state).unwrap_or_default()
    }

    /// Issue a fresh id for a successful login. The id the client came with, if any,
    /// is dropped and never carries the grant. Expired entries are pruned here.
    pub fn login(&self, previous: Option<&SessionId>) -> SessionId {
        let id = SessionId::generate();
        let now = Instant::now();
        let mut map = self.inner.write();
        if let Some(prev) = previous { map.remove(prev); }
        map.retain(|_, e| !self.expired(e, now));
        map.insert(id.clone(), SessionEntry { state: LoginState::default().on_login(), issued_at: now });
        id
    }

    /// Apply a protected-page access. Returns whether access is granted.
    pub fn consume_login(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        let mut map = self.inner.write();
        let Some(entry) = map.remove(id) else { return false };
        if self.expired(&entry, now) { return false; }
        let (next, granted) = entry.state.on_protected_access();
        if next != LoginState::LoggedOut {
            map.insert(id.clone(), SessionEntry { state: next, ..entry });
        }
        granted
    }

    pub fn len(&self) -> usize { self.inner.read().len() }
    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }
}
