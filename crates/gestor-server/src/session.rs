//! Cookie-keyed in-memory sessions and CSRF tokens.
//!
//! Every request passes through [`middleware`], which loads the session named
//! by the `gestor_session` cookie or starts a new one (setting the cookie on
//! the response). Handlers receive a [`SessionHandle`] through request
//! extensions. A new session always carries a random `_token`, the value
//! `@csrf` renders and mutating forms must send back.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::middleware::Next;
use axum::response::Response;
use gestor_template::CSRF_TOKEN_KEY;
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "gestor_session";

/// Idle time after which a session is dropped (24 hours).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

/// Session key of the one-shot flash message.
const FLASH_KEY: &str = "_flash";

#[derive(Debug)]
struct Entry {
    data: HashMap<String, String>,
    last_seen: Instant,
}

/// Session data of every live session.
///
/// A session not seen for longer than the store's TTL is expired: lookups
/// treat it as unknown and [`SessionStore::start`] evicts it.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    /// Create an empty store with [`DEFAULT_SESSION_TTL`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store expiring sessions idle for longer than `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Idle lifetime of a session.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session with a fresh CSRF token and return its id.
    ///
    /// Expired sessions are evicted first.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn start(&self) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let data = HashMap::from([(CSRF_TOKEN_KEY.to_owned(), Uuid::new_v4().to_string())]);

        let mut sessions = self.sessions.write().unwrap();
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) <= self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "expired sessions evicted");
        }
        sessions.insert(id.clone(), Entry { data, last_seen: now });
        id
    }

    /// Whether a live session with `id` exists, marking it as seen.
    ///
    /// An expired session is removed and reported as missing.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn touch(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        let now = Instant::now();
        match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_seen) <= self.ttl => {
                entry.last_seen = now;
                true
            }
            Some(_) => {
                sessions.remove(id);
                false
            }
            None => false,
        }
    }

    /// Number of stored sessions, expired ones not yet evicted included.
    ///
    /// # Panics
    ///
    /// Panics if the store lock is poisoned.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Whether no session is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with<R>(&self, id: &str, f: impl FnOnce(&mut HashMap<String, String>) -> R) -> Option<R> {
        self.sessions
            .write()
            .unwrap()
            .get_mut(id)
            .map(|entry| f(&mut entry.data))
    }
}

/// Access to one session, handed to request handlers.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    store: Arc<SessionStore>,
}

impl SessionHandle {
    /// Handle for an existing session id.
    #[must_use]
    pub fn new(id: String, store: Arc<SessionStore>) -> Self {
        Self { id, store }
    }

    /// Session id, as sent in the cookie.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Store `value` under `key`.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        self.store.with(&self.id, |data| data.insert(key.to_owned(), value));
    }

    /// Whether `key` is set.
    pub fn has(&self, key: &str) -> bool {
        self.store
            .with(&self.id, |data| data.contains_key(key))
            .unwrap_or(false)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.store.with(&self.id, |data| data.remove(key)).flatten()
    }

    /// Drop the whole session. Later calls on this handle see no data.
    pub fn destroy(&self) {
        self.store.sessions.write().unwrap().remove(&self.id);
    }

    /// Keep `message` for the next page that calls [`Self::take_flash`].
    pub fn flash(&self, message: impl Into<String>) {
        self.set(FLASH_KEY, message);
    }

    /// The pending flash message, cleared on read.
    pub fn take_flash(&self) -> Option<String> {
        self.remove(FLASH_KEY)
    }

    /// The session's CSRF token.
    pub fn csrf_token(&self) -> Option<String> {
        gestor_template::Session::get(self, CSRF_TOKEN_KEY)
    }

    /// Check a submitted `_token` against the session token.
    pub fn verify_csrf(&self, submitted: Option<&str>) -> Result<(), ServerError> {
        match (self.csrf_token(), submitted) {
            (Some(expected), Some(submitted)) if expected == submitted => Ok(()),
            _ => Err(ServerError::CsrfMismatch),
        }
    }
}

impl gestor_template::Session for SessionHandle {
    fn get(&self, key: &str) -> Option<String> {
        self.store
            .with(&self.id, |data| data.get(key).cloned())
            .flatten()
    }
}

/// Attach a [`SessionHandle`] to the request, starting a session if needed.
pub(crate) async fn middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let existing = cookie_value(&req, SESSION_COOKIE).filter(|id| state.sessions.touch(id));
    let (id, is_new) = match existing {
        Some(id) => (id, false),
        None => (state.sessions.start(), true),
    };

    req.extensions_mut()
        .insert(SessionHandle::new(id.clone(), Arc::clone(&state.sessions)));

    let mut response = next.run(req).await;

    if is_new {
        tracing::debug!(session = %id, "started session");
        let cookie = format!(
            "{SESSION_COOKIE}={id}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            state.sessions.ttl().as_secs()
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

fn cookie_value(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use gestor_template::Session;
    use pretty_assertions::assert_eq;

    use super::*;

    fn handle() -> SessionHandle {
        let store = Arc::new(SessionStore::new());
        let id = store.start();
        SessionHandle::new(id, store)
    }

    #[test]
    fn test_new_session_has_csrf_token() {
        let session = handle();

        let token = session.csrf_token().unwrap();

        assert_eq!(token.len(), 36);
        assert!(session.has(CSRF_TOKEN_KEY));
    }

    #[test]
    fn test_set_get_remove() {
        let session = handle();

        session.set("user", "ana");
        assert_eq!(session.get("user").as_deref(), Some("ana"));
        assert_eq!(session.get_or("missing", "x"), "x");

        assert_eq!(session.remove("user").as_deref(), Some("ana"));
        assert!(!session.has("user"));
        assert_eq!(session.remove("user"), None);
    }

    #[test]
    fn test_flash_is_read_once() {
        let session = handle();

        session.flash("Empresa cadastrada com sucesso.");

        assert_eq!(
            session.take_flash().as_deref(),
            Some("Empresa cadastrada com sucesso.")
        );
        assert_eq!(session.take_flash(), None);
    }

    #[test]
    fn test_destroy() {
        let session = handle();

        session.destroy();

        assert!(session.store.is_empty());
        assert_eq!(session.csrf_token(), None);
        session.set("ignored", "value");
        assert!(!session.has("ignored"));
    }

    #[test]
    fn test_verify_csrf() {
        let session = handle();
        let token = session.csrf_token().unwrap();

        assert!(session.verify_csrf(Some(token.as_str())).is_ok());
        assert!(matches!(session.verify_csrf(Some("forged")), Err(ServerError::CsrfMismatch)));
        assert!(matches!(session.verify_csrf(None), Err(ServerError::CsrfMismatch)));
    }

    #[test]
    fn test_sessions_are_independent() {
        let store = Arc::new(SessionStore::new());
        let a = SessionHandle::new(store.start(), Arc::clone(&store));
        let b = SessionHandle::new(store.start(), Arc::clone(&store));

        a.set("k", "a");

        assert_eq!(store.len(), 2);
        assert_eq!(b.get("k"), None);
        assert_ne!(a.csrf_token(), b.csrf_token());
    }

    #[test]
    fn test_expired_session_is_dropped_and_replaced() {
        let store = Arc::new(SessionStore::with_ttl(Duration::from_millis(20)));
        let old = store.start();
        assert!(store.touch(&old));

        std::thread::sleep(Duration::from_millis(40));

        assert!(!store.touch(&old));
        assert!(store.is_empty());

        let stale = store.start();
        std::thread::sleep(Duration::from_millis(40));
        let fresh = store.start();
        assert_eq!(store.len(), 1);
        assert!(!store.touch(&stale));
        assert!(store.touch(&fresh));
    }

    #[test]
    fn test_touch_keeps_session_alive() {
        let store = SessionStore::with_ttl(Duration::from_millis(200));
        let id = store.start();

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(25));
            assert!(store.touch(&id));
        }
        assert!(!store.touch("unknown"));
    }

    #[test]
    fn test_cookie_value() {
        let req = Request::builder()
            .header(COOKIE, "theme=dark; gestor_session=abc123 ; other=1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(cookie_value(&req, SESSION_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&req, "missing"), None);
    }
}
