use std::cell::RefCell;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::cookie::{time, Cookie, CookieBuilder, SameSite};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use log::{info, warn};
use moka::sync::Cache;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::CurrentUser;
use crate::utils::csrf::{looks_like_token, random_token, tokens_match};

pub const SESSION_COOKIE: &str = "fittracker_session";
pub const REMEMBER_COOKIE: &str = "remember_token";
pub const REMEMBER_DAYS: i64 = 30;

const MAX_SESSIONS: u64 = 100_000;

#[derive(Clone, Debug, Default)]
pub struct SessionData {
    pub user_id: Option<Uuid>,
    pub csrf_token: Option<String>,
}

/// Server-side session state keyed by the id in the session cookie.
/// Entries expire after the configured idle time.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, SessionData>,
}

impl SessionStore {
    pub fn new(idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle)
            .build();
        Self { cache }
    }

    fn load(&self, id: &str) -> Option<SessionData> {
        self.cache.get(id)
    }

    fn save(&self, id: &str, data: SessionData) {
        self.cache.insert(id.to_string(), data);
    }

    fn remove(&self, id: &str) {
        self.cache.invalidate(id);
    }
}

#[derive(Debug, PartialEq)]
enum RememberCookie {
    Keep,
    Set(String),
    Remove,
}

struct SessionState {
    id: String,
    data: SessionData,
    // The client already holds `id` in its cookie.
    known_to_client: bool,
    send_id: bool,
    remove_cookie: bool,
    remember: RememberCookie,
}

/// Request-scoped handle on the caller's session. Installed by
/// [`session_middleware`] and extracted by handlers.
#[derive(Clone)]
pub struct Session {
    store: SessionStore,
    state: Rc<RefCell<SessionState>>,
}

impl Session {
    /// Resumes the session named by `cookie_id`, or starts a fresh one that is
    /// only stored once something is written to it.
    pub fn resume(store: SessionStore, cookie_id: Option<&str>) -> Self {
        let resumed = cookie_id.and_then(|id| store.load(id).map(|data| (id.to_string(), data)));
        let (id, data, known_to_client) = match resumed {
            Some((id, data)) => (id, data, true),
            None => (random_token(), SessionData::default(), false),
        };

        Session {
            store,
            state: Rc::new(RefCell::new(SessionState {
                id,
                data,
                known_to_client,
                send_id: false,
                remove_cookie: false,
                remember: RememberCookie::Keep,
            })),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.state.borrow().data.user_id
    }

    pub fn is_logged_in(&self) -> bool {
        self.user_id().is_some()
    }

    /// Returns the authenticated user id, or an error that redirects to the login page.
    pub fn require_login(&self, config: &Config) -> Result<Uuid, AppError> {
        self.user_id()
            .ok_or_else(|| AppError::LoginRequired(config.url("/login")))
    }

    /// The session's CSRF token, generated on first use.
    pub fn csrf_token(&self) -> String {
        if let Some(token) = self.state.borrow().data.csrf_token.clone() {
            return token;
        }

        let token = random_token();
        self.state.borrow_mut().data.csrf_token = Some(token.clone());
        self.persist();
        token
    }

    pub fn verify_csrf(&self, candidate: &str) -> Result<(), AppError> {
        let state = self.state.borrow();
        match state.data.csrf_token.as_deref() {
            Some(expected) if tokens_match(expected, candidate) => Ok(()),
            _ => {
                warn!("CSRF validation failed");
                Err(AppError::Forbidden("CSRF validation failed".to_string()))
            }
        }
    }

    /// Marks the session authenticated under a fresh id.
    pub fn log_in(&self, user_id: Uuid) {
        {
            let mut state = self.state.borrow_mut();
            self.store.remove(&state.id);
            state.id = random_token();
            state.known_to_client = false;
            state.data.user_id = Some(user_id);
        }
        self.persist();
    }

    pub fn remember(&self, token: String) {
        self.state.borrow_mut().remember = RememberCookie::Set(token);
    }

    pub fn forget_remembered(&self) {
        self.state.borrow_mut().remember = RememberCookie::Remove;
    }

    /// Drops all session state and tells the client to discard its cookie.
    pub fn purge(&self) {
        let mut state = self.state.borrow_mut();
        self.store.remove(&state.id);
        state.data = SessionData::default();
        state.send_id = false;
        state.remove_cookie = state.known_to_client;
    }

    pub async fn current_user(&self, pool: &PgPool) -> Result<Option<CurrentUser>, AppError> {
        match self.user_id() {
            Some(user_id) => CurrentUser::fetch(pool, user_id).await,
            None => Ok(None),
        }
    }

    fn persist(&self) {
        let mut state = self.state.borrow_mut();
        self.store.save(&state.id, state.data.clone());
        if !state.known_to_client {
            state.known_to_client = true;
            state.send_id = true;
            state.remove_cookie = false;
        }
    }

    /// Cookies the response must carry for this session.
    fn outgoing_cookies(&self, config: &Config) -> Vec<Cookie<'static>> {
        let state = self.state.borrow();
        let mut cookies = Vec::new();

        if state.send_id {
            cookies.push(cookie(SESSION_COOKIE, state.id.clone(), config).finish());
        } else if state.remove_cookie {
            cookies.push(removal(SESSION_COOKIE, config));
        }

        match &state.remember {
            RememberCookie::Keep => {}
            RememberCookie::Set(token) => cookies.push(
                cookie(REMEMBER_COOKIE, token.clone(), config)
                    .max_age(time::Duration::days(REMEMBER_DAYS))
                    .finish(),
            ),
            RememberCookie::Remove => cookies.push(removal(REMEMBER_COOKIE, config)),
        }

        cookies
    }
}

fn cookie(name: &'static str, value: String, config: &Config) -> CookieBuilder<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
}

fn removal(name: &'static str, config: &Config) -> Cookie<'static> {
    let mut cookie = cookie(name, String::new(), config).finish();
    cookie.make_removal();
    cookie
}

impl FromRequest for Session {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(req.extensions().get::<Session>().cloned().ok_or_else(|| {
            AppError::InternalServerError("session middleware is not installed".to_string())
        }))
    }
}

/// Loads the session for every request, restores remembered logins, and
/// writes the session cookies back on the response.
pub async fn session_middleware(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let store = req
        .app_data::<web::Data<SessionStore>>()
        .ok_or_else(|| AppError::InternalServerError("session store is not configured".to_string()))?
        .get_ref()
        .clone();
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::InternalServerError("config is not registered".to_string()))?
        .clone();

    let cookie_id = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    let session = Session::resume(store, cookie_id.as_deref());

    if !session.is_logged_in() {
        if let Some(token) = req.cookie(REMEMBER_COOKIE) {
            if let Some(pool) = req.app_data::<web::Data<PgPool>>() {
                restore_remembered(&session, pool, token.value()).await;
            }
        }
    }

    req.extensions_mut().insert(session.clone());

    let mut res = next.call(req).await?;
    for cookie in session.outgoing_cookies(&config) {
        res.response_mut().add_cookie(&cookie)?;
    }
    Ok(res)
}

async fn restore_remembered(session: &Session, pool: &PgPool, token: &str) {
    if !looks_like_token(token) {
        session.forget_remembered();
        return;
    }

    let user_id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM utenti WHERE remember_token = $1 AND token_expiry > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await;

    match user_id {
        Ok(Some(user_id)) => {
            info!("Restored remembered login for user {}", user_id);
            session.log_in(user_id);
        }
        Ok(None) => session.forget_remembered(),
        Err(e) => warn!("Remember-me lookup failed: {}", e),
    }
}
