//! Session manager: the public authentication protocol
//!
//! Ties together PIN validation, the lockout window, the attempt counter, the
//! login transport and the session store. One instance is built at start-up
//! and shared (e.g. in an `Arc`) with every caller.
//!
//! # State machine
//!
//! - `Unlocked(attempts < max)` --max-th failure--> `Locked(sequence + 1)`
//! - `Locked` --window elapses, seen on next check--> `Unlocked(attempts = 0)`
//! - `Unlocked` --successful login--> `Unlocked(attempts = 0, sequence = 0)`
//!
//! The check-increment-login-evaluate sequence runs under a single async
//! mutex, so at most one attempt is in flight at a time.

use crate::attempts::AttemptCounter;
use crate::clock::{Clock, SystemClock};
use crate::error::{format_lockout_time, AuthError, AuthResult, InitError, LoginFailure};
use crate::lockout::{LockoutInfo, LockoutState};
use crate::pin::Pin;
use crate::session::SessionStore;
use crate::storage::{FileStore, KeyValueStore};
use crate::transport::{HttpLoginTransport, LoginTransport, SESSION_COOKIE};
use camconnect_core::AuthConfig;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Diagnostic snapshot of the authentication state
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub session_valid: bool,
    pub pin_attempts: u32,
    pub max_pin_attempts: u32,
    pub lockout: LockoutInfo,
    pub token_length: Option<usize>,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authenticated: {}", self.authenticated)?;
        write!(
            f,
            ", PIN Attempts: {}/{}",
            self.pin_attempts, self.max_pin_attempts
        )?;
        write!(f, ", Session Valid: {}", self.session_valid)?;
        if self.lockout.is_locked_out {
            write!(
                f,
                ", Locked Out: {} remaining, Sequence: {}",
                format_lockout_time(self.lockout.remaining),
                self.lockout.sequence_count
            )?;
        }
        if let Some(len) = self.token_length {
            write!(f, ", Token Length: {}", len)?;
        }
        Ok(())
    }
}

/// Authentication facade
pub struct SessionManager {
    config: AuthConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn LoginTransport>,
    sessions: SessionStore,
    attempts: Arc<AttemptCounter>,
    lockout: LockoutState,
    /// Held for the whole of an authentication attempt
    auth_lock: Mutex<()>,
}

impl SessionManager {
    /// Build the manager from its collaborators, restoring persisted state
    pub async fn initialize(
        config: AuthConfig,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn LoginTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = SessionStore::load(store.clone(), config.session_timeout, clock.now()).await;
        let attempts = Arc::new(AttemptCounter::load(store.clone()).await);
        let lockout = LockoutState::new(store, attempts.clone());

        info!("SessionManager initialized");
        Self {
            config,
            clock,
            transport,
            sessions,
            attempts,
            lockout,
            auth_lock: Mutex::new(()),
        }
    }

    /// Build the manager with the file store, HTTP transport and system clock
    pub async fn open(config: AuthConfig) -> Result<Self, InitError> {
        config.validate()?;
        let path = config.resolved_state_path()?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::with_path(path).await?);
        let transport: Arc<dyn LoginTransport> = Arc::new(HttpLoginTransport::from_config(&config)?);
        Ok(Self::initialize(config, store, transport, Arc::new(SystemClock)).await)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate with a 4-digit PIN.
    ///
    /// Format errors and lockout rejections do not consume an attempt. Every
    /// other outcome does, and the attempt is recorded before the login
    /// request goes out.
    pub async fn authenticate(&self, pin: &str) -> AuthResult<()> {
        let pin = Pin::parse(pin)?;

        let _guard = self.auth_lock.lock().await;

        let lockout = self.check_lockout().await;
        if lockout.is_locked_out {
            debug!(
                "Authentication rejected, locked out for {}",
                format_lockout_time(lockout.remaining)
            );
            return Err(AuthError::LockedOut {
                remaining: lockout.remaining,
            });
        }

        let attempt = self.attempts.increment().await;
        debug!(
            "Attempting authentication with PIN (attempt {}/{})",
            attempt, self.config.max_pin_attempts
        );

        let result = match tokio::time::timeout(
            self.config.login_timeout,
            self.transport.login(&pin),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LoginFailure::NetworkError("login request timed out".to_string())),
        };

        match result {
            Ok(token) => {
                self.sessions.store(token, self.clock.now()).await;
                self.lockout.clear_all().await;
                info!("Authentication successful");
                Ok(())
            }
            Err(failure) => {
                warn!("Authentication failed: {}", failure);
                if self.attempts.get() >= self.config.max_pin_attempts {
                    self.lockout.begin_lockout(self.clock.now()).await;
                }
                Err(failure.into())
            }
        }
    }

    /// Current lockout, clearing an elapsed window.
    ///
    /// A counter already at the ceiling without an open window (the process
    /// stopped between recording an attempt and opening the window) opens
    /// the window now.
    async fn check_lockout(&self) -> LockoutInfo {
        let now = self.clock.now();
        let info = self.lockout.reconcile(now).await;
        if !info.is_locked_out && self.attempts.get() >= self.config.max_pin_attempts {
            warn!("Attempt ceiling reached without a lockout window, opening one");
            return self.lockout.begin_lockout(now).await;
        }
        info
    }

    /// Session token if authenticated
    pub fn session_token(&self) -> Option<String> {
        self.sessions.read(self.clock.now())
    }

    /// Cookie header value (`session=<token>`) for requests to the camera
    pub fn session_cookie(&self) -> Option<String> {
        self.session_token()
            .map(|token| format!("{}={}", SESSION_COOKIE, token))
    }

    pub fn is_authenticated(&self) -> bool {
        self.sessions.is_valid(self.clock.now())
    }

    /// Whether a PIN submission would currently be attempted
    pub async fn can_attempt_pin(&self) -> bool {
        let info = self.lockout.reconcile(self.clock.now()).await;
        !info.is_locked_out && self.attempts.get() < self.config.max_pin_attempts
    }

    /// Lockout status, clearing an elapsed window
    pub async fn current_lockout_info(&self) -> LockoutInfo {
        self.lockout.reconcile(self.clock.now()).await
    }

    /// Attempts used in the current sequence
    pub fn pin_attempts(&self) -> u32 {
        self.attempts.get()
    }

    /// Clear attempts and every lockout window (manual override)
    pub async fn reset_pin_attempts(&self) {
        let _guard = self.auth_lock.lock().await;
        self.lockout.clear_all().await;
        debug!("PIN attempts reset (manual)");
    }

    /// Forget the session; lockout state is left untouched
    pub async fn logout(&self) {
        self.sessions.clear().await;
    }

    /// Alias of [`SessionManager::logout`]
    pub async fn clear_session(&self) {
        self.logout().await;
    }

    pub async fn session_status(&self) -> SessionStatus {
        let lockout = self.current_lockout_info().await;
        let now = self.clock.now();
        let session_valid = self.sessions.is_valid(now);
        SessionStatus {
            authenticated: session_valid,
            session_valid,
            pin_attempts: self.attempts.get(),
            max_pin_attempts: self.config.max_pin_attempts,
            lockout,
            token_length: self.sessions.session().map(|s| s.token.len()),
        }
    }
}
