//! CamConnect Auth - PIN login, session storage and brute-force lockout
//!
//! Authenticates against the camera's login endpoint with a 4-digit PIN and
//! keeps the returned session token across restarts. Failed attempts are
//! counted and, once the ceiling is reached, further attempts are refused for
//! an exponentially growing window.
//!
//! # Flow
//!
//! 1. `SessionManager::authenticate` validates the PIN format
//! 2. An active lockout window rejects the attempt without a network call
//! 3. The attempt is recorded, then `POST /api/login` is sent
//! 4. On success the session token is stored and all counters are reset
//! 5. On failure the third attempt in a sequence opens a lockout window
//!
//! # Example
//!
//! ```no_run
//! use camconnect_auth::SessionManager;
//! use camconnect_core::AuthConfig;
//!
//! async fn example() {
//!     let manager = SessionManager::open(AuthConfig::default()).await.unwrap();
//!
//!     match manager.authenticate("1234").await {
//!         Ok(()) => println!("Cookie: {}", manager.session_cookie().unwrap()),
//!         Err(e) => println!("Login failed: {}", e),
//!     }
//! }
//! ```

pub mod attempts;
pub mod clock;
pub mod error;
pub mod lockout;
pub mod manager;
pub mod pin;
pub mod policy;
pub mod session;
pub mod storage;
pub mod transport;

pub use attempts::AttemptCounter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{format_lockout_time, AuthError, AuthResult, InitError, LoginFailure};
pub use lockout::{LockoutInfo, LockoutState, LockoutStatus};
pub use manager::{SessionManager, SessionStatus};
pub use pin::Pin;
pub use policy::{LockoutPolicy, LOCKOUT_DURATIONS};
pub use session::{Session, SessionStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageResult, StoreEdit};
pub use transport::{extract_session_token, HttpLoginTransport, LoginTransport, SESSION_COOKIE};
