//! Authentication core: brute-force lockout, credential checks, token
//! issuance and the revocable session lifecycle.
//!
//! Nothing in here knows about HTTP. Failures are [`crate::error::AuthError`]
//! values and the route layer decides how they look on the wire.

pub mod attempts;
pub mod gate;
pub mod lockout;
pub mod password;
pub mod service;
pub mod session;
pub mod token;

pub use attempts::{identity_digest, normalize_identity, AttemptCounter};
pub use gate::{extract_bearer, AuthGate};
pub use lockout::{lockout_duration, FailureOutcome, LockStatus, LockoutPolicy};
pub use password::{hash_password, verify_password, PasswordError};
pub use service::AuthService;
pub use session::{SessionRole, SessionStore};
pub use token::{Claims, TokenIssuer, TokenPair};
