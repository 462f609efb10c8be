//! Authentication: signing keys, session tokens, password hashes and the
//! extractors that gate routes by role.

pub mod gate;
pub mod keys;
pub mod password;
pub mod token;

pub use gate::{AdminUser, CurrentUser, ManagerUser, SESSION_COOKIE};
pub use keys::{KeyError, KeyManager};
pub use password::{
    check_password_strength, hash_password, hash_password_async, verify_login, verify_password,
    MIN_PASSWORD_LEN,
};
pub use token::{issue_token, verify_token, IssuedToken, SessionClaims};
