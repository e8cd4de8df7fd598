//! Authentication core: secret hashing, OTP challenges, and token issuance.

pub mod otp;
pub mod password;
pub mod tokens;

pub use otp::OtpError;
pub use password::{PasswordError, SecretHasher};
pub use tokens::{bump_token_version, AccessClaims, RefreshClaims, TokenError, TokenIssuer};
