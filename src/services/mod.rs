pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, Identity, SessionToken};
pub use auth_service_impl::TokenAuthService;

pub mod credentials;
pub use credentials::{ConfigCredentialStore, CredentialStore};

pub mod password;
pub use password::{hash_password, verify_password};

pub mod token;
pub use token::{Claims, TokenError, TokenSettings};
