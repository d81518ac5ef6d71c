//! credential stub for the dashboard login screen.
//!
//! there is no user store: one configured email/password pair is accepted
//! and every success hands out the same opaque mock token.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{Error, Result};

const MOCK_ACCESS_TOKEN: &str = "mock-access-token";
const MOCK_REFRESH_TOKEN: &str = "mock-refresh-token";
const TOKEN_TTL_SECONDS: u64 = 3600;

#[derive(Deserialize, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub user: User,
}

fn user_for(id: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        name: email.split('@').next().unwrap_or(email).to_string(),
        created_at: Utc::now().to_rfc3339(),
    }
}

fn issue(user: User) -> TokenResponse {
    TokenResponse {
        access_token: MOCK_ACCESS_TOKEN.to_string(),
        token_type: "bearer".to_string(),
        expires_in: TOKEN_TTL_SECONDS,
        refresh_token: MOCK_REFRESH_TOKEN.to_string(),
        user,
    }
}

/// sign in against the single configured account
pub fn sign_in(config: &AuthConfig, credentials: &Credentials) -> Result<TokenResponse> {
    if credentials.email == config.email && credentials.password == config.password {
        tracing::info!(email = %credentials.email, "sign-in accepted");
        Ok(issue(user_for("1", &config.email)))
    } else {
        tracing::warn!(email = %credentials.email, "sign-in rejected");
        Err(Error::Unauthorized("credential mismatch".into()))
    }
}

/// accept any well-formed sign-up; nothing is persisted
pub fn sign_up(credentials: &Credentials) -> Result<TokenResponse> {
    let email = credentials.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::Validation("a valid email is required".into()));
    }
    if credentials.password.is_empty() {
        return Err(Error::Validation("password must not be empty".into()));
    }
    let id = uuid::Uuid::new_v4().to_string();
    Ok(issue(user_for(&id, email)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials { email: email.into(), password: password.into() }
    }

    #[test]
    fn configured_pair_signs_in() {
        let token = sign_in(&AuthConfig::default(), &creds("test@lablink.com", "password")).unwrap();
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(token.user.name, "test");
    }

    #[test]
    fn wrong_password_is_unauthorized() {
        let err = sign_in(&AuthConfig::default(), &creds("test@lablink.com", "nope")).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn sign_up_requires_an_email() {
        assert!(sign_up(&creds("not-an-email", "pw")).is_err());
        assert!(sign_up(&creds("a@b.c", "")).is_err());
        assert_eq!(sign_up(&creds("ada@lab.io", "pw")).unwrap().user.name, "ada");
    }
}
