//! Session tokens: ES256 JWTs carrying the user and the tenant they act for.

use std::path::Path;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{RequestContext, TenantContext};

use crate::namespace::TenantUser;

/// Tokens this close to expiry are reissued by [`TokenManager::refresh_token`].
pub const TOKEN_REFRESH_WINDOW_SECS: i64 = 180;

fn default_session_lifetime() -> i64 { 3600 }

/// Signing material for session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// PKCS#8 PEM of the EC P-256 signing key.
    pub private_key_pem: String,
    /// PEM of the matching public key. Verification needs only this.
    pub public_key_pem: String,
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_secs: i64,
}

impl AuthConfig {
    pub fn from_pem_files(private_key: &Path, public_key: &Path) -> Result<Self> {
        Ok(Self {
            private_key_pem: std::fs::read_to_string(private_key)?,
            public_key_pem: std::fs::read_to_string(public_key)?,
            session_lifetime_secs: default_session_lifetime(),
        })
    }
}

/// The user embedded in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl From<&TenantUser> for SessionUser {
    fn from(user: &TenantUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.roles.clone(),
        }
    }
}

/// JWT claims. An empty `tenant_id` means the session has no tenant binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user: SessionUser,
    #[serde(default)]
    pub tenant_id: String,
    pub exp: i64,
}

impl SessionClaims {
    pub fn tenant(&self) -> TenantContext {
        TenantContext::from_claim(&self.tenant_id)
    }
}

/// Where a token sits in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// Verifies and is not due for rotation.
    Valid,
    /// Verifies and expires within the refresh window.
    Refreshable,
    /// Signature checks out but the expiry has passed.
    Expired,
    /// Malformed or signed by another key.
    Invalid,
}

/// Issues, refreshes, and verifies session tokens.
///
/// Keys are parsed on every call so a bad key surfaces as
/// [`TenantryError::Key`] from the operation that needed it.
pub struct TokenManager {
    config: AuthConfig,
}

impl TokenManager {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn session_lifetime_secs(&self) -> i64 {
        self.config.session_lifetime_secs
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_ec_pem(self.config.private_key_pem.as_bytes())
            .map_err(|e| TenantryError::Key(format!("parsing EC private key: {e}")))
    }

    fn decoding_key(&self) -> Result<DecodingKey> {
        DecodingKey::from_ec_pem(self.config.public_key_pem.as_bytes())
            .map_err(|e| TenantryError::Key(format!("parsing EC public key: {e}")))
    }

    fn validation(validate_exp: bool) -> Validation {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String> {
        let key = self.encoding_key()?;
        encode(&Header::new(Algorithm::ES256), claims, &key).map_err(|e| match e.kind() {
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => TenantryError::Key(e.to_string()),
            _ => TenantryError::Signing(e.to_string()),
        })
    }

    fn decode(&self, token: &str, validate_exp: bool) -> Result<SessionClaims> {
        let key = self.decoding_key()?;
        decode::<SessionClaims>(token, &key, &Self::validation(validate_exp))
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => TenantryError::Key(e.to_string()),
                _ => {
                    tracing::debug!(error = %e, "token rejected");
                    TenantryError::InvalidToken
                }
            })
    }

    /// Sign a session for `user`, bound to the tenant in `ctx`.
    pub fn issue_token(&self, ctx: &RequestContext, user: &SessionUser, expires_at: DateTime<Utc>) -> Result<String> {
        if !ctx.tenant.is_bound() {
            tracing::warn!(user = %user.id, "issuing session token without a tenant binding");
        }
        self.sign(&SessionClaims {
            user: user.clone(),
            tenant_id: ctx.tenant.as_claim().to_string(),
            exp: expires_at.timestamp(),
        })
    }

    /// Return `token` unchanged unless it expires within the refresh window,
    /// in which case a new token with the same user and tenant is minted.
    pub fn refresh_token(&self, ctx: &RequestContext, token: &str, new_expires_at: DateTime<Utc>) -> Result<String> {
        let claims = self.decode(token, true)?;
        if claims.exp - Utc::now().timestamp() > TOKEN_REFRESH_WINDOW_SECS {
            return Ok(token.to_string());
        }

        if ctx.tenant.is_bound() && ctx.tenant != claims.tenant() {
            tracing::warn!(
                token_tenant = %claims.tenant_id,
                context_tenant = ctx.tenant.as_claim(),
                "refreshing a token bound to a different tenant than the request"
            );
        }

        tracing::debug!(user = %claims.user.id, "refreshing session token");
        self.sign(&SessionClaims { exp: new_expires_at.timestamp(), ..claims })
    }

    /// `Ok(false)` when the token is rejected; `Err` only when the key is unusable.
    pub fn validate_token(&self, _ctx: &RequestContext, token: &str) -> Result<bool> {
        match self.decode(token, true) {
            Ok(_) => Ok(true),
            Err(TenantryError::InvalidToken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn claims_from_token(&self, _ctx: &RequestContext, token: &str) -> Result<SessionClaims> {
        self.decode(token, true)
    }

    pub fn user_from_token(&self, ctx: &RequestContext, token: &str) -> Result<SessionUser> {
        Ok(self.claims_from_token(ctx, token)?.user)
    }

    pub fn tenant_from_token(&self, ctx: &RequestContext, token: &str) -> Result<TenantContext> {
        Ok(self.claims_from_token(ctx, token)?.tenant())
    }

    /// Classify a token without failing on expiry.
    pub fn token_state(&self, _ctx: &RequestContext, token: &str) -> Result<TokenState> {
        let claims = match self.decode(token, false) {
            Ok(claims) => claims,
            Err(TenantryError::InvalidToken) => return Ok(TokenState::Invalid),
            Err(e) => return Err(e),
        };
        let remaining = claims.exp - Utc::now().timestamp();
        Ok(if remaining < 0 {
            TokenState::Expired
        } else if remaining <= TOKEN_REFRESH_WINDOW_SECS {
            TokenState::Refreshable
        } else {
            TokenState::Valid
        })
    }
}
