//! Session management: registration, password login with brute-force
//! lockout, rotating refresh sessions and logout.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use service_core::middleware::request_meta::RequestMeta;
use uuid::Uuid;

use crate::models::{
    normalize_email, LoginAudit, RefreshSession, Role, SanitizedUser, SecurityEvent,
    SecurityEventType, User,
};
use crate::store::Store;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

use super::{AuditService, CsrfGuard, EmailProvider, JwtService, LoginThrottle, ServiceError};

/// How long an emailed verification token stays valid.
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// Everything a successful authentication hands back to the handler: the
/// bearer token for the response body, plus the refresh secret and CSRF
/// token destined for cookies.
pub struct AuthenticatedSession {
    pub user: SanitizedUser,
    pub access_token: String,
    pub expires_in: i64,
    pub refresh_secret: String,
    pub csrf_token: String,
}

/// Session-policy knobs lifted out of the service configuration.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub admin_emails: Vec<String>,
    pub refresh_token_expiry_days: i64,
    pub app_base_url: String,
}

#[derive(Clone)]
pub struct AuthService {
    store: Store,
    jwt: JwtService,
    email: Arc<dyn EmailProvider>,
    audit: AuditService,
    throttle: Arc<dyn LoginThrottle>,
    csrf: CsrfGuard,
    policy: SessionPolicy,
}

impl AuthService {
    pub fn new(
        store: Store,
        jwt: JwtService,
        email: Arc<dyn EmailProvider>,
        audit: AuditService,
        throttle: Arc<dyn LoginThrottle>,
        csrf: CsrfGuard,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            store,
            jwt,
            email,
            audit,
            throttle,
            csrf,
            policy,
        }
    }

    fn is_admin_email(&self, normalized_email: &str) -> bool {
        self.policy
            .admin_emails
            .iter()
            .any(|e| e == normalized_email)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        requested_role: Option<Role>,
        meta: &RequestMeta,
    ) -> Result<Uuid, ServiceError> {
        let email = normalize_email(email);

        // Registration is useless without a verification mail; refuse
        // loudly instead of creating accounts that can never activate.
        if !self.email.is_enabled() {
            return Err(ServiceError::EmailNotConfigured);
        }

        let password_hash = hash_password(&Password::new(password.to_string()))
            .map_err(ServiceError::Internal)?;

        let role = if self.is_admin_email(&email) {
            Role::Admin
        } else {
            match requested_role {
                Some(Role::Enterprise) => Role::Enterprise,
                // Admin cannot be requested; it comes from the allow-list.
                _ => Role::User,
            }
        };

        let mut user = User::new(email.clone(), password_hash.into_string(), role);
        let token = generate_secret();
        user.verification_token = Some(token.clone());
        user.verification_sent_at = Some(Utc::now());
        let user_id = user.id;

        self.store.insert_user(user).map_err(|e| match e {
            crate::store::StoreError::DuplicateEmail => ServiceError::EmailAlreadyRegistered,
            other => ServiceError::Store(other),
        })?;

        tracing::info!(user_id = %user_id, "user registered");
        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::Registration,
            Some(user_id),
            Some("user"),
            Some(user_id.to_string()),
            true,
            format!("registered with role {}", role.as_str()),
            meta.ip.clone(),
            meta.user_agent.clone(),
            meta.request_id.clone(),
        ));

        self.email
            .send_verification_email(&email, &token, &self.policy.app_base_url)
            .await?;

        Ok(user_id)
    }

    /// Password login. The lockout check runs before any hash comparison
    /// so a locked identity costs no CPU and leaks no timing signal.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let identity = normalize_email(email);
        let now = Utc::now();

        if let Some(state) = self.throttle.check(&identity, &meta.ip, now) {
            if state.is_locked(now) {
                self.audit.record_login_attempt(self.login_row(
                    &identity,
                    meta,
                    false,
                    Some("locked"),
                    state.attempts,
                    state.locked_until,
                ));
                return Err(ServiceError::AccountLocked {
                    retry_after_seconds: state.retry_after_seconds(now),
                });
            }
        }

        let user = match self.store.user_by_email(&identity) {
            Some(user) => user,
            None => {
                let state = self.throttle.register_failure(&identity, &meta.ip, now);
                self.audit.record_login_attempt(self.login_row(
                    &identity,
                    meta,
                    false,
                    Some("unknown_identity"),
                    state.attempts,
                    state.locked_until,
                ));
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .is_err()
        {
            let state = self.throttle.register_failure(&identity, &meta.ip, now);
            self.audit.record_login_attempt(self.login_row(
                &identity,
                meta,
                false,
                Some("bad_password"),
                state.attempts,
                state.locked_until,
            ));
            return Err(ServiceError::InvalidCredentials);
        }

        // Credentials are valid from here on; the throttle entry is spent.
        self.throttle.clear(&identity, &meta.ip);

        if !user.email_verified {
            self.audit.record_login_attempt(self.login_row(
                &identity,
                meta,
                false,
                Some("email_not_verified"),
                0,
                None,
            ));
            return Err(ServiceError::EmailNotVerified);
        }

        // Allow-listed emails are escalated in place.
        let user = if self.is_admin_email(&identity) && user.role != Role::Admin {
            self.store
                .update_user(user.id, |u| u.role = Role::Admin)
                .unwrap_or(user)
        } else {
            user
        };

        // Plain `user` accounts go through the case-lookup flow instead;
        // rejecting them here is product policy, not a defect.
        if user.role == Role::User {
            self.audit.record_login_attempt(self.login_row(
                &identity,
                meta,
                false,
                Some("role_not_allowed"),
                0,
                None,
            ));
            return Err(ServiceError::PasswordLoginDisabled);
        }

        let session = self.open_session(&user, meta)?;

        self.audit
            .record_login_attempt(self.login_row(&identity, meta, true, None, 0, None));
        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::Login,
            Some(user.id),
            Some("user"),
            Some(user.id.to_string()),
            true,
            "password login",
            meta.ip.clone(),
            meta.user_agent.clone(),
            meta.request_id.clone(),
        ));

        Ok(session)
    }

    /// Exchange a refresh secret for a new token pair, rotating the
    /// session. The old session is revoked and pointed at its successor in
    /// the same store transaction, so a replayed old secret always reads
    /// as revoked.
    pub fn refresh(
        &self,
        refresh_secret: &str,
        meta: &RequestMeta,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let now = Utc::now();
        let hash = RefreshSession::hash_secret(refresh_secret);

        let current = self
            .store
            .session_by_secret_hash(&hash)
            .ok_or(ServiceError::SessionInvalid)?;

        let user = self
            .store
            .user_by_id(current.user_id)
            .ok_or(ServiceError::SessionInvalid)?;

        let new_secret = generate_secret();
        let replacement = RefreshSession::new(
            user.id,
            &new_secret,
            self.policy.refresh_token_expiry_days,
            meta.ip.clone(),
            meta.user_agent.clone(),
        );
        let replacement_id = replacement.id;

        self.store
            .rotate_session(current.id, replacement, now)
            .map_err(|refusal| {
                self.audit.record_event(SecurityEvent::new(
                    SecurityEventType::SessionRotated,
                    Some(user.id),
                    Some("refresh_session"),
                    Some(current.id.to_string()),
                    false,
                    format!("rotation refused: {:?}", refusal),
                    meta.ip.clone(),
                    meta.user_agent.clone(),
                    meta.request_id.clone(),
                ));
                ServiceError::SessionInvalid
            })?;

        let access_token = self
            .jwt
            .generate_access_token(&user)
            .map_err(ServiceError::Internal)?;

        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::SessionRotated,
            Some(user.id),
            Some("refresh_session"),
            Some(current.id.to_string()),
            true,
            format!("rotated into {}", replacement_id),
            meta.ip.clone(),
            meta.user_agent.clone(),
            meta.request_id.clone(),
        ));

        Ok(AuthenticatedSession {
            user: user.sanitized(),
            access_token,
            expires_in: self.jwt.access_token_expiry_seconds(),
            refresh_secret: new_secret,
            csrf_token: self.csrf.issue(),
        })
    }

    /// Revoke the session behind a refresh secret. Idempotent: an unknown
    /// or missing secret is not an error, the caller clears cookies either
    /// way.
    pub fn logout(&self, refresh_secret: Option<&str>, meta: &RequestMeta) {
        let Some(secret) = refresh_secret else {
            return;
        };

        let hash = RefreshSession::hash_secret(secret);
        if let Some(session) = self.store.session_by_secret_hash(&hash) {
            self.store.revoke_session(session.id, Utc::now());
            self.audit.record_event(SecurityEvent::new(
                SecurityEventType::Logout,
                Some(session.user_id),
                Some("refresh_session"),
                Some(session.id.to_string()),
                true,
                "logout",
                meta.ip.clone(),
                meta.user_agent.clone(),
                meta.request_id.clone(),
            ));
        }
    }

    /// Confirm an emailed verification token. Verification is itself an
    /// authentication event: the account logs in with a fresh session.
    pub fn verify_email(
        &self,
        token: &str,
        meta: &RequestMeta,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::InvalidToken);
        }

        let user = self
            .store
            .user_by_verification_token(token)
            .ok_or(ServiceError::InvalidToken)?;

        if let Some(sent_at) = user.verification_sent_at {
            if Utc::now() - sent_at > Duration::hours(VERIFICATION_TOKEN_TTL_HOURS) {
                return Err(ServiceError::InvalidToken);
            }
        }

        let user = self
            .store
            .update_user(user.id, |u| {
                u.email_verified = true;
                u.verification_token = None;
            })
            .ok_or(ServiceError::UserNotFound)?;

        tracing::info!(user_id = %user.id, "email verified");
        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::EmailVerified,
            Some(user.id),
            Some("user"),
            Some(user.id.to_string()),
            true,
            "email verified",
            meta.ip.clone(),
            meta.user_agent.clone(),
            meta.request_id.clone(),
        ));

        self.open_session(&user, meta)
    }

    /// Re-issue a verification token for an unverified account.
    /// Returns `false` when the account was already verified.
    pub async fn resend_verification(&self, email: &str) -> Result<bool, ServiceError> {
        if !self.email.is_enabled() {
            return Err(ServiceError::EmailNotConfigured);
        }

        let email = normalize_email(email);
        let user = self
            .store
            .user_by_email(&email)
            .ok_or(ServiceError::UserNotFound)?;

        if user.email_verified {
            return Ok(false);
        }

        let token = generate_secret();
        self.store.update_user(user.id, |u| {
            u.verification_token = Some(token.clone());
            u.verification_sent_at = Some(Utc::now());
        });

        self.email
            .send_verification_email(&email, &token, &self.policy.app_base_url)
            .await?;

        self.audit.record_event(SecurityEvent::new(
            SecurityEventType::VerificationResent,
            Some(user.id),
            Some("user"),
            Some(user.id.to_string()),
            true,
            "verification email resent",
            "-".to_string(),
            None,
            None,
        ));

        Ok(true)
    }

    /// Opportunistic startup cleanup: physically delete sessions past
    /// their expiry.
    pub fn prune_sessions(&self) {
        let removed = self.store.prune_refresh_sessions(Utc::now());
        if removed > 0 {
            tracing::info!(removed, "pruned expired refresh sessions");
        }
    }

    /// Issue the full credential set for an authenticated user: access
    /// token, refresh session (hash stored, raw secret returned) and a
    /// fresh CSRF token.
    fn open_session(
        &self,
        user: &User,
        meta: &RequestMeta,
    ) -> Result<AuthenticatedSession, ServiceError> {
        let refresh_secret = generate_secret();
        let session = RefreshSession::new(
            user.id,
            &refresh_secret,
            self.policy.refresh_token_expiry_days,
            meta.ip.clone(),
            meta.user_agent.clone(),
        );
        self.store.insert_refresh_session(session);

        let access_token = self
            .jwt
            .generate_access_token(user)
            .map_err(ServiceError::Internal)?;

        Ok(AuthenticatedSession {
            user: user.sanitized(),
            access_token,
            expires_in: self.jwt.access_token_expiry_seconds(),
            refresh_secret,
            csrf_token: self.csrf.issue(),
        })
    }

    fn login_row(
        &self,
        identity: &str,
        meta: &RequestMeta,
        success: bool,
        failure_reason: Option<&str>,
        attempt_count: u32,
        locked_until: Option<chrono::DateTime<Utc>>,
    ) -> LoginAudit {
        LoginAudit {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            ip: meta.ip.clone(),
            user_agent: meta.user_agent.clone(),
            success,
            failure_reason: failure_reason.map(|s| s.to_string()),
            attempt_count,
            locked_until,
            request_id: meta.request_id.clone(),
            created_at: Utc::now(),
        }
    }
}

/// 32 bytes of OS randomness, hex-encoded. Used for refresh secrets and
/// verification tokens.
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
