use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, info, instrument, warn};

use super::{error::AuthError, password::CredentialHasher};
use crate::{
    config::AdminConfig,
    state::AppState,
    users::{NewUser, Provider, PublicUser, Role, User, UserStore},
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub const PASSWORD_SET_MESSAGE: &str = "Password set. You can now login normally.";

/// Input for local account creation.
#[derive(Debug, Clone, Default)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

/// Local signup, signin and password setup.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn CredentialHasher>,
    admin: AdminConfig,
}

impl FromRef<AppState> for CredentialService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.hasher.clone(),
            state.config.admin.clone(),
        )
    }
}

fn password_long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

impl CredentialService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: Arc<dyn CredentialHasher>,
        admin: AdminConfig,
    ) -> Self {
        Self {
            users,
            hasher,
            admin,
        }
    }

    /// True when the request names the reserved admin identity, by email or role.
    fn is_reserved_admin(&self, email: &str, role: Option<&str>) -> bool {
        if self.admin.is_reserved_email(email) {
            return true;
        }
        role.is_some_and(|r| {
            self.admin.is_reserved_role(r) || matches!(r.parse::<Role>(), Ok(Role::Admin))
        })
    }

    #[instrument(skip_all, fields(email = %req.email.trim()))]
    pub async fn sign_up(&self, req: SignUp) -> Result<PublicUser, AuthError> {
        let email = req.email.trim().to_string();

        if self.is_reserved_admin(&email, req.role.as_deref()) {
            warn!("signup rejected: reserved admin identity");
            return Err(AuthError::Forbidden(
                "Admin account cannot be created via public registration.".into(),
            ));
        }

        if email.is_empty() || !password_long_enough(&req.password) {
            warn!("signup rejected: invalid input");
            return Err(AuthError::Validation(
                "Invalid email or password (min 6 chars).".into(),
            ));
        }

        let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r
                .parse::<Role>()
                .map_err(|e| AuthError::Validation(e.to_string()))?,
            None => Role::default(),
        };

        if self.users.find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AuthError::Conflict("Email is already registered.".into()));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        // a concurrent signup for the same email surfaces here as StoreError::Conflict
        let user = self
            .users
            .create(NewUser {
                email,
                name: req.name,
                password_hash: Some(password_hash),
                provider: Provider::Local,
                role,
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user.into())
    }

    /// Same contract as [`CredentialService::sign_up`].
    pub async fn register(&self, req: SignUp) -> Result<PublicUser, AuthError> {
        self.sign_up(req).await
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<PublicUser, AuthError> {
        let email = email.trim();

        let Some(mut user) = self.users.find_by_email(email).await? else {
            warn!("signin unknown email");
            return Err(AuthError::Unauthorized);
        };

        let Some(stored) = user.password_hash.clone().filter(|p| !p.trim().is_empty()) else {
            warn!(user_id = %user.id, "signin on account without password");
            return Err(AuthError::Unauthorized);
        };

        let verified = match self.hasher.verify(password, &stored) {
            Ok(ok) => ok,
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "stored credential is not a digest");
                false
            }
        };

        if !verified {
            if self.is_legacy_match(&stored, password) {
                self.migrate_legacy_password(&mut user, password).await?;
            } else {
                warn!(user_id = %user.id, "signin invalid password");
                return Err(AuthError::Unauthorized);
            }
        }

        info!(user_id = %user.id, "user signed in");
        Ok(user.into())
    }

    /// A stored value without the digest prefix that equals the supplied
    /// password exactly. Once migrated the prefix is present, so this can
    /// match at most once per account.
    fn is_legacy_match(&self, stored: &str, password: &str) -> bool {
        !self.hasher.is_digest(stored) && stored == password
    }

    /// plaintext -> digest. After this returns Ok the store holds a digest.
    async fn migrate_legacy_password(
        &self,
        user: &mut User,
        password: &str,
    ) -> Result<(), AuthError> {
        user.password_hash = Some(self.hasher.hash(password)?);
        let updated = self.users.update(user).await?;
        *user = updated;
        info!(user_id = %user.id, "legacy plaintext password migrated to digest");
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn setup_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<&'static str, AuthError> {
        let email = email.trim();

        if email.is_empty() || !password_long_enough(password) {
            return Err(AuthError::Validation(
                "Invalid email or password (min 6 chars).".into(),
            ));
        }

        let Some(mut user) = self.users.find_by_email(email).await? else {
            warn!("setup-password unknown email");
            return Err(AuthError::NotFound("User not found.".into()));
        };

        if user.has_password() {
            warn!(user_id = %user.id, "setup-password on account that already has one");
            return Err(AuthError::Conflict("Password already set.".into()));
        }

        user.password_hash = Some(self.hasher.hash(password)?);
        self.users.update(&user).await?;

        info!(user_id = %user.id, "password set up");
        Ok(PASSWORD_SET_MESSAGE)
    }
}
