use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use super::error::AuthError;
use crate::{
    config::AdminConfig,
    state::AppState,
    users::{NewUser, Provider, Role, User, UserStore},
};

/// Attributes the provider handed over after verifying the principal.
/// A value of the wrong JSON type counts as absent.
#[derive(Debug, Clone, Default)]
pub struct FederatedAttributes {
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
}

impl FederatedAttributes {
    pub fn from_map(attributes: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            attributes
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Self {
            email: text("email"),
            name: text("name"),
            given_name: text("given_name"),
        }
    }

    fn display_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.given_name.as_deref())
            .map(str::to_string)
    }
}

/// Authenticated federated principal, named by its email attribute.
#[derive(Debug, Clone)]
pub struct FederatedPrincipal {
    pub attributes: Map<String, Value>,
    pub name_attribute: &'static str,
}

impl FederatedPrincipal {
    pub fn email(&self) -> Option<&str> {
        self.attributes
            .get(self.name_attribute)
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct LinkedIdentity {
    pub user: User,
    pub is_new_account: bool,
    pub principal: FederatedPrincipal,
}

/// Reconciles a federated login with the user store. Never sets a password.
#[derive(Clone)]
pub struct IdentityLinker {
    users: Arc<dyn UserStore>,
    provider: Provider,
    admin: AdminConfig,
}

impl FromRef<AppState> for IdentityLinker {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.config.oauth_provider,
            state.config.admin.clone(),
        )
    }
}

impl IdentityLinker {
    pub fn new(users: Arc<dyn UserStore>, provider: Provider, admin: AdminConfig) -> Self {
        Self {
            users,
            provider,
            admin,
        }
    }

    #[instrument(skip_all, fields(provider = %self.provider))]
    pub async fn resolve_federated_user(
        &self,
        attributes: Map<String, Value>,
    ) -> Result<LinkedIdentity, AuthError> {
        let attrs = FederatedAttributes::from_map(&attributes);
        let email = attrs
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::Identity("Email not provided by OAuth2 provider".into()))?
            .to_string();
        let name = attrs.display_name();

        let (user, is_new_account) = match self.users.find_by_email(&email).await? {
            None if self.admin.is_reserved_email(&email) => {
                warn!(email = %email, "federated login refused for reserved admin email");
                return Err(AuthError::Forbidden(
                    "Admin account cannot be created via federated login.".into(),
                ));
            }
            None => {
                let user = self
                    .users
                    .create(NewUser {
                        email,
                        name,
                        password_hash: None,
                        provider: self.provider,
                        role: Role::default(),
                    })
                    .await?;
                info!(user_id = %user.id, email = %user.email, "federated account created");
                (user, true)
            }
            Some(mut user) => {
                // provider is authoritative for the display name on every login
                user.name = name;
                user.provider = self.provider;
                let user = self.users.update(&user).await?;
                info!(user_id = %user.id, email = %user.email, "federated login linked");
                (user, false)
            }
        };

        Ok(LinkedIdentity {
            user,
            is_new_account,
            principal: FederatedPrincipal {
                attributes,
                name_attribute: "email",
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::InMemoryUserStore;
    use serde_json::json;

    fn attrs(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    fn linker() -> (Arc<InMemoryUserStore>, IdentityLinker) {
        let users = Arc::new(InMemoryUserStore::new());
        let admin = AdminConfig {
            email: "admin@apnaride.com".into(),
            role: "admin".into(),
        };
        (users.clone(), IdentityLinker::new(users, Provider::Google, admin))
    }

    #[tokio::test]
    async fn first_login_creates_then_links() {
        let (users, linker) = linker();
        let first = linker
            .resolve_federated_user(attrs(json!({"email": "a@b.com", "name": "A"})))
            .await
            .unwrap();
        assert!(first.is_new_account);
        assert_eq!(first.user.provider, Provider::Google);
        assert!(!first.user.has_password());
        assert_eq!(first.user.role, Role::User);

        let second = linker
            .resolve_federated_user(attrs(json!({"email": "a@b.com", "name": "A"})))
            .await
            .unwrap();
        assert!(!second.is_new_account);
        assert_eq!(second.user.id, first.user.id);

        let stored = users.find_by_email("a@b.com").await.unwrap().unwrap();
        assert_eq!(stored.provider, Provider::Google);
        assert_eq!(stored.name.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn existing_local_account_keeps_credentials_but_takes_name() {
        let (users, linker) = linker();
        let mut local = users
            .create(NewUser {
                email: "local@example.com".into(),
                name: Some("Chosen Name".into()),
                password_hash: Some("$argon2id$v=19$digest".into()),
                provider: Provider::Local,
                role: Role::Rider,
            })
            .await
            .unwrap();
        local.phone = Some("+91 99999".into());
        users.update(&local).await.unwrap();

        let linked = linker
            .resolve_federated_user(attrs(json!({
                "email": "local@example.com",
                "name": "Google Name",
            })))
            .await
            .unwrap();

        assert!(!linked.is_new_account);
        let stored = users.find_by_email("local@example.com").await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Google Name"));
        assert_eq!(stored.provider, Provider::Google);
        assert_eq!(stored.password_hash.as_deref(), Some("$argon2id$v=19$digest"));
        assert_eq!(stored.role, Role::Rider);
        assert_eq!(stored.phone.as_deref(), Some("+91 99999"));
    }

    #[tokio::test]
    async fn given_name_is_the_fallback() {
        let (_, linker) = linker();
        let linked = linker
            .resolve_federated_user(attrs(json!({"email": "g@b.com", "given_name": "Gita"})))
            .await
            .unwrap();
        assert_eq!(linked.user.name.as_deref(), Some("Gita"));
    }

    #[tokio::test]
    async fn missing_email_is_an_identity_error() {
        let (users, linker) = linker();
        for payload in [
            json!({"name": "No Email"}),
            json!({"email": null}),
            json!({"email": "   "}),
            json!({"email": 42}),
        ] {
            let err = linker
                .resolve_federated_user(attrs(payload))
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::Identity(_)), "{err:?}");
        }
        assert!(users.find_by_email("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn principal_carries_original_attributes() {
        let (_, linker) = linker();
        let linked = linker
            .resolve_federated_user(attrs(json!({
                "email": "p@b.com",
                "name": "P",
                "picture": "https://img.example/p.png",
                "email_verified": true,
            })))
            .await
            .unwrap();
        assert_eq!(linked.principal.email(), Some("p@b.com"));
        assert_eq!(
            linked.principal.attributes.get("picture"),
            Some(&json!("https://img.example/p.png"))
        );
        assert_eq!(linked.principal.attributes.len(), 4);
    }

    #[tokio::test]
    async fn non_string_name_counts_as_absent() {
        let (_, linker) = linker();
        let linked = linker
            .resolve_federated_user(attrs(json!({
                "email": "a@b.com",
                "name": {"first": "A"},
                "given_name": "A",
            })))
            .await
            .unwrap();
        assert_eq!(linked.user.name.as_deref(), Some("A"));

        let linked = linker
            .resolve_federated_user(attrs(json!({"email": "a@b.com", "given_name": 7})))
            .await
            .unwrap();
        assert!(linked.user.name.is_none());
    }

    #[tokio::test]
    async fn reserved_admin_email_is_never_created() {
        let (users, linker) = linker();
        let err = linker
            .resolve_federated_user(attrs(json!({"email": "Admin@ApnaRide.com", "name": "X"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Forbidden(_)), "{err:?}");
        assert!(users.find_by_email("Admin@ApnaRide.com").await.unwrap().is_none());
        assert!(users.find_by_email("admin@apnaride.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_admin_account_still_links() {
        let (users, linker) = linker();
        users
            .create(NewUser {
                email: "admin@apnaride.com".into(),
                role: Role::Admin,
                ..Default::default()
            })
            .await
            .unwrap();
        let linked = linker
            .resolve_federated_user(attrs(json!({"email": "admin@apnaride.com", "name": "Ops"})))
            .await
            .unwrap();
        assert!(!linked.is_new_account);
        assert_eq!(linked.user.role, Role::Admin);
    }
}
