use tracing::{debug, warn};

use crate::users::UserStore;

/// Where to send the browser after a successful federated login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostAuthRedirect {
    /// The account has no local password yet.
    SetupRequired(String),
    Default,
}

impl PostAuthRedirect {
    pub fn location(&self, frontend_url: &str) -> String {
        match self {
            PostAuthRedirect::SetupRequired(email) => format!(
                "{}/setup-password?email={}",
                frontend_url,
                urlencoding::encode(email)
            ),
            PostAuthRedirect::Default => format!("{}/", frontend_url),
        }
    }
}

/// Navigation decision only: every failure falls back to `Default`.
pub async fn decide_post_auth_redirect(
    users: &dyn UserStore,
    email: Option<&str>,
) -> PostAuthRedirect {
    let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) else {
        debug!("no email on principal; default redirect");
        return PostAuthRedirect::Default;
    };

    match users.find_by_email(email).await {
        Ok(Some(user)) if !user.has_password() => PostAuthRedirect::SetupRequired(user.email),
        Ok(_) => PostAuthRedirect::Default,
        Err(e) => {
            warn!(error = %e, email, "post-auth lookup failed; default redirect");
            PostAuthRedirect::Default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{InMemoryUserStore, NewUser, StoreError, User};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl UserStore for BrokenStore {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn create(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
        async fn update(&self, _user: &User) -> Result<User, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("connection refused")))
        }
    }

    #[tokio::test]
    async fn setup_required_only_without_password() {
        let store = InMemoryUserStore::new();
        store
            .create(NewUser {
                email: "fed@example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .create(NewUser {
                email: "pw@example.com".into(),
                password_hash: Some("$argon2id$v=19$digest".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            decide_post_auth_redirect(&store, Some("fed@example.com")).await,
            PostAuthRedirect::SetupRequired("fed@example.com".into())
        );
        assert_eq!(
            decide_post_auth_redirect(&store, Some("pw@example.com")).await,
            PostAuthRedirect::Default
        );
    }

    #[tokio::test]
    async fn unresolvable_email_falls_back_to_default() {
        let store = InMemoryUserStore::new();
        assert_eq!(
            decide_post_auth_redirect(&store, None).await,
            PostAuthRedirect::Default
        );
        assert_eq!(
            decide_post_auth_redirect(&store, Some("")).await,
            PostAuthRedirect::Default
        );
        assert_eq!(
            decide_post_auth_redirect(&store, Some("nobody@example.com")).await,
            PostAuthRedirect::Default
        );
        assert_eq!(
            decide_post_auth_redirect(&BrokenStore, Some("fed@example.com")).await,
            PostAuthRedirect::Default
        );
    }

    #[test]
    fn location_percent_encodes_email() {
        let setup = PostAuthRedirect::SetupRequired("a+b c@example.com".into());
        assert_eq!(
            setup.location("http://localhost:3000"),
            "http://localhost:3000/setup-password?email=a%2Bb%20c%40example.com"
        );
        assert_eq!(
            PostAuthRedirect::Default.location("http://localhost:3000"),
            "http://localhost:3000/"
        );
    }
}
