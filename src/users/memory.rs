use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    model::{NewUser, User},
    repo::{StoreError, UserStore},
};

/// Process-local user store. Used when no database is configured, and in tests.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::Conflict(user.email));
        }
        let stored = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            provider: user.provider,
            role: user.role,
            phone: None,
            emergency_phone: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let current = users
            .values_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| anyhow::anyhow!("user {} does not exist", user.id))?;
        // email and created_at are immutable here, as in the sql adapter
        current.name = user.name.clone();
        current.password_hash = user.password_hash.clone();
        current.provider = user.provider;
        current.role = user.role;
        current.phone = user.phone.clone();
        current.emergency_phone = user.emergency_phone.clone();
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{Provider, Role};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: Some("Asha".into()),
            password_hash: None,
            provider: Provider::Google,
            role: Role::Customer,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_rejects_duplicate_email() {
        let store = InMemoryUserStore::new();
        let first = store.create(new_user("asha@example.com")).await.unwrap();
        assert_eq!(first.email, "asha@example.com");

        let err = store.create(new_user("asha@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(e) if e == "asha@example.com"));

        // emails are stored case-sensitively
        let other = store.create(new_user("Asha@example.com")).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn update_overwrites_mutable_fields_only() {
        let store = InMemoryUserStore::new();
        let mut user = store.create(new_user("ravi@example.com")).await.unwrap();
        let id = user.id;

        user.name = Some("Ravi".into());
        user.password_hash = Some("$argon2id$v=19$digest".into());
        user.email = "changed@example.com".into();
        store.update(&user).await.unwrap();

        let stored = store
            .find_by_email("ravi@example.com")
            .await
            .unwrap()
            .expect("still keyed by original email");
        assert_eq!(stored.id, id);
        assert_eq!(stored.name.as_deref(), Some("Ravi"));
        assert!(stored.has_password());
        assert!(store.find_by_email("changed@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_of_unknown_user_fails() {
        let store = InMemoryUserStore::new();
        let mut ghost = store.create(new_user("ghost@example.com")).await.unwrap();
        ghost.id = Uuid::new_v4();
        assert!(matches!(
            store.update(&ghost).await,
            Err(StoreError::Backend(_))
        ));
    }
}
