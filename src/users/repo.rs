use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence port for users, keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Insert a new user. Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Overwrite the mutable fields of an existing user, matched by id.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    password_hash: Option<String>,
    provider: String,
    role: String,
    phone: Option<String>,
    emergency_phone: Option<String>,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            name: r.name,
            password_hash: r.password_hash,
            provider: r.provider.parse()?,
            role: r.role.parse()?,
            phone: r.phone,
            emergency_phone: r.emergency_phone,
            created_at: r.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_unique(err: sqlx::Error, email: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(email.to_string())
        }
        _ => StoreError::Backend(anyhow::Error::new(err).context("write user")),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, password_hash, provider, role,
                   phone, emergency_phone, created_at
              FROM users
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;

        Ok(row.map(User::try_from).transpose()?)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, name, password_hash, provider, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, name, password_hash, provider, role,
                      phone, emergency_phone, created_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.provider.as_str())
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, &user.email))?;

        Ok(User::try_from(row)?)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name = $2,
                   password_hash = $3,
                   provider = $4,
                   role = $5,
                   phone = $6,
                   emergency_phone = $7
             WHERE id = $1
            RETURNING id, email, name, password_hash, provider, role,
                      phone, emergency_phone, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.provider.as_str())
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(&user.emergency_phone)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, &user.email))?;

        Ok(User::try_from(row)?)
    }
}
