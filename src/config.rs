use serde::Deserialize;

use crate::users::Provider;

/// Reserved admin identity that no public registration path may produce.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub email: String,
    pub role: String,
}

impl AdminConfig {
    pub fn is_reserved_email(&self, email: &str) -> bool {
        eq_ignore_case(email.trim(), self.email.trim())
    }

    pub fn is_reserved_role(&self, role: &str) -> bool {
        eq_ignore_case(role.trim(), self.role.trim())
    }
}

/// Case-insensitive per-character comparison that folds through both upper
/// and lower case, so `ı`/`I`/`i` and `ſ`/`S`/`s` compare equal.
fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().count() == b.chars().count()
        && a.chars().zip(b.chars()).all(|(x, y)| {
            x == y
                || x.to_uppercase().eq(y.to_uppercase())
                || x.to_lowercase().eq(y.to_lowercase())
        })
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub admin: AdminConfig,
    pub oauth_provider: Provider,
    pub frontend_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let admin = AdminConfig {
            email: std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@apnaride.com".into()),
            role: std::env::var("ADMIN_ROLE").unwrap_or_else(|_| "admin".into()),
        };
        let oauth_provider = match std::env::var("OAUTH_PROVIDER") {
            Ok(v) => v.parse()?,
            Err(_) => Provider::Google,
        };
        let frontend_url = std::env::var("APP_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            database_url,
            admin,
            oauth_provider,
            frontend_url,
        })
    }
}
