use serde::Deserialize;

use super::credentials::SignUp;

/// Request body for signup and register.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl From<SignUpRequest> for SignUp {
    fn from(r: SignUpRequest) -> Self {
        Self {
            email: r.email,
            password: r.password,
            name: r.name,
            role: r.role,
        }
    }
}

/// Request body for signin and setup-password.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}
