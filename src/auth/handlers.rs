use axum::{
    extract::State,
    response::Redirect,
    routing::post,
    Json, Router,
};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::{
    auth::{
        credentials::CredentialService,
        dto::{CredentialsRequest, SignUpRequest},
        error::AuthError,
        federated::IdentityLinker,
        redirect::decide_post_auth_redirect,
    },
    state::AppState,
    users::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/register", post(register))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/setup-password", post(setup_password))
        .route("/api/auth/oauth2/success", post(oauth2_success))
}

#[instrument(skip_all)]
pub async fn sign_up(
    State(service): State<CredentialService>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(service.sign_up(payload.into()).await?))
}

#[instrument(skip_all)]
pub async fn register(
    State(service): State<CredentialService>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(service.register(payload.into()).await?))
}

#[instrument(skip_all)]
pub async fn sign_in(
    State(service): State<CredentialService>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    Ok(Json(service.sign_in(&payload.email, &payload.password).await?))
}

#[instrument(skip_all)]
pub async fn setup_password(
    State(service): State<CredentialService>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<&'static str, AuthError> {
    service
        .setup_password(&payload.email, &payload.password)
        .await
}

/// Called by the OAuth2 integration once the provider has verified the
/// principal. The body is the provider's attribute map.
#[instrument(skip_all)]
pub async fn oauth2_success(
    State(state): State<AppState>,
    State(linker): State<IdentityLinker>,
    Json(attributes): Json<Map<String, Value>>,
) -> Result<Redirect, AuthError> {
    let linked = linker.resolve_federated_user(attributes).await?;
    let decision =
        decide_post_auth_redirect(state.users.as_ref(), linked.principal.email()).await;
    let location = decision.location(&state.config.frontend_url);
    info!(
        user_id = %linked.user.id,
        new_account = linked.is_new_account,
        %location,
        "federated login redirect"
    );
    Ok(Redirect::to(&location))
}
