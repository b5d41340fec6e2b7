// HTTP endpoints exposing resolved identities

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::get,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthError, IdentityResolver, RequestIdentity};
use crate::tenant::TenantResolver;

/// Resolvers shared by every request.
pub struct AppContext {
    pub identity: IdentityResolver,
    pub tenants: TenantResolver,
}

pub type AppState = Arc<AppContext>;

pub fn create_router(state: AppState) -> Router {
    let tenant_scoped = Router::new()
        .route("/info", get(info))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/me", get(me))
        .route("/session", get(session))
        .merge(tenant_scoped)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Reject requests without a tenant-scoped identity.
async fn require_identity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let (mut parts, body) = request.into_parts();
    state.identity.resolve_required(&mut parts).await?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn info(identity: RequestIdentity) -> Json<Value> {
    Json(serde_json::json!({
        "sub": identity.subject(),
        "tenant_id": identity.tenant_id(),
        "roles": identity.roles(),
    }))
}

/// Identity without a tenant claim; the tenant is resolved server-side.
async fn me(State(state): State<AppState>, request: Request) -> Result<Json<Value>, AuthError> {
    let (mut parts, _body) = request.into_parts();
    let claims = state.identity.resolve_without_tenant(&mut parts).await?;

    let tenant_id = state
        .tenants
        .resolve_tenant_id(claims.email_or_subject(), claims.tenant_id)
        .await;

    // Downstream consumers see the resolved tenant, not the raw claim.
    let identity = RequestIdentity::from_claims(&claims).with_tenant(tenant_id);
    identity.clone().attach(&mut parts);

    Ok(Json(serde_json::json!({
        "claims": claims,
        "tenant_id": tenant_id,
        "context": identity,
    })))
}

/// Onboarding view. Accepts callers without a usable token.
async fn session(State(state): State<AppState>, request: Request) -> Json<Value> {
    let (mut parts, _body) = request.into_parts();
    let claims = state.identity.resolve_optional(&mut parts).await;

    let session = state
        .tenants
        .session_info(claims.email_or_subject(), claims.tenant_id)
        .await;

    Json(serde_json::json!({
        "identity": claims.origin,
        "session": session,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerificationStrategy;
    use crate::config::SyntheticDefaults;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use crate::tenant::SurrealTenantStore;
    use crate::types::{DatabaseName, TenantId};
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn bypass_app() -> (Router, Arc<SurrealTenantStore>) {
        let db = create_connection(DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        ensure_schema(&db).await.unwrap();
        let store = Arc::new(SurrealTenantStore::new(db));

        let state = Arc::new(AppContext {
            identity: IdentityResolver::new(
                VerificationStrategy::Bypass,
                None,
                SyntheticDefaults::default(),
            ),
            tenants: TenantResolver::standard(store.clone(), None),
        });
        (create_router(state), store)
    }

    async fn get_json(app: Router, request: http::Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = bypass_app().await;
        let request = http::Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_info_exposes_request_identity() {
        let (app, _) = bypass_app().await;
        let request = http::Request::builder()
            .uri("/info")
            .header("x-user-email", "ops@example.com")
            .header("x-user-roles", "ops")
            .header("x-tenant-id", "12")
            .body(Body::empty())
            .unwrap();

        let (status, body) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sub"], "ops@example.com");
        assert_eq!(body["tenant_id"], 12);
        assert_eq!(body["roles"], serde_json::json!(["ops"]));
    }

    #[tokio::test]
    async fn test_me_resolves_tenant_from_user_mapping() {
        let (app, store) = bypass_app().await;
        store
            .link_user("new@example.com", TenantId::new(21))
            .await
            .unwrap();

        let request = http::Request::builder()
            .uri("/me")
            .header("x-user-email", "new@example.com")
            .body(Body::empty())
            .unwrap();

        let (status, body) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tenant_id"], 21);
        assert_eq!(body["claims"]["bypass"], true);
        assert!(body["claims"]["tenant_id"].is_null());
        assert_eq!(body["context"]["tenant_id"], 21);
        assert_eq!(body["context"]["origin"], "bypass");
    }

    #[tokio::test]
    async fn test_session_reports_database() {
        let (app, store) = bypass_app().await;
        store
            .map_database(TenantId::new(3), &DatabaseName::new("acme_prod"))
            .await
            .unwrap();

        let request = http::Request::builder().uri("/session").body(Body::empty()).unwrap();
        let (status, body) = get_json(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["identity"], "optional");
        assert_eq!(body["session"]["tenant_id"], 3);
        assert_eq!(body["session"]["database_name"], "acme_prod");
    }
}
