//! HTTP handlers: the admin tenant surface and the per-tenant CRUD glue.
//!
//! CRUD handlers trust the `x-tenant` header the gate attached; they never
//! re-validate it against the allow-list.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use tracing::info;

use crate::{
    error::AppError,
    middleware::TENANT_HEADER,
    resolver::DEFAULT_TENANT,
    state::AppState,
    tenants::is_valid_tenant_name,
};

#[derive(Serialize)]
pub struct TenantList {
    tenants: Vec<String>,
}

#[derive(Deserialize)]
pub struct TenantPayload {
    tenant: String,
}

pub async fn list_tenants(State(state): State<Arc<AppState>>) -> Json<TenantList> {
    Json(TenantList {
        tenants: state.tenants.get_allowed().await,
    })
}

pub async fn add_tenant(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TenantPayload>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_tenant_name(&payload.tenant) {
        return Err(AppError::InvalidTenantName);
    }

    if !state.tenants.add(&payload.tenant).await {
        return Err(AppError::TenantStore);
    }

    info!("Tenant added: {}", payload.tenant);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Tenant {} added", payload.tenant) })),
    ))
}

pub async fn remove_tenant(
    State(state): State<Arc<AppState>>,
    Path(tenant): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if tenant == DEFAULT_TENANT {
        return Err(AppError::ProtectedTenant);
    }

    if !state.tenants.remove(&tenant).await {
        return Err(AppError::TenantStore);
    }

    info!("Tenant removed: {tenant}");

    Ok(Json(json!({ "message": format!("Tenant {tenant} removed") })))
}

#[derive(Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct NewUser {
    email: String,
    name: String,
}

#[derive(Serialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
}

#[derive(Deserialize)]
pub struct NewPost {
    title: String,
    content: String,
    author_id: i64,
}

fn required_tenant(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingTenant)
}

fn tenant_or_default(headers: &HeaderMap) -> &str {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<User>>, AppError> {
    let tenant = required_tenant(&headers)?;
    let pool = state.databases.get(tenant)?;

    let users = sqlx::query_as::<_, User>("SELECT id, email, name FROM users ORDER BY id")
        .fetch_all(&pool)
        .await?;

    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewUser>,
) -> Result<Json<User>, AppError> {
    let tenant = required_tenant(&headers)?;
    let pool = state.databases.get(tenant)?;

    let result = sqlx::query("INSERT INTO users (email, name) VALUES (?, ?)")
        .bind(&payload.email)
        .bind(&payload.name)
        .execute(&pool)
        .await?;

    Ok(Json(User {
        id: result.last_insert_id() as i64,
        email: payload.email,
        name: payload.name,
    }))
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Post>>, AppError> {
    let pool = state.databases.get(tenant_or_default(&headers))?;

    let posts =
        sqlx::query_as::<_, Post>("SELECT id, title, content, author_id FROM posts ORDER BY id")
            .fetch_all(&pool)
            .await?;

    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewPost>,
) -> Result<Json<Post>, AppError> {
    let pool = state.databases.get(tenant_or_default(&headers))?;

    let result = sqlx::query("INSERT INTO posts (title, content, author_id) VALUES (?, ?, ?)")
        .bind(&payload.title)
        .bind(&payload.content)
        .bind(payload.author_id)
        .execute(&pool)
        .await?;

    Ok(Json(Post {
        id: result.last_insert_id() as i64,
        title: payload.title,
        content: payload.content,
        author_id: payload.author_id,
    }))
}
