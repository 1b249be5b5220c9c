#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use lexcase_api::access::{Action, ScopedTable, Section};
use lexcase_api::config::AppConfig;
use lexcase_api::database::{MemoryAccessStore, MemoryRecordStore};
use lexcase_api::{router, AppState};

pub const PASSWORD: &str = "correct horse";

/// Router over in-memory stores seeded with a small multi-region world:
///
/// - regions 5 (north), 7 (south), 9 (west), 8 (closed, inactive)
/// - `ana`: Lawyer in 5 and 7; `ben`: Lawyer in 5; `zoe`: no memberships;
///   `root`: Admin and Lawyer in 5 and 7
/// - cases 1 (region 5), 2 (7), 42 (9), 50 (null), 51 (global 0)
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub access: Arc<MemoryAccessStore>,
    pub records: Arc<MemoryRecordStore>,
    pub ana: Uuid,
    pub ben: Uuid,
    pub zoe: Uuid,
    pub root: Uuid,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.api.tenant_domain = Some("lexcase.test".to_string());
    config
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: AppConfig) -> Result<TestApp> {
    let access = Arc::new(MemoryAccessStore::new());
    let records = Arc::new(MemoryRecordStore::new());

    access.add_region(5, "North", "north.lexcase.test", true).await;
    access.add_region(7, "South", "south.lexcase.test", true).await;
    access.add_region(9, "West", "west.lexcase.test", true).await;
    access.add_region(8, "Closed", "closed.lexcase.test", false).await;

    let ana = access.add_user("ana", PASSWORD).await?;
    let ben = access.add_user("ben", PASSWORD).await?;
    let zoe = access.add_user("zoe", PASSWORD).await?;
    let root = access.add_user("root", PASSWORD).await?;

    for (user, regions) in [(ana, vec![5, 7]), (ben, vec![5]), (root, vec![5, 7])] {
        for region in regions {
            access.add_membership(user, region).await;
        }
    }
    access.assign_role(ana, "Lawyer").await;
    access.assign_role(ben, "Lawyer").await;
    access.assign_role(zoe, "Lawyer").await;
    access.assign_role(root, "Lawyer").await;
    access.assign_role(root, "Admin").await;

    let all = [Action::View, Action::Create, Action::Edit, Action::Delete];
    access.grant("Lawyer", 5, Section::CaseManagement, all).await;
    access.grant("Lawyer", 5, Section::Chat, [Action::View]).await;
    access.grant("Lawyer", 5, Section::Judges, [Action::View]).await;
    access.grant("Lawyer", 5, Section::CaseTypes, [Action::View]).await;
    access.grant("Lawyer", 7, Section::CaseManagement, [Action::View, Action::Create]).await;
    access.grant("Lawyer", 9, Section::CaseManagement, all).await;
    access.grant("Admin", 5, Section::RolePermissions, [Action::View, Action::Edit]).await;
    access.grant("Admin", 7, Section::RolePermissions, [Action::View]).await;

    records.add_case(1, Some(5), "N-0001", "Estate of Alvarez").await;
    records.add_case(2, Some(7), "S-0002", "Boyd v. Harbor Authority").await;
    records.add_case(42, Some(9), "W-0042", "Sealed matter").await;
    records.add_case(50, None, "L-0050", "Legacy intake").await;
    records.add_case(51, Some(0), "G-0051", "Shared template").await;
    records.add_lookup(ScopedTable::Judges, 100, Some(5), "Judge Okafor").await;
    records.add_lookup(ScopedTable::Judges, 101, Some(9), "Judge Lindqvist").await;
    records.add_lookup(ScopedTable::CaseTypes, 200, Some(5), "Probate").await;

    let state = AppState::new(&config, access.clone(), records.clone())?;
    Ok(TestApp { router: router(state.clone()), state, access, records, ana, ben, zoe, root })
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<TestResponse> {
        self.request_with_headers(method, uri, token, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
        Ok(TestResponse { status, body })
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<TestResponse> {
        self.request(Method::GET, uri, Some(token), None).await
    }

    /// Access token for `user` bound to `region_id`.
    pub async fn token_in(&self, user: Uuid, region_id: i32) -> Result<String> {
        Ok(self.state.sessions.select_region(user, region_id).await?.access_token)
    }

    /// Logs in over HTTP and returns the `data` of the session grant.
    pub async fn login(&self, username: &str) -> Result<Value> {
        let body = serde_json::json!({ "username": username, "password": PASSWORD });
        let response = self.request(Method::POST, "/auth/login", None, Some(body)).await?;
        anyhow::ensure!(response.status == StatusCode::OK, "login failed: {} {}", response.status, response.body);
        Ok(response.data().clone())
    }
}

pub fn ids(list: &Value) -> Vec<i64> {
    let mut ids: Vec<i64> = list
        .as_array()
        .map(|rows| rows.iter().filter_map(|row| row["id"].as_i64()).collect())
        .unwrap_or_default();
    ids.sort_unstable();
    ids
}
