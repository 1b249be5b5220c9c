mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ids, spawn_app, spawn_app_with, test_config};
use lexcase_api::access::RegionPolicy;

#[tokio::test]
async fn listing_is_limited_to_member_regions() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ana, 5).await?;

    let list = app.get("/api/cases", &token).await?;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(ids(&list.data()["cases"]), vec![1, 2]);
    assert_eq!(list.data()["total"], json!(2));
    Ok(())
}

#[tokio::test]
async fn global_records_are_visible_only_under_the_global_policy() -> Result<()> {
    let mut config = test_config();
    config.access.region_policy = RegionPolicy::MembersAndGlobal;
    let app = spawn_app_with(config).await?;
    let token = app.token_in(app.ana, 5).await?;

    let list = app.get("/api/cases", &token).await?;
    assert_eq!(ids(&list.data()["cases"]), vec![1, 2, 50, 51]);
    assert_eq!(app.get("/api/cases/50", &token).await?.status, StatusCode::OK);
    assert_eq!(app.get("/api/cases/42", &token).await?.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn foreign_case_looks_missing() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ana, 5).await?;

    let foreign = app.get("/api/cases/42", &token).await?;
    let missing = app.get("/api/cases/4242", &token).await?;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.body, missing.body);

    assert_eq!(app.get("/api/cases/50", &token).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/cases/not-a-number", &token).await?.status, StatusCode::NOT_FOUND);

    let own = app.get("/api/cases/2", &token).await?;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.data()["case_number"], json!("S-0002"));
    Ok(())
}

#[tokio::test]
async fn mutations_on_foreign_cases_are_not_found() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ana, 5).await?;

    let update = app
        .request(Method::PUT, "/api/cases/42", Some(&token), Some(json!({ "title": "mine now" })))
        .await?;
    assert_eq!(update.status, StatusCode::NOT_FOUND);

    let delete = app.request(Method::DELETE, "/api/cases/42", Some(&token), None).await?;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);
    assert_eq!(app.records.case(42).await.map(|c| c.title), Some("Sealed matter".to_string()));

    let chat = app.get("/api/cases/42/chat", &token).await?;
    assert_eq!(chat.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unauthenticated_and_revoked_callers_are_rejected() -> Result<()> {
    let app = spawn_app().await?;
    let anonymous = app.request(Method::GET, "/api/cases", None, None).await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let token = app.token_in(app.ben, 5).await?;
    assert_eq!(app.get("/api/cases/1", &token).await?.status, StatusCode::OK);
    app.state.tokens.revoke(app.ben).await?;
    assert_eq!(app.get("/api/cases/1", &token).await?.status, StatusCode::UNAUTHORIZED);

    let garbage = app.get("/api/cases", "not.a.jwt").await?;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn user_without_memberships_sees_nothing() -> Result<()> {
    let app = spawn_app().await?;
    let session = app.login("zoe").await?;
    assert_eq!(session["region_id"], json!(null));
    assert_eq!(session["region_selection_required"], json!(false));
    let token = session["access_token"].as_str().unwrap();

    assert_eq!(app.get("/api/cases", token).await?.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/api/cases/1", token).await?.status, StatusCode::FORBIDDEN);

    let regions = app.get("/api/regions", token).await?;
    assert_eq!(regions.status, StatusCode::OK);
    assert_eq!(regions.data(), &json!([]));
    Ok(())
}

#[tokio::test]
async fn region_less_token_cannot_use_section_policies() -> Result<()> {
    let app = spawn_app().await?;
    let session = app.login("ana").await?;
    let token = session["access_token"].as_str().unwrap();
    assert_eq!(app.get("/api/cases", token).await?.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn create_assigns_the_current_region() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ana, 7).await?;

    let created = app
        .request(
            Method::POST,
            "/api/cases",
            Some(&token),
            Some(json!({ "case_number": "S-0100", "title": "Carver v. Dunmore" })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.data()["region_id"], json!(7));

    let invalid = app
        .request(Method::POST, "/api/cases", Some(&token), Some(json!({ "case_number": " ", "title": "" })))
        .await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert!(invalid.body["field_errors"]["title"].is_string());
    Ok(())
}

#[tokio::test]
async fn permissions_follow_the_current_region() -> Result<()> {
    let app = spawn_app().await?;
    // Lawyer may delete in 5 but not in 7.
    let in_seven = app.token_in(app.ana, 7).await?;
    let refused = app.request(Method::DELETE, "/api/cases/1", Some(&in_seven), None).await?;
    assert_eq!(refused.status, StatusCode::FORBIDDEN);

    let in_five = app.token_in(app.ana, 5).await?;
    let deleted = app.request(Method::DELETE, "/api/cases/1", Some(&in_five), None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(app.records.case(1).await.is_none());
    Ok(())
}

#[tokio::test]
async fn moving_a_case_requires_create_rights_in_the_target() -> Result<()> {
    let app = spawn_app().await?;

    let ben = app.token_in(app.ben, 5).await?;
    let outside = app
        .request(Method::PUT, "/api/cases/1", Some(&ben), Some(json!({ "region_id": 9 })))
        .await?;
    assert_eq!(outside.status, StatusCode::FORBIDDEN);
    assert_eq!(app.records.case(1).await.and_then(|c| c.region_id), Some(5));

    let ana = app.token_in(app.ana, 5).await?;
    let moved = app
        .request(Method::PUT, "/api/cases/1", Some(&ana), Some(json!({ "region_id": 7, "title": "Estate of Alvarez (S)" })))
        .await?;
    assert_eq!(moved.status, StatusCode::OK);
    assert_eq!(moved.data()["region_id"], json!(7));
    assert_eq!(moved.data()["title"], json!("Estate of Alvarez (S)"));
    Ok(())
}

#[tokio::test]
async fn lost_membership_rejects_the_outstanding_token() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ana, 5).await?;
    assert_eq!(app.get("/api/cases", &token).await?.status, StatusCode::OK);

    app.access.remove_membership(app.ana, 5).await;
    assert_eq!(app.get("/api/cases", &token).await?.status, StatusCode::FORBIDDEN);

    app.access.add_membership(app.ana, 5).await;
    app.access.set_region_active(5, false).await;
    assert_eq!(app.get("/api/cases", &token).await?.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn reference_data_and_chat_are_region_scoped() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ben, 5).await?;

    let judges = app.get("/api/judges", &token).await?;
    assert_eq!(judges.status, StatusCode::OK);
    assert_eq!(ids(judges.data()), vec![100]);
    assert_eq!(app.get("/api/judges/101", &token).await?.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/case-types/200", &token).await?.status, StatusCode::OK);

    let chat = app.get("/api/cases/1/chat", &token).await?;
    assert_eq!(chat.status, StatusCode::OK);
    assert_eq!(chat.data()["channel"], json!("case-1"));
    Ok(())
}

#[tokio::test]
async fn store_outage_fails_closed() -> Result<()> {
    let app = spawn_app().await?;
    let token = app.token_in(app.ben, 5).await?;
    app.access.set_unavailable(true).await;

    let response = app.get("/api/cases", &token).await?;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["code"], json!("INTERNAL_SERVER_ERROR"));
    Ok(())
}

fn ordered_ids(list: &serde_json::Value) -> Vec<i64> {
    list.as_array()
        .map(|rows| rows.iter().filter_map(|row| row["id"].as_i64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn listing_honours_order_and_window() -> Result<()> {
    let mut config = test_config();
    config.access.region_policy = RegionPolicy::MembersAndGlobal;
    let app = spawn_app_with(config).await?;
    let token = app.token_in(app.ana, 5).await?;

    let by_title = app.get("/api/cases?order=title%20desc", &token).await?;
    assert_eq!(ordered_ids(&by_title.data()["cases"]), vec![51, 50, 1, 2]);

    // Null regions sort after every region, as in Postgres.
    let by_region = app.get("/api/cases?order=region_id", &token).await?;
    assert_eq!(ordered_ids(&by_region.data()["cases"]), vec![51, 1, 2, 50]);

    let skipped = app.get("/api/cases?offset=1", &token).await?;
    assert_eq!(ordered_ids(&skipped.data()["cases"]), vec![2, 50, 51]);
    assert_eq!(skipped.data()["total"], json!(4));

    let window = app.get("/api/cases?limit=2&offset=1", &token).await?;
    assert_eq!(ordered_ids(&window.data()["cases"]), vec![2, 50]);

    let unknown = app.get("/api/cases?order=password_hash", &token).await?;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.body["code"], json!("VALIDATION_ERROR"));
    Ok(())
}
