//! Integration tests for the public profiles API.

mod common;

use axum::http::{header, StatusCode};
use chrono::{Datelike, Utc};
use common::*;
use profiles_service::models::{Address, Affiliation, Name, PartialDate, Profile};
use profiles_service::repositories::ProfileRepository;
use serde_json::json;

const PROFILE_LIST: &str = "application/vnd.elife.profile-list+json;version=1";
const PROFILE: &str = "application/vnd.elife.profile+json;version=1";

async fn app_with_profiles() -> TestApp {
    let app = TestApp::new();
    for (id, name, orcid) in [
        ("aaaaaaaa", "Alice Adams", Some("0000-0002-1825-0097")),
        ("bbbbbbbb", "Bob Brown", None),
        ("cccccccc", "Carol Clark", None),
    ] {
        app.profiles
            .add(Profile::new(id, Name::new(name), orcid.map(str::to_string)))
            .await
            .unwrap();
    }
    app
}

fn ids(body: &serde_json::Value) -> Vec<String> {
    body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn ping() {
    let app = TestApp::new();

    let response = app.get("/ping").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "text/plain; charset=UTF-8");
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "must-revalidate, no-cache, no-store, private"
    );
    assert_eq!(body_text(response).await, "pong");
}

#[tokio::test]
async fn empty_list() {
    let app = TestApp::new();

    let response = app.get("/profiles").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), PROFILE_LIST);
    assert_eq!(body_json(response).await, json!({"total": 0, "items": []}));
}

#[tokio::test]
async fn list_is_ordered_by_index_name() {
    let app = app_with_profiles().await;

    let body = body_json(app.get("/profiles").await).await;
    assert_eq!(body["total"], 3);
    assert_eq!(ids(&body), vec!["cccccccc", "bbbbbbbb", "aaaaaaaa"]);
    assert_eq!(
        body["items"][2],
        json!({
            "id": "aaaaaaaa",
            "name": {"preferred": "Alice Adams", "index": "Adams, Alice"},
            "orcid": "0000-0002-1825-0097"
        })
    );
    assert!(body["items"][0].get("orcid").is_none());

    let body = body_json(app.get("/profiles?order=asc").await).await;
    assert_eq!(ids(&body), vec!["aaaaaaaa", "bbbbbbbb", "cccccccc"]);
}

#[tokio::test]
async fn list_is_paginated() {
    let app = app_with_profiles().await;

    let body = body_json(app.get("/profiles?page=2&per-page=2&order=asc").await).await;
    assert_eq!(body["total"], 3);
    assert_eq!(ids(&body), vec!["cccccccc"]);

    let response = app.get("/profiles?page=3&per-page=2").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "application/problem+json");
}

#[tokio::test]
async fn list_rejects_invalid_parameters() {
    let app = app_with_profiles().await;

    for query in [
        "page=0",
        "page=foo",
        "page=01",
        "per-page=0",
        "per-page=101",
        "order=sideways",
        "page=9223372036854775807&per-page=100",
    ] {
        let response = app.get(&format!("/profiles?{}", query)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", query);
        assert_eq!(content_type(&response), "application/problem+json");
    }
}

#[tokio::test]
async fn get_profile() {
    let app = TestApp::new();
    let today = Utc::now().date_naive();

    let mut profile = Profile::new(
        "a1b2c3d4",
        Name::new("Josiah Carberry"),
        Some("0000-0002-1825-0097".to_string()),
    );
    profile.add_email_address("public@example.com", true, false);
    profile.add_email_address("private@example.com", false, true);

    let mut current = Affiliation::new(
        "1",
        "Brown University",
        Address::new("Providence", Some("RI".to_string()), "us"),
        Some(PartialDate::Year(today.year() - 5)),
    );
    current.department = Some("Psychoceramics".to_string());
    profile.add_affiliation(current, 0);

    let mut past = Affiliation::new(
        "2",
        "Wesleyan University",
        Address::new("Middletown", None, "US"),
        Some(PartialDate::Year(today.year() - 20)),
    );
    past.ends = Some(PartialDate::Year(today.year() - 10));
    profile.add_affiliation(past, 1);

    let mut restricted = Affiliation::new(
        "3",
        "Hidden Institute",
        Address::new("Nowhere", None, "GB"),
        None,
    );
    restricted.restricted = true;
    profile.add_affiliation(restricted, 2);

    app.profiles.add(profile).await.unwrap();

    let response = app.get("/profiles/a1b2c3d4").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), PROFILE);
    assert_eq!(
        body_json(response).await,
        json!({
            "id": "a1b2c3d4",
            "name": {"preferred": "Josiah Carberry", "index": "Carberry, Josiah"},
            "orcid": "0000-0002-1825-0097",
            "emailAddresses": ["public@example.com"],
            "affiliations": [{
                "name": ["Psychoceramics", "Brown University"],
                "address": {
                    "formatted": ["Providence", "RI", "US"],
                    "components": {
                        "locality": ["Providence"],
                        "area": ["RI"],
                        "country": "US"
                    }
                }
            }]
        })
    );
}

#[tokio::test]
async fn missing_profile_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/profiles/zzzzzzzz").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "application/problem+json");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/nothing-here").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&response), "application/problem+json");
}
