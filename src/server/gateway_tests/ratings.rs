use axum::http::StatusCode;
use serde_json::json;

use super::common::*;

#[tokio::test]
async fn repeated_ratings_upsert_one_document() {
    let t = test_app();
    for r in [1, 4, 3] {
        let (status, _, body) = send(
            &t.app,
            post_json_as("/ratings", "u1", &json!({ "scenarioId": "s1", "rating": r })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rating"]["rating"], r);
        assert_eq!(body["aggregate"]["count"], 1);
    }

    let stored = t.state.store.list_scenario_ratings("s1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].rating, 3);
    assert_eq!(stored[0].user_id, "u1");
}

#[tokio::test]
async fn out_of_range_ratings_are_rejected_without_writes() {
    let t = test_app();
    for bad in [json!(0), json!(6), json!(-1), json!(3.5), json!("4"), json!(null)] {
        let (status, _, body) = send(
            &t.app,
            post_json_as("/ratings", "u1", &json!({ "scenarioId": "s1", "rating": bad })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "rating {bad}");
        assert_eq!(body["error"]["type"], "invalid_request");
    }
    assert!(t.state.store.list_all_ratings().unwrap().is_empty());
}

#[tokio::test]
async fn rating_requires_identity_and_scenario() {
    let t = test_app();
    let (status, _, _) = send(
        &t.app,
        post_json("/ratings", &json!({ "scenarioId": "s1", "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&t.app, post_json_as("/ratings", "u1", &json!({ "rating": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(t.state.store.list_all_ratings().unwrap().is_empty());
}

#[tokio::test]
async fn aggregates_per_scenario_and_across_all() {
    let t = test_app();
    for (user, scenario, r) in [("u1", "s1", 5), ("u2", "s1", 4), ("u1", "s2", 2)] {
        let (status, _, _) = send(
            &t.app,
            post_json_as("/ratings", user, &json!({ "scenarioId": scenario, "rating": r })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, body) = send(&t.app, get("/ratings?scenarioId=s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aggregate"]["count"], 2);
    assert_eq!(body["aggregate"]["average"], 4.5);

    let (_, _, body) = send(&t.app, get("/ratings?all=true")).await;
    assert_eq!(body["aggregates"]["s1"]["count"], 2);
    assert_eq!(body["aggregates"]["s2"]["average"], 2.0);

    let (status, _, _) = send(&t.app, get("/ratings")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, body) = send(&t.app, get("/ratings?scenarioId=nobody-rated-this")).await;
    assert_eq!(body["aggregate"]["count"], 0);
}

#[tokio::test]
async fn user_ratings_only_show_the_callers_own() {
    let t = test_app();
    t.state.store.upsert_rating("s1", "u1", 5, 1).unwrap();
    t.state.store.upsert_rating("s2", "u1", 1, 1).unwrap();
    t.state.store.upsert_rating("s1", "u2", 3, 1).unwrap();

    let (status, _, body) = send(&t.app, get_as("/ratings/user", "u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ratings"].as_array().unwrap().len(), 2);

    let (_, _, body) = send(&t.app, get_as("/ratings/user?scenarioId=s1", "u2")).await;
    assert_eq!(body["rating"]["rating"], 3);

    let (_, _, body) = send(&t.app, get_as("/ratings/user?scenarioId=s2", "u2")).await;
    assert!(body["rating"].is_null());

    let (status, _, _) = send(&t.app, get("/ratings/user")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
