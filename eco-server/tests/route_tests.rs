
use eco_types::{AttemptPhase, AttemptResponse, AttemptView, BestScoreRecord, QuizSummary};
use test_helpers::*;
use uuid::Uuid;
use warp::http::StatusCode;

#[tokio::test]
async fn test_health() {
    let setup = TestServerSetup::new().await;
    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&setup.routes())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "OK");
}

#[tokio::test]
async fn test_list_quizzes() {
    let setup = TestServerSetup::new().await;
    let quiz = setup.add_quiz(4, 40).await;

    let response = warp::test::request()
        .method("GET")
        .path("/quizzes")
        .reply(&setup.routes())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let quizzes: Vec<QuizSummary> = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0].id, quiz.id);
    assert_eq!(quizzes[0].question_count, 4);
}

#[tokio::test]
async fn test_attempt_requires_auth() {
    let setup = TestServerSetup::new().await;
    let quiz = setup.add_quiz(2, 10).await;

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .reply(&setup.routes())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .header("authorization", "Bearer not-a-user")
        .reply(&setup.routes())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_start_unknown_quiz() {
    let setup = TestServerSetup::new().await;
    let user_id = setup.add_user("Noor", 0).await;

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", Uuid::new_v4()))
        .header("authorization", bearer(user_id))
        .reply(&setup.routes())
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("could not be loaded"));
    assert!(body["kind"]["DefinitionUnavailable"].is_object());
}

#[tokio::test]
async fn test_attempt_round_trip_awards_points() {
    let setup = TestServerSetup::new().await;
    let user_id = setup.add_user("Kai", 10).await;
    let quiz = setup.add_quiz(2, 20).await;
    let routes = setup.routes();

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let view: AttemptView = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(view.phase, AttemptPhase::InProgress);
    let question = view.question.unwrap();
    assert_eq!(question.options.len(), 3);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert!(body["question"].get("correct_index").is_none());

    let attempt_path = format!("/attempts/{}", view.attempt_id);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/answer", attempt_path))
        .header("authorization", bearer(user_id))
        .json(&serde_json::json!({ "option_index": 2 }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/finish", attempt_path))
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let finished: AttemptResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(finished.error, None);
    assert_eq!(finished.attempt.phase, AttemptPhase::Settled);
    let result = finished.attempt.result.unwrap();
    assert_eq!(result.score_percent, 50);
    assert_eq!(result.points_delta, 10);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/quizzes/{}/best", quiz.id))
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let best: Option<BestScoreRecord> = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(best.unwrap().score_percent, 50);

    let response = warp::test::request()
        .method("GET")
        .path("/me")
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["user"]["total_points"], 20);
    assert_eq!(body["rank"], 1);

    let response = warp::test::request()
        .method("GET")
        .path("/me/scores")
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    let scores: Vec<BestScoreRecord> = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].quiz_id, quiz.id);
}

#[tokio::test]
async fn test_invalid_answer_and_closed_attempt() {
    let setup = TestServerSetup::new().await;
    let user_id = setup.add_user("Ines", 0).await;
    let quiz = setup.add_quiz(1, 10).await;
    let routes = setup.routes();

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    let view: AttemptView = serde_json::from_slice(response.body()).unwrap();
    let attempt_path = format!("/attempts/{}", view.attempt_id);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/answer", attempt_path))
        .header("authorization", bearer(user_id))
        .json(&serde_json::json!({ "option_index": 9 }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Advancing past the only question submits it
    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/advance", attempt_path))
        .header("authorization", bearer(user_id))
        .reply(&routes)
        .await;
    let advanced: AttemptResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(advanced.attempt.phase, AttemptPhase::Settled);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("{}/answer", attempt_path))
        .header("authorization", bearer(user_id))
        .json(&serde_json::json!({ "option_index": 2 }))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_exit_and_foreign_attempts() {
    let setup = TestServerSetup::new().await;
    let owner = setup.add_user("Owner", 0).await;
    let other = setup.add_user("Other", 0).await;
    let quiz = setup.add_quiz(2, 10).await;
    let routes = setup.routes();

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .header("authorization", bearer(owner))
        .reply(&routes)
        .await;
    let view: AttemptView = serde_json::from_slice(response.body()).unwrap();
    let attempt_path = format!("/attempts/{}", view.attempt_id);

    let response = warp::test::request()
        .method("GET")
        .path(&attempt_path)
        .header("authorization", bearer(other))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = warp::test::request()
        .method("DELETE")
        .path(&attempt_path)
        .header("authorization", bearer(owner))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = warp::test::request()
        .method("GET")
        .path(&attempt_path)
        .header("authorization", bearer(owner))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/quizzes/{}/best", quiz.id))
        .header("authorization", bearer(owner))
        .reply(&routes)
        .await;
    let best: Option<BestScoreRecord> = serde_json::from_slice(response.body()).unwrap();
    assert!(best.is_none());
}

#[tokio::test]
async fn test_leaderboard_limit() {
    let setup = TestServerSetup::new().await;
    for (name, points) in [("Ada", 30), ("Bo", 50), ("Cy", 10)] {
        setup.add_user(name, points).await;
    }

    let response = warp::test::request()
        .method("GET")
        .path("/leaderboard?limit=2")
        .reply(&setup.routes())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user"]["display_name"], "Bo");
    assert_eq!(entries[1]["rank"], 2);
}

#[tokio::test]
async fn test_first_attempt_provisions_user() {
    let setup = TestServerSetup::new().await;
    let quiz = setup.add_quiz(1, 8).await;
    let newcomer = Uuid::new_v4();
    let routes = setup.routes();

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/quizzes/{}/attempts", quiz.id))
        .header("authorization", bearer(newcomer))
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let view: AttemptView = serde_json::from_slice(response.body()).unwrap();

    warp::test::request()
        .method("POST")
        .path(&format!("/attempts/{}/answer", view.attempt_id))
        .header("authorization", bearer(newcomer))
        .json(&serde_json::json!({ "option_index": 2 }))
        .reply(&routes)
        .await;
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/attempts/{}/finish", view.attempt_id))
        .header("authorization", bearer(newcomer))
        .reply(&routes)
        .await;
    let finished: AttemptResponse = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(finished.error, None);

    let user = setup.user_repository.find_by_id(newcomer).await.unwrap().unwrap();
    assert_eq!(user.total_points, 8);
}
