use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use warp::Filter;
use warp::http::StatusCode;

use crate::attempts::AttemptManager;
use crate::auth::{AuthService, Identity};
use eco_persistence::repositories::{QuizRepository, UserRepository};
use eco_types::{QuizError, UserId};

pub mod attempts;
pub mod auth;
pub mod config;

type JsonReply = warp::reply::WithStatus<warp::reply::Json>;

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u64>,
}

#[derive(Deserialize)]
struct AnswerRequest {
    option_index: usize,
}

#[derive(Serialize)]
struct UserStatsResponse {
    user: eco_types::User,
    rank: Option<u32>,
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> JsonReply {
    warp::reply::with_status(warp::reply::json(body), status)
}

fn error_reply(message: &str, status: StatusCode) -> JsonReply {
    json_reply(&serde_json::json!({ "error": message }), status)
}

fn quiz_error_status(err: &QuizError) -> StatusCode {
    match err {
        QuizError::DefinitionUnavailable { .. } | QuizError::AttemptNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        QuizError::AttemptNotInProgress { .. } => StatusCode::CONFLICT,
        QuizError::InvalidAnswer { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QuizError::ScoreSaveFailed { .. } | QuizError::PointsAwardFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        QuizError::StoreUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn quiz_error_reply(err: QuizError) -> JsonReply {
    let status = quiz_error_status(&err);
    json_reply(
        &serde_json::json!({ "error": err.to_string(), "kind": err }),
        status,
    )
}

fn authenticate_identity(
    auth_service: &AuthService,
    auth_header: Option<String>,
) -> Result<Identity, JsonReply> {
    auth_service
        .authenticate(auth_header.as_deref())
        .map_err(|err| error_reply(&err.to_string(), StatusCode::UNAUTHORIZED))
}

fn authenticate(auth_service: &AuthService, auth_header: Option<String>) -> Result<UserId, JsonReply> {
    authenticate_identity(auth_service, auth_header).map(|identity| identity.user_id)
}

pub fn create_routes(
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
    user_repository: Arc<UserRepository>,
    quiz_repository: Arc<QuizRepository>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // Clone for filters
    let attempt_manager_filter = warp::any().map({
        let attempt_manager = attempt_manager.clone();
        move || attempt_manager.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    let user_repository_filter = warp::any().map({
        let user_repository = user_repository.clone();
        move || user_repository.clone()
    });

    let quiz_repository_filter = warp::any().map({
        let quiz_repository = quiz_repository.clone();
        move || quiz_repository.clone()
    });

    let auth_header = warp::header::optional::<String>("authorization");

    // Health check endpoint
    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Quiz catalogue
    let quizzes = warp::path!("quizzes")
        .and(warp::get())
        .and(quiz_repository_filter.clone())
        .and_then(handle_list_quizzes);

    let best_score = warp::path!("quizzes" / Uuid / "best")
        .and(warp::get())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_best_score);

    // Attempt lifecycle
    let start_attempt = warp::path!("quizzes" / Uuid / "attempts")
        .and(warp::post())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(user_repository_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_start_attempt);

    let view_attempt = warp::path!("attempts" / Uuid)
        .and(warp::get())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_view_attempt);

    let answer = warp::path!("attempts" / Uuid / "answer")
        .and(warp::post())
        .and(warp::body::content_length_limit(1024))
        .and(warp::body::json::<AnswerRequest>())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_answer);

    let advance = warp::path!("attempts" / Uuid / "advance")
        .and(warp::post())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_advance);

    let back = warp::path!("attempts" / Uuid / "back")
        .and(warp::post())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_back);

    let finish = warp::path!("attempts" / Uuid / "finish")
        .and(warp::post())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_finish);

    let exit = warp::path!("attempts" / Uuid)
        .and(warp::delete())
        .and(auth_header.clone())
        .and(attempt_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_exit);

    // Points and records
    let leaderboard = warp::path!("leaderboard")
        .and(warp::get())
        .and(warp::query::<LeaderboardQuery>())
        .and(user_repository_filter.clone())
        .and_then(handle_leaderboard_request);

    let me = warp::path!("me")
        .and(warp::get())
        .and(auth_header.clone())
        .and(user_repository_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_user_stats_request);

    let my_scores = warp::path!("me" / "scores")
        .and(warp::get())
        .and(auth_header.clone())
        .and(quiz_repository_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_user_scores_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "DELETE"]);

    health
        .or(quizzes)
        .or(best_score)
        .or(start_attempt)
        .or(view_attempt)
        .or(answer)
        .or(advance)
        .or(back)
        .or(finish)
        .or(exit)
        .or(leaderboard)
        .or(me)
        .or(my_scores)
        .with(cors)
        .with(warp::log("eco_quiz"))
}

async fn handle_list_quizzes(
    quiz_repository: Arc<QuizRepository>,
) -> Result<JsonReply, warp::Rejection> {
    match quiz_repository.list_quizzes().await {
        Ok(quizzes) => Ok(json_reply(&quizzes, StatusCode::OK)),
        Err(err) => {
            tracing::error!("Failed to list quizzes: {}", err);
            Ok(error_reply(
                "Failed to list quizzes",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_best_score(
    quiz_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.best_score(user_id, quiz_id).await {
        Ok(record) => Ok(json_reply(&record, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_start_attempt(
    quiz_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    user_repository: Arc<UserRepository>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let identity = match authenticate_identity(&auth_service, auth_header) {
        Ok(identity) => identity,
        Err(reply) => return Ok(reply),
    };

    // Best scores reference the users table; without a row no result could be saved
    if let Err(err) = user_repository
        .ensure_user(identity.user_id, identity.email.as_deref())
        .await
    {
        tracing::error!("Failed to provision user {}: {:#}", identity.user_id, err);
        return Ok(quiz_error_reply(QuizError::StoreUnavailable {
            message: "Could not set up your profile, try again later".to_string(),
        }));
    }

    match attempt_manager.start_attempt(identity.user_id, quiz_id).await {
        Ok(view) => Ok(json_reply(&view, StatusCode::CREATED)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_view_attempt(
    attempt_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.view(user_id, attempt_id) {
        Ok(view) => Ok(json_reply(&view, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_answer(
    attempt_id: Uuid,
    request: AnswerRequest,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.select_answer(user_id, attempt_id, request.option_index) {
        Ok(view) => Ok(json_reply(&view, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_back(
    attempt_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.go_back(user_id, attempt_id) {
        Ok(view) => Ok(json_reply(&view, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_exit(
    attempt_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.exit(user_id, attempt_id) {
        Ok(()) => Ok(json_reply(&serde_json::json!({ "exited": attempt_id }), StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_advance(
    attempt_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.advance(user_id, attempt_id).await {
        Ok(response) => Ok(json_reply(&response, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_finish(
    attempt_id: Uuid,
    auth_header: Option<String>,
    attempt_manager: Arc<AttemptManager>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match attempt_manager.finish(user_id, attempt_id).await {
        Ok(response) => Ok(json_reply(&response, StatusCode::OK)),
        Err(err) => Ok(quiz_error_reply(err)),
    }
}

async fn handle_leaderboard_request(
    query: LeaderboardQuery,
    user_repository: Arc<UserRepository>,
) -> Result<JsonReply, warp::Rejection> {
    let limit = query.limit.unwrap_or(10).min(100); // Default 10, max 100

    match user_repository.get_leaderboard(limit).await {
        Ok(leaderboard) => Ok(json_reply(&leaderboard, StatusCode::OK)),
        Err(err) => {
            tracing::error!("Failed to fetch leaderboard: {}", err);
            Ok(error_reply(
                "Failed to fetch leaderboard",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}

async fn handle_user_stats_request(
    auth_header: Option<String>,
    user_repository: Arc<UserRepository>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    let user = match user_repository.find_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return Ok(error_reply("User not found", StatusCode::NOT_FOUND)),
        Err(err) => {
            tracing::error!("Failed to fetch user {}: {}", user_id, err);
            return Ok(error_reply(
                "Failed to fetch user",
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    let rank = user_repository
        .get_user_rank(user_id)
        .await
        .unwrap_or_else(|err| {
            tracing::warn!("Failed to compute rank for user {}: {}", user_id, err);
            None
        });

    Ok(json_reply(&UserStatsResponse { user, rank }, StatusCode::OK))
}

async fn handle_user_scores_request(
    auth_header: Option<String>,
    quiz_repository: Arc<QuizRepository>,
    auth_service: Arc<AuthService>,
) -> Result<JsonReply, warp::Rejection> {
    let user_id = match authenticate(&auth_service, auth_header) {
        Ok(user_id) => user_id,
        Err(reply) => return Ok(reply),
    };

    match quiz_repository.best_scores_for_user(user_id).await {
        Ok(scores) => Ok(json_reply(&scores, StatusCode::OK)),
        Err(err) => {
            tracing::error!("Failed to fetch best scores for user {}: {}", user_id, err);
            Ok(error_reply(
                "Failed to fetch best scores",
                StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
