use std::convert::Infallible;

use futures::StreamExt;
use log::{debug, error, warn};
use serde::Serialize;
use warp::http::{header, HeaderValue, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{reply, Filter, Rejection, Reply};

use super::types::*;
use super::web_server::AppState;
use crate::error_handling::types::TutorError;
use crate::storage::types::QuestionContent;

const SESSION_COOKIE: &str = "session_id";
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Rejection for requests without a usable `session_id` cookie.
#[derive(Debug)]
pub struct MissingSession;

impl warp::reject::Reject for MissingSession {}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Extracts the session cookie, rejecting with [`MissingSession`] when absent.
fn with_session() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).and_then(|cookie: Option<String>| async move {
        cookie
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| warp::reject::custom(MissingSession))
    })
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn success<T: Serialize>(data: T) -> Response {
    reply::json(&ApiEnvelope::success(data)).into_response()
}

/// Handler-level failures keep HTTP 200 and carry the code in the envelope.
fn failure(route: &str, err: TutorError) -> Response {
    match &err {
        TutorError::NoMatch(_) | TutorError::NotFound(_) => debug!("{}: {}", route, err),
        _ => error!("{}: {}", route, err),
    }
    reply::json(&ApiEnvelope::error(err.to_string())).into_response()
}

/// GET /newchat
pub fn new_chat_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("newchat")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(|state: AppState| async move {
            let session = match state.sessions.start_session().await {
                Ok(session) => session,
                Err(e) => return Ok::<_, Rejection>(failure("newchat", e)),
            };
            let mut response = success(NewChatResponse {
                session_id: session.session_id.clone(),
            });
            let cookie = format!("{SESSION_COOKIE}={}; Path=/; SameSite=Lax", session.session_id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            Ok(response)
        })
}

/// POST /new_question_id
pub fn new_question_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("new_question_id")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<NewQuestionRequest>())
        .and(with_state(state))
        .and_then(
            |session_id: String, body: NewQuestionRequest, state: AppState| async move {
                let content = QuestionContent::new(body.user_question, body.ocr_msg);
                Ok::<_, Rejection>(
                    match state.sessions.submit_question(&session_id, &content).await {
                        Ok(question_id) => success(NewQuestionResponse { question_id }),
                        Err(e) => failure("new_question_id", e),
                    },
                )
            },
        )
}

/// POST /knowledge_search
pub fn knowledge_search_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("knowledge_search")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<QuestionRequest>())
        .and(with_state(state))
        .and_then(|_session: String, body: QuestionRequest, state: AppState| async move {
            Ok::<_, Rejection>(
                match state.retrieval.knowledge_search(body.question_id).await {
                    Ok(items) => success(KnowledgeSearchResponse::new(items)),
                    Err(e) => failure("knowledge_search", e),
                },
            )
        })
}

/// POST /web_search
pub fn web_search_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("web_search")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<QuestionRequest>())
        .and(with_state(state))
        .and_then(|_session: String, body: QuestionRequest, state: AppState| async move {
            Ok::<_, Rejection>(match state.retrieval.web_search(body.question_id).await {
                Ok(items) => success(WebSearchResponse::new(items)),
                Err(e) => failure("web_search", e),
            })
        })
}

/// POST /stream_chat, answers as a chunked `text/plain` body
pub fn stream_chat_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("stream_chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<QuestionRequest>())
        .and(with_state(state))
        .and_then(|_session: String, body: QuestionRequest, state: AppState| async move {
            let chunks = match state.answers.stream_answer(body.question_id).await {
                Ok(chunks) => chunks,
                Err(e) => return Ok::<_, Rejection>(failure("stream_chat", e)),
            };
            let body = Body::wrap_stream(chunks.map(Ok::<_, Infallible>));
            let mut response = Response::new(body);
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            Ok(response)
        })
}

/// POST /recommend
pub fn recommend_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("recommend")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<QuestionRequest>())
        .and(with_state(state))
        .and_then(|_session: String, body: QuestionRequest, state: AppState| async move {
            Ok::<_, Rejection>(match state.recommender.recommend(body.question_id).await {
                Ok(recommend_items) => success(RecommendResponse { recommend_items }),
                Err(e) => failure("recommend", e),
            })
        })
}

/// POST /history, earlier questions of the same session with their summaries
pub fn history_route(
    state: AppState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path("history")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_session())
        .and(json_body::<QuestionRequest>())
        .and(with_state(state))
        .and_then(|_session: String, body: QuestionRequest, state: AppState| async move {
            Ok::<_, Rejection>(match state.sessions.history(body.question_id).await {
                Ok(previous) => success(HistoryResponse {
                    questions: previous.iter().map(HistoryEntry::from).collect(),
                }),
                Err(e) => failure("history", e),
            })
        })
}

/// Turns rejections into envelopes so clients always get JSON back.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, envelope) = if err.find::<MissingSession>().is_some() {
        (StatusCode::OK, ApiEnvelope::error("Session ID not found"))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        warn!("Rejected request body: {}", e);
        (
            StatusCode::BAD_REQUEST,
            ApiEnvelope::error_with_code(400, format!("Invalid request body: {e}")),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ApiEnvelope::error_with_code(413, "Request body too large"),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ApiEnvelope::error_with_code(405, "Method not allowed"),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, ApiEnvelope::error_with_code(404, "Not found"))
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiEnvelope::error("Internal server error"),
        )
    };
    Ok(reply::with_status(reply::json(&envelope), status).into_response())
}
