use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use warp::{Filter, Rejection, Reply};

use super::routes::*;
use crate::chat_stream::AnswerOrchestrator;
use crate::error_handling::types::WebError;
use crate::recommendation::Recommender;
use crate::retrieval::RetrievalAggregator;
use crate::session_management::session_manager::SessionManager;

/// Components the HTTP handlers delegate to.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub retrieval: Arc<RetrievalAggregator>,
    pub answers: Arc<AnswerOrchestrator>,
    pub recommender: Arc<Recommender>,
}

/// HTTP API server
pub struct WebServer {
    state: AppState,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// All routes with rejection handling, permissive CORS and access logging.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_credentials(true)
            .allow_methods(vec!["GET", "POST", "OPTIONS"])
            .allow_headers(vec!["content-type", "cookie"]);

        new_chat_route(self.state.clone())
            .or(new_question_route(self.state.clone()))
            .unify()
            .or(knowledge_search_route(self.state.clone()))
            .unify()
            .or(web_search_route(self.state.clone()))
            .unify()
            .or(stream_chat_route(self.state.clone()))
            .unify()
            .or(recommend_route(self.state.clone()))
            .unify()
            .or(history_route(self.state.clone()))
            .unify()
            .recover(handle_rejection)
            .with(cors)
            .with(warp::log("tutorstream::http"))
    }

    /// Serves until `shutdown` resolves.
    pub async fn start(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WebError> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{addr}: {e}")))?;
        info!("Web server listening on http://{}", bound);
        server.await;
        info!("Web server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{Classifier, KnowledgeCatalog};
    use crate::storage::{DatabaseStorage, Storage};
    use crate::summarizer::{SummaryJob, SummaryQueue};
    use crate::test_support::{ok_chunk, temp_storage, FakeAgent, FakeCompletion, FakeWebSearch};
    use crate::upstream::CompletionRequest;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    const CATALOG: &str = r#"[{"id": 17, "title": "函数的零点", "content": {"basic_concept": "使 f(x)=0 的 x"}}]"#;

    struct Harness {
        server: WebServer,
        agent: Arc<FakeAgent>,
        _jobs: mpsc::Receiver<SummaryJob>,
        storage: Arc<DatabaseStorage>,
    }

    async fn harness() -> Harness {
        let storage = temp_storage().await;
        let completion = FakeCompletion::new(|req: &CompletionRequest| {
            let is_math = req.user.contains("f(x)");
            if req.system.starts_with("你需要对用户的问题进行分类") {
                Ok(if is_math { "1" } else { "0" }.to_string())
            } else if req.system.starts_with("根据用户问题判断") {
                Ok("17".to_string())
            } else if req.system.starts_with("根据文本推荐") {
                Ok(r#"["如何求零点？","什么是判别式？"]"#.to_string())
            } else {
                Ok(r#"{"related": false, "keywords": []}"#.to_string())
            }
        });
        let agent = FakeAgent::new();
        let (sender, jobs) = mpsc::channel(8);

        let retrieval = Arc::new(RetrievalAggregator::new(
            storage.clone(),
            Arc::new(Classifier::new(completion.clone())),
            Arc::new(KnowledgeCatalog::from_json(CATALOG).unwrap()),
            FakeWebSearch::returning(Value::Null),
        ));
        let state = AppState {
            sessions: Arc::new(SessionManager::new(storage.clone())),
            retrieval: retrieval.clone(),
            answers: Arc::new(AnswerOrchestrator::new(
                storage.clone(),
                retrieval,
                agent.clone(),
                SummaryQueue::new(sender),
            )),
            recommender: Arc::new(Recommender::new(storage.clone(), completion, None, 3)),
        };
        Harness {
            server: WebServer::new(state),
            agent,
            _jobs: jobs,
            storage,
        }
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    async fn new_session(h: &Harness) -> String {
        let res = warp::test::request()
            .method("GET")
            .path("/newchat")
            .reply(&h.server.routes())
            .await;
        let body = body_json(res.body());
        body["res_data"]["session_id"].as_str().unwrap().to_string()
    }

    async fn post(h: &Harness, path: &str, session: Option<&str>, payload: Value) -> Value {
        let mut req = warp::test::request().method("POST").path(path).json(&payload);
        if let Some(session) = session {
            req = req.header("cookie", format!("session_id={session}"));
        }
        let res = req.reply(&h.server.routes()).await;
        body_json(res.body())
    }

    async fn new_question(h: &Harness, session: &str, text: &str) -> i64 {
        let body = post(
            h,
            "/new_question_id",
            Some(session),
            json!({"user_question": text, "ocr_msg": null}),
        )
        .await;
        assert_eq!(body["code"], 200, "{body}");
        body["res_data"]["question_id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_newchat_sets_cookie() {
        let h = harness().await;
        let res = warp::test::request()
            .method("GET")
            .path("/newchat")
            .reply(&h.server.routes())
            .await;

        assert_eq!(res.status(), 200);
        let body = body_json(res.body());
        assert_eq!(body["code"], 200);
        assert_eq!(body["msg"], "success");
        let session = body["res_data"]["session_id"].as_str().unwrap();
        assert_eq!(session.len(), 32);

        let cookie = res.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with(&format!("session_id={session};")));
    }

    #[tokio::test]
    async fn test_missing_cookie_is_rejected() {
        let h = harness().await;
        let body = post(&h, "/new_question_id", None, json!({"user_question": "1+1"})).await;
        assert_eq!(body, json!({"code": 500, "msg": "Session ID not found"}));

        let body = post(&h, "/stream_chat", None, json!({"question_id": 1})).await;
        assert_eq!(body["msg"], "Session ID not found");
    }

    #[tokio::test]
    async fn test_question_for_unknown_session() {
        let h = harness().await;
        let body = post(
            &h,
            "/new_question_id",
            Some("deadbeef"),
            json!({"user_question": "1+1"}),
        )
        .await;
        assert_eq!(body["code"], 500);
        assert_eq!(body["msg"], "Session not found");
    }

    #[tokio::test]
    async fn test_knowledge_search_envelopes() {
        let h = harness().await;
        let session = new_session(&h).await;
        let math = new_question(&h, &session, "已知函数 f(x)=x^2-1，求零点").await;
        let weather = new_question(&h, &session, "今天天气怎么样").await;

        let body = post(&h, "/knowledge_search", Some(&session), json!({"question_id": math})).await;
        assert_eq!(body["code"], 200);
        assert_eq!(body["res_data"]["type"], "knowledge_search_result");
        assert_eq!(body["res_data"]["knowledge_items"][0]["title"], "函数的零点");
        assert_eq!(
            body["res_data"]["knowledge_items"][0]["content"]["example_problems"],
            ""
        );

        let body =
            post(&h, "/knowledge_search", Some(&session), json!({"question_id": weather})).await;
        assert_eq!(body, json!({"code": 500, "msg": "No need to search"}));
    }

    #[tokio::test]
    async fn test_web_search_without_keywords() {
        let h = harness().await;
        let session = new_session(&h).await;
        let id = new_question(&h, &session, "今天天气怎么样").await;
        let body = post(&h, "/web_search", Some(&session), json!({"question_id": id})).await;
        assert_eq!(body["msg"], "No need to search");
    }

    #[tokio::test]
    async fn test_stream_then_recommend_then_history() {
        let h = harness().await;
        let session = new_session(&h).await;
        let first = new_question(&h, &session, "已知函数 f(x)=x^2-1，求零点").await;
        h.agent
            .script(vec![ok_chunk("零点为 ", "ext-1"), ok_chunk("x=±1", "ext-1")]);

        let res = warp::test::request()
            .method("POST")
            .path("/stream_chat")
            .header("cookie", format!("session_id={session}"))
            .json(&json!({"question_id": first}))
            .reply(&h.server.routes())
            .await;
        assert_eq!(res.status(), 200);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(std::str::from_utf8(res.body()).unwrap(), "零点为 x=±1");

        // The answer is committed after the response has ended
        let id = first as i32;
        for _ in 0..100 {
            if h.storage.get_answer(id).await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let body = post(&h, "/recommend", Some(&session), json!({"question_id": first})).await;
        assert_eq!(
            body["res_data"]["recommend_items"],
            json!(["如何求零点？", "什么是判别式？"])
        );

        let second = new_question(&h, &session, "那顶点呢").await;
        let body = post(&h, "/history", Some(&session), json!({"question_id": second})).await;
        let questions = body["res_data"]["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0]["question_id"], first);
        assert_eq!(
            questions[0]["content"]["user_question"],
            "已知函数 f(x)=x^2-1，求零点"
        );
    }

    #[tokio::test]
    async fn test_stream_unknown_question() {
        let h = harness().await;
        let session = new_session(&h).await;
        let body = post(&h, "/stream_chat", Some(&session), json!({"question_id": 999})).await;
        assert_eq!(body, json!({"code": 500, "msg": "Question not found"}));
        assert!(h.agent.calls().is_empty());
    }

    #[tokio::test]
    async fn test_recommend_before_answer() {
        let h = harness().await;
        let session = new_session(&h).await;
        let id = new_question(&h, &session, "求零点").await;
        let body = post(&h, "/recommend", Some(&session), json!({"question_id": id})).await;
        assert_eq!(body["msg"], "Answer not found");
    }

    #[tokio::test]
    async fn test_bad_body_and_unknown_path() {
        let h = harness().await;
        let res = warp::test::request()
            .method("POST")
            .path("/knowledge_search")
            .header("cookie", "session_id=abc")
            .header("content-type", "application/json")
            .body("{\"question_id\": \"seven\"}")
            .reply(&h.server.routes())
            .await;
        assert_eq!(res.status(), 400);
        assert_eq!(body_json(res.body())["code"], 400);

        let res = warp::test::request()
            .method("GET")
            .path("/nowhere")
            .reply(&h.server.routes())
            .await;
        assert_eq!(res.status(), 404);
    }
}
