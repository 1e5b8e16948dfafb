use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use booking_extract::services::ai::{
    ChatRequest, GenerationOptions, LlmProvider, StructuredClient,
};
use booking_extract::services::extraction::BookingExtractor;
use booking_extract::services::prompts::PromptSet;
use booking_extract::services::selection::ProviderSelector;
use booking_extract::state::AppState;

// ── Mock Provider ──

struct MockLlm {
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        let system = request.messages[0].content.as_str();
        // The first user message carries the transcript, also on re-asks.
        let user = request
            .messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");

        // Simple deterministic responses based on prompt content
        if user.contains("backend down") {
            anyhow::bail!("connection refused");
        }
        if user.contains("gibberish") {
            return Ok("I'm not sure what you mean".to_string());
        }

        if system.contains("confirm a booking") {
            let yes = user.contains("yes") || user.contains("go ahead");
            return Ok(format!(r#"{{"provider_id":"p-1","confirmed":{yes}}}"#));
        }

        if system.contains("offered these cleaning providers") {
            return Ok(if user.contains("second") {
                r#"{"provider_id":"p-2","confirmed":false}"#.to_string()
            } else if user.contains("Maria") {
                r#"{"provider_id":"p-1","confirmed":false}"#.to_string()
            } else {
                r#"{"provider_id":null,"confirmed":false}"#.to_string()
            });
        }

        if user.contains("deep clean") {
            Ok(r#"{"service_type":"deep","date":"2025-06-15","time":null,"duration_hours":null,"location":null}"#.to_string())
        } else if user.contains("at 2pm") {
            Ok(r#"{"service_type":null,"date":null,"time":"14:00","duration_hours":null,"location":null}"#.to_string())
        } else if user.contains("Oak St") {
            Ok(r#"{"service_type":"standard","date":"2025-06-15","time":"09:00","duration_hours":3,"location":"12 Oak St"}"#.to_string())
        } else {
            Ok(r#"{"service_type":null,"date":null,"time":null,"duration_hours":null,"location":null}"#.to_string())
        }
    }
}

// ── Helpers ──

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<ChatRequest>>>) {
    let prompts = Arc::new(PromptSet::from_yaml_str(include_str!("../prompts.yaml")).unwrap());
    let requests = Arc::new(Mutex::new(vec![]));
    let llm: Arc<dyn LlmProvider> = Arc::new(MockLlm {
        requests: Arc::clone(&requests),
    });
    let client = StructuredClient::new(llm);
    let options = GenerationOptions {
        temperature: 0.1,
        max_retries: 2,
    };

    let state = Arc::new(AppState {
        extractor: BookingExtractor::new(client.clone(), prompts.clone(), options),
        selector: ProviderSelector::new(client, prompts, options),
    });
    (state, requests)
}

fn test_app(state: Arc<AppState>) -> Router {
    booking_extract::router(state)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

const PROVIDERS: &str = r#"[
    {"id":"p-1","name":"Maria's Cleaning","rating":4.9},
    {"id":"p-2","name":"Sparkle Co","rating":4.7},
    {"id":"p-3","name":"Fresh Start","rating":4.5}
]"#;

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "ok");
    assert!(requests.lock().unwrap().is_empty());
}

// ── Extraction ──

#[tokio::test]
async fn test_extract_first_turn() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/extract",
            r#"{"transcript":"I need a deep clean on June 15th"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["booking"]["service_type"], "deep");
    assert_eq!(json["booking"]["date"], "2025-06-15");
    assert!(json["booking"]["time"].is_null());
    assert_eq!(
        json["missing_fields"],
        serde_json::json!(["time", "duration_hours", "location"])
    );
    assert_eq!(
        json["clarification_prompt"],
        "What time should the cleaner arrive? How many hours do you need?"
    );

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].json_mode);
    assert!(requests[0].messages[0].content.contains("Today is "));
    assert!(!requests[0].messages[1].content.contains("Details already collected"));
}

#[tokio::test]
async fn test_extract_merges_existing_booking() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/extract",
            r#"{"transcript":"at 2pm please","existing_booking":{"date":"2024-06-01","time":null}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["booking"]["date"], "2024-06-01");
    assert_eq!(json["booking"]["time"], "14:00");
    assert_eq!(
        json["missing_fields"],
        serde_json::json!(["service_type", "duration_hours", "location"])
    );

    // Three fields missing, only two questions asked.
    let clarification = json["clarification_prompt"].as_str().unwrap();
    assert!(clarification.starts_with("What type of cleaning would you like"));
    assert!(clarification.ends_with("How many hours do you need?"));
    assert!(!clarification.contains("address"));

    let requests = requests.lock().unwrap();
    let user = &requests[0].messages[1].content;
    assert!(user.contains("at 2pm please"));
    assert!(user.contains("Details already collected from earlier in the conversation: date: 2024-06-01"));
}

#[tokio::test]
async fn test_extract_complete_booking_has_no_clarification() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/extract",
            r#"{"transcript":"standard clean, 3 hours at 12 Oak St, June 15 at nine"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["missing_fields"], serde_json::json!([]));
    assert!(json["clarification_prompt"].is_null());
    assert_eq!(json["booking"]["duration_hours"], 3.0);
    assert_eq!(json["booking"]["location"], "12 Oak St");
}

#[tokio::test]
async fn test_extract_null_extraction_keeps_prior_values() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/extract",
            r#"{"transcript":"hmm let me think","existing_booking":{"service_type":"move_in_out","location":"4 Elm Rd"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["booking"]["service_type"], "move_in_out");
    assert_eq!(json["booking"]["location"], "4 Elm Rd");
    assert_eq!(
        json["missing_fields"],
        serde_json::json!(["date", "time", "duration_hours"])
    );
}

#[tokio::test]
async fn test_extract_blank_transcript_rejected() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json("/extract", r#"{"transcript":"   "}"#))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = body_json(res).await;
    assert_eq!(json["error"], "transcript is required");
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_missing_transcript_rejected() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json("/extract", r#"{"existing_booking":null}"#))
        .await
        .unwrap();

    assert!(res.status().is_client_error());
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_extract_invalid_output_exhausts_retries() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json("/extract", r#"{"transcript":"gibberish"}"#))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(res).await;
    assert!(json["error"].as_str().unwrap().contains("after 2 attempt(s)"));
    assert_eq!(requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_extract_backend_down() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json("/extract", r#"{"transcript":"backend down"}"#))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(res).await;
    assert!(json["error"].as_str().unwrap().contains("connection refused"));
    assert_eq!(requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_extractions_are_independent() {
    let (state, _) = test_state();

    let first = test_app(state.clone()).oneshot(post_json(
        "/extract",
        r#"{"transcript":"deep clean please"}"#,
    ));
    let second = test_app(state).oneshot(post_json(
        "/extract",
        r#"{"transcript":"at 2pm","existing_booking":{"location":"4 Elm Rd"}}"#,
    ));
    let (first, second) = tokio::join!(first, second);

    let first = body_json(first.unwrap()).await;
    let second = body_json(second.unwrap()).await;
    assert_eq!(first["booking"]["service_type"], "deep");
    assert!(first["booking"]["location"].is_null());
    assert_eq!(second["booking"]["time"], "14:00");
    assert_eq!(second["booking"]["location"], "4 Elm Rd");
    assert!(second["booking"]["service_type"].is_null());
}

// ── Selection ──

#[tokio::test]
async fn test_select_by_ordinal() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            &format!(r#"{{"transcript":"the second one","providers":{PROVIDERS}}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["provider_id"], "p-2");
    assert_eq!(json["confirmed"], false);

    let requests = requests.lock().unwrap();
    let system = &requests[0].messages[0].content;
    assert!(system.contains(
        "1. Maria's Cleaning (id: p-1)\n2. Sparkle Co (id: p-2)\n3. Fresh Start (id: p-3)"
    ));
}

#[tokio::test]
async fn test_select_by_name() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            &format!(r#"{{"transcript":"Maria's sounds good","providers":{PROVIDERS},"awaiting_confirmation":false}}"#),
        ))
        .await
        .unwrap();

    let json = body_json(res).await;
    assert_eq!(json["provider_id"], "p-1");
}

#[tokio::test]
async fn test_select_no_confident_match() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            &format!(r#"{{"transcript":"whoever is cheapest","providers":{PROVIDERS}}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert!(json["provider_id"].is_null());
    assert_eq!(json["confirmed"], false);
}

#[tokio::test]
async fn test_select_confirmation_affirmative() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            &format!(r#"{{"transcript":"yes go ahead","providers":{PROVIDERS},"awaiting_confirmation":true}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["confirmed"], true);
    assert!(json["provider_id"].is_null());

    let requests = requests.lock().unwrap();
    assert!(!requests[0].messages[0].content.contains("Sparkle Co"));
}

#[tokio::test]
async fn test_select_confirmation_negative() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            r#"{"transcript":"no, not that one","providers":[],"awaiting_confirmation":true}"#,
        ))
        .await
        .unwrap();

    let json = body_json(res).await;
    assert_eq!(json["confirmed"], false);
}

#[tokio::test]
async fn test_select_blank_transcript_rejected() {
    let (state, requests) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(post_json(
            "/select",
            &format!(r#"{{"transcript":"\n ","providers":{PROVIDERS}}}"#),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(requests.lock().unwrap().is_empty());
}
