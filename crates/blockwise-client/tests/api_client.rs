use std::sync::Arc;

use blockwise_client::{ApiClient, ApiError};
use blockwise_core::{
    AuthSession, ChannelNotifier, CompileController, CompileOutcome, NotificationKind,
    SessionContext, SessionError, Submission, TaskDraft,
};
use blockwise_types::{
    AssignmentAction, ChapterChangeRequest, CompileRequest, Credentials, Language, Role, Tab,
};
use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in(role: Role) -> SessionContext {
    let now = Utc::now();
    SessionContext::with_session(AuthSession {
        user_id: "1".to_string(),
        email: "dev@blockwise.test".to_string(),
        role,
        access_token: "test-token".to_string(),
        issued_at: now,
        expires_at: now + Duration::minutes(30),
    })
}

fn credentials() -> Credentials {
    Credentials {
        email: "dev@blockwise.test".to_string(),
        password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn sign_in_populates_shared_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .and(body_json(json!({
            "email": "dev@blockwise.test",
            "password": "hunter22"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": 12,
            "token": "issued-token",
            "expires_at": (Utc::now() + Duration::hours(6)).timestamp_millis(),
            "role": "ADMIN"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = SessionContext::new();
    let client = ApiClient::for_base_url(&server.uri(), session.clone()).expect("client");
    let signed = client.sign_in(&credentials()).await.expect("sign in");

    assert_eq!(signed.user_id, "12");
    assert_eq!(signed.role, Role::Admin);
    // Capped by the default one hour session lifetime.
    assert!(signed.expires_at <= Utc::now() + Duration::hours(1));
    assert_eq!(session.bearer().as_deref(), Ok("issued-token"));
}

#[tokio::test]
async fn rejected_sign_in_leaves_session_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signin"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let session = SessionContext::new();
    let client = ApiClient::for_base_url(&server.uri(), session.clone()).expect("client");
    let err = client.sign_in(&credentials()).await.expect_err("rejected");

    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Invalid credentials"));
    assert!(!session.is_signed_in());
}

#[tokio::test]
async fn sign_up_surfaces_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/signup"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "message": "Email already in use" })),
        )
        .mount(&server)
        .await;

    let client = ApiClient::for_base_url(&server.uri(), SessionContext::new()).expect("client");
    match client.sign_up(&credentials()).await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "Email already in use");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn get_task_sends_bearer_and_decodes_sections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/3"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "title": "Storage",
            "description": "Persist a value",
            "text": "# Storage\n\nWrite a setter.",
            "solidity": {
                "currentTab": { "tabName": "Storage.sol", "tabContent": "contract S {}" },
                "tabs": [{ "tabName": "IStorage.sol", "tabContent": "interface I {}" }],
                "test": { "tabName": "", "tabContent": "" }
            },
            "sui": {
                "currentTab": { "tabName": "", "tabContent": "" },
                "tabs": []
            }
        })))
        .mount(&server)
        .await;

    let client =
        ApiClient::for_base_url(&server.uri(), signed_in(Role::User)).expect("client");
    let task = client.get_task(3).await.expect("task");

    assert_eq!(task.title, "Storage");
    assert_eq!(task.solidity.current_tab.name, "Storage.sol");
    assert_eq!(task.solidity.tabs.len(), 1);
    assert!(task.is_text_only());
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chapter/test"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client =
        ApiClient::for_base_url(&server.uri(), signed_in(Role::User)).expect("client");
    let err = client.list_chapters().await.expect_err("decode");
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn catalog_reads_need_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let client = ApiClient::for_base_url(&server.uri(), SessionContext::new()).expect("client");
    let err = client.list_tasks().await.expect_err("no session");
    assert!(matches!(err, ApiError::Session(SessionError::NotSignedIn)));
}

#[tokio::test]
async fn chapter_listing_and_task_summaries_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chapter/test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "title": "Basics", "description": "Start here" },
            { "id": 2, "title": "Tokens" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chapter/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 10, "title": "Hello", "description": "First contract" }
        ])))
        .mount(&server)
        .await;

    let client =
        ApiClient::for_base_url(&server.uri(), signed_in(Role::User)).expect("client");
    let chapters = client.list_chapters().await.expect("chapters");
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[1].description, "");

    let tasks = client.chapter_tasks(1).await.expect("tasks");
    assert_eq!(tasks[0].id, 10);
}

#[tokio::test]
async fn authoring_is_refused_for_plain_users_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client =
        ApiClient::for_base_url(&server.uri(), signed_in(Role::User)).expect("client");
    let request = TaskDraft::new("Blocked").build().expect("draft");
    let err = client.create_task(&request).await.expect_err("forbidden");
    assert!(matches!(err, ApiError::Session(SessionError::Forbidden)));
}

#[tokio::test]
async fn admins_can_create_tasks_and_assign_them() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/create"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chapter/change"))
        .and(body_json(json!({ "chapterId": 4, "taskId": 9, "type": 1 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        ApiClient::for_base_url(&server.uri(), signed_in(Role::Admin)).expect("client");
    let mut draft = TaskDraft::new("Vaults");
    draft.solidity.current = Tab::new("Vault.sol", "contract Vault {}");
    client
        .create_task(&draft.build().expect("draft"))
        .await
        .expect("create");
    client
        .change_chapter_assignment(&ChapterChangeRequest::new(4, 9, AssignmentAction::Remove))
        .await
        .expect("unassign");
}

#[tokio::test]
async fn compile_returns_raw_body_without_requiring_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compile/sui"))
        .and(body_json(json!({
            "id": "5",
            "code": { "tabContent": "module m {}", "tabName": "m.move" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("error: unbound module"))
        .mount(&server)
        .await;

    let client = ApiClient::for_base_url(&server.uri(), SessionContext::new()).expect("client");
    let body = client
        .compile_code(
            Language::Sui,
            &CompileRequest::new("5", "module m {}", "m.move"),
        )
        .await
        .expect("compile");
    assert_eq!(body, "error: unbound module");
}

#[tokio::test]
async fn compile_server_error_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compile/solidity"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ApiClient::for_base_url(&server.uri(), SessionContext::new()).expect("client");
    let err = client
        .compile_code(
            Language::Solidity,
            &CompileRequest::new("1", "contract C {}", "C.sol"),
        )
        .await
        .expect_err("500");
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn controller_over_http_reports_success_and_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/compile/solidity"))
        .respond_with(ResponseTemplate::new(200).set_body_string("yes"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/compile/sui"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = ApiClient::for_base_url(&server.uri(), SessionContext::new()).expect("client");
    let (notifier, mut rx) = ChannelNotifier::new();
    let controller = CompileController::new(Arc::new(client), Arc::new(notifier));

    let submission = Submission {
        tab_name: "C.sol".to_string(),
        content: "contract C {}".to_string(),
    };
    let outcome = controller.run(submission.clone(), Language::Solidity, "8").await;
    assert_eq!(outcome, CompileOutcome::Succeeded);
    assert!(!controller.is_compiling(Language::Solidity));
    let toast = rx.recv().await.expect("toast");
    assert_eq!(toast.kind, NotificationKind::Success);

    let outcome = controller.run(submission, Language::Sui, "8").await;
    assert!(matches!(outcome, CompileOutcome::TransportFailed { .. }));
    let toast = rx.recv().await.expect("toast");
    assert_eq!(toast.kind, NotificationKind::Failure);
    assert_eq!(toast.language, Some(Language::Sui));
}
