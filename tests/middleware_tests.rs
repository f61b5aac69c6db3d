use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode},
    response::Response,
    routing::get,
};
use role_gate::{
    AccessGate, CurrentSubject, FixedSubjectResolver, RoleConfig, RoleEvaluator, Subject,
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

// --- Helpers ---

fn config() -> RoleConfig {
    RoleConfig::new()
        .role("admin", ["read", "edit"])
        .role("user", ["read"])
}

/// Echoes the request's evaluator state so tests can assert on what the
/// initialization layer produced. The extractor argument is the same
/// `RoleEvaluator` instance the layer attached to the request.
async fn describe(evaluator: RoleEvaluator) -> String {
    format!(
        "authorized={} user={} admin={}",
        evaluator.is_authorized(),
        evaluator.is("user"),
        evaluator.is("admin"),
    )
}

fn app(gate: &AccessGate) -> Router {
    Router::new()
        .route("/", get(describe))
        .layer(gate.initialize())
}

fn request_as(subject: Option<Subject>) -> Request<Body> {
    let mut builder = Request::builder().uri("/");
    if let Some(subject) = subject {
        builder = builder.extension(CurrentSubject(subject));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// --- Initialization Outcomes ---

#[tokio::test]
async fn subject_with_role_is_authorized_with_that_role() {
    let gate = AccessGate::new(config());

    let subject = Subject {
        id: Some(Uuid::new_v4()),
        roles: vec!["user".to_string()],
    };
    let response = app(&gate).oneshot(request_as(Some(subject))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "authorized=true user=true admin=false"
    );
}

#[tokio::test]
async fn subject_without_roles_is_authorized_with_none() {
    let gate = AccessGate::new(config());

    let response = app(&gate)
        .oneshot(request_as(Some(Subject::default())))
        .await
        .unwrap();

    assert_eq!(
        body_string(response).await,
        "authorized=true user=false admin=false"
    );
}

#[tokio::test]
async fn no_subject_leaves_the_request_unauthorized() {
    let gate = AccessGate::new(config());

    // The step still continues the pipeline; only the evaluator state differs.
    let response = app(&gate).oneshot(request_as(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "authorized=false user=false admin=false"
    );
}

#[tokio::test]
async fn multi_role_subject_grants_every_role() {
    let gate = AccessGate::new(config());

    let response = app(&gate)
        .oneshot(request_as(Some(Subject::with_roles(["admin", "user"]))))
        .await
        .unwrap();

    assert_eq!(
        body_string(response).await,
        "authorized=true user=true admin=true"
    );
}

// --- Subject Resolution ---

#[tokio::test]
async fn registered_resolver_overrides_the_session_extension() {
    let gate = AccessGate::builder(config())
        .subject_resolver(FixedSubjectResolver::new(Subject::with_role("admin")))
        .build();

    // The session layer says "user", the resolver says "admin"; the resolver
    // wins outright.
    let response = app(&gate)
        .oneshot(request_as(Some(Subject::with_role("user"))))
        .await
        .unwrap();

    assert_eq!(
        body_string(response).await,
        "authorized=true user=false admin=true"
    );
}

#[tokio::test]
async fn resolver_reporting_no_subject_leaves_unauthorized() {
    let gate = AccessGate::builder(config())
        .subject_resolver(FixedSubjectResolver::anonymous())
        .build();

    let response = app(&gate)
        .oneshot(request_as(Some(Subject::with_role("user"))))
        .await
        .unwrap();

    assert_eq!(
        body_string(response).await,
        "authorized=false user=false admin=false"
    );
}

// --- Response Mirroring ---

#[tokio::test]
async fn evaluator_is_mirrored_into_response_extensions() {
    let gate = AccessGate::new(config());

    let response = app(&gate)
        .oneshot(request_as(Some(Subject::with_role("user"))))
        .await
        .unwrap();

    let mirrored = response
        .extensions()
        .get::<RoleEvaluator>()
        .expect("evaluator mirrored for downstream rendering");
    assert!(mirrored.is_authorized());
    assert!(mirrored.is("user"));
}

// --- Extractor ---

#[tokio::test]
async fn extractor_returns_the_attached_evaluator() {
    let mut evaluator = RoleEvaluator::new(Arc::new(config()));
    evaluator.add_role("admin");

    let (mut parts, _) = Request::builder()
        .uri("/")
        .body(Body::empty())
        .unwrap()
        .into_parts();
    parts.extensions.insert(evaluator);

    let extracted = RoleEvaluator::from_request_parts(&mut parts, &())
        .await
        .expect("evaluator attached");
    assert!(extracted.is("admin"));
}

#[tokio::test]
async fn extractor_rejects_when_initialization_layer_is_missing() {
    let (mut parts, _) = Request::builder()
        .uri("/")
        .body(Body::empty())
        .unwrap()
        .into_parts();

    let result = RoleEvaluator::from_request_parts(&mut parts, &()).await;
    assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
}
