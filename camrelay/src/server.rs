// HTTP surface: password login and the live stream endpoint.

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info, warn};

use camrelay_core::auth::PasswordGate;
use camrelay_stream::{StreamMultiplexer, ViewerGuard};

#[derive(Clone)]
pub struct AppState {
    pub mux: Arc<StreamMultiplexer>,
    pub gate: Arc<PasswordGate>,
    /// Bytes pulled from the multiplexer per body chunk.
    pub read_chunk: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(login_page).post(login_submit))
        .route("/liveStream", get(live_stream))
        .with_state(state)
}

const LOGIN_PAGE: &str = r#"<!doctype html>
<html>
<head><title>CamRelay</title></head>
<body>
<form method="post" action="/login">
  <label for="password">Password</label>
  <input type="password" id="password" name="password" autofocus>
  <button type="submit">View stream</button>
</form>
</body>
</html>
"#;

async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if !state.gate.is_configured() {
        return (StatusCode::SERVICE_UNAVAILABLE, "login is not configured").into_response();
    }
    match state.gate.verify(&form.password).await {
        Ok(true) => {
            info!("viewer authorized");
            (StatusCode::OK, "authorized").into_response()
        }
        Ok(false) => {
            warn!("login attempt with wrong password");
            (StatusCode::UNAUTHORIZED, "wrong password").into_response()
        }
        Err(e) => {
            error!("password verification failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

struct BodyChunker {
    mux: Arc<StreamMultiplexer>,
    _guard: ViewerGuard,
    chunk: usize,
    failed: bool,
}

async fn live_stream(State(state): State<AppState>) -> Response {
    if !state.mux.has_video() {
        return (StatusCode::SERVICE_UNAVAILABLE, "no streams available").into_response();
    }

    // The guard keeps the multiplexer in-use until the viewer disconnects
    // and the body stream is dropped.
    let chunker = BodyChunker {
        mux: Arc::clone(&state.mux),
        _guard: state.mux.begin_viewing(),
        chunk: state.read_chunk,
        failed: false,
    };
    let body = Body::from_stream(futures::stream::unfold(chunker, |mut c| async move {
        if c.failed {
            return None;
        }
        let mut buf = vec![0u8; c.chunk];
        match c.mux.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok::<_, io::Error>(Bytes::from(buf)), c))
            }
            Err(e) => {
                warn!("live stream ended with error: {e}");
                c.failed = true;
                Some((Err(io::Error::other(e)), c))
            }
        }
    }));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response()
}
