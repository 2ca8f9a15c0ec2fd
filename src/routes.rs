use std::cell::RefCell;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::host::{handle_button_click, NavAction, Navigator, Preferences};
use crate::toolbar::ToolbarState;

pub struct AppState {
    pub toolbar: Arc<ToolbarState>,
    pub prefs: Arc<Preferences>,
    pub mail_url: String,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub badge: String,
    pub badge_color: String,
    pub last_checked: String,
    pub panel_visible: bool,
    pub panel_color: String,
    pub mail_url: String,
}

#[derive(Template)]
#[template(path = "signin_panel.html")]
pub struct SignInPanelTemplate {
    pub panel_color: String,
    pub mail_url: String,
}

#[derive(Template)]
#[template(path = "open_tab.html")]
pub struct OpenTabTemplate {
    pub mail_url: String,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

/// Navigator for a single HTTP activation; the caller's page is the active context.
struct WebNavigator {
    active: Option<String>,
    target: RefCell<Option<String>>,
}

impl WebNavigator {
    fn new(active: Option<String>) -> Self {
        Self {
            active,
            target: RefCell::new(None),
        }
    }

    fn target(&self) -> String {
        self.target.borrow().clone().unwrap_or_default()
    }
}

impl Navigator for WebNavigator {
    fn active_url(&self) -> Option<String> {
        self.active.clone()
    }

    fn redirect_active(&self, url: &str) {
        *self.target.borrow_mut() = Some(url.to_string());
    }

    fn open(&self, url: &str) {
        *self.target.borrow_mut() = Some(url.to_string());
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/panel", get(panel))
        .route("/panel/dismiss", post(dismiss_panel))
        .route("/open", get(open))
        .route("/color", post(set_color))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.toolbar.snapshot();

    HtmlTemplate(IndexTemplate {
        badge: view.badge.map(|n| n.to_string()).unwrap_or_default(),
        badge_color: view.badge_color,
        last_checked: view
            .badge_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string()),
        panel_visible: view.panel_visible,
        panel_color: view.panel_color,
        mail_url: state.mail_url.clone(),
    })
}

pub async fn panel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(SignInPanelTemplate {
        panel_color: state.toolbar.snapshot().panel_color,
        mail_url: state.mail_url.clone(),
    })
}

pub async fn dismiss_panel(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.toolbar.dismiss_panel();
    Redirect::to("/")
}

#[derive(Deserialize)]
pub struct OpenQuery {
    pub from: Option<String>,
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OpenQuery>,
) -> Response {
    let nav = WebNavigator::new(query.from);

    match handle_button_click(&nav, &state.mail_url) {
        NavAction::RedirectActive => Redirect::to(&nav.target()).into_response(),
        NavAction::OpenNew => HtmlTemplate(OpenTabTemplate {
            mail_url: nav.target(),
        })
        .into_response(),
    }
}

#[derive(Deserialize)]
pub struct ColorForm {
    pub color: String,
}

pub async fn set_color(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ColorForm>,
) -> Response {
    match state.prefs.set_color(&form.color) {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => {
            warn!("Rejected color preference: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Badge, SignInPanel};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn create_test_app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState {
            toolbar: Arc::new(ToolbarState::new("#186DEE")),
            prefs: Arc::new(Preferences::new("#186DEE")),
            mail_url: "https://mail.google.com".to_string(),
        });

        (router(state.clone()), state)
    }

    async fn body_string(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn test_health_endpoint() {
            let (app, _state) = create_test_app();

            let response = app.oneshot(get_request("/health")).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, "OK");
        }
    }

    mod index_tests {
        use super::*;

        #[tokio::test]
        async fn test_index_without_count() {
            let (app, _state) = create_test_app();

            let response = app.oneshot(get_request("/")).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = body_string(response).await;
            assert!(body.contains("never"));
            assert!(!body.contains("signin-panel"));
        }

        #[tokio::test]
        async fn test_index_shows_badge() {
            let (app, state) = create_test_app();
            state.toolbar.set_badge(Some(42));

            let response = app.oneshot(get_request("/")).await.unwrap();

            let body = body_string(response).await;
            assert!(body.contains(">42<"));
            assert!(!body.contains("never"));
        }

        #[tokio::test]
        async fn test_index_shows_panel_after_sign_out() {
            let (app, state) = create_test_app();
            state.toolbar.show();

            let response = app.oneshot(get_request("/")).await.unwrap();

            let body = body_string(response).await;
            assert!(body.contains("signin-panel"));
        }
    }

    mod panel_tests {
        use super::*;

        #[tokio::test]
        async fn test_panel_uses_emitted_color() {
            let (app, state) = create_test_app();
            state.toolbar.emit("color", "#ABCDEF");

            let response = app.oneshot(get_request("/panel")).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = body_string(response).await;
            assert!(body.contains("#ABCDEF"));
            assert!(body.contains("https://mail.google.com"));
        }

        #[tokio::test]
        async fn test_dismiss_panel() {
            let (app, state) = create_test_app();
            state.toolbar.show();

            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/panel/dismiss")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert!(!state.toolbar.snapshot().panel_visible);
        }
    }

    mod open_tests {
        use super::*;

        #[tokio::test]
        async fn test_open_from_blank_redirects() {
            let (app, _state) = create_test_app();

            let response = app
                .oneshot(get_request("/open?from=about%3Ablank"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(
                response.headers().get(header::LOCATION).unwrap(),
                "https://mail.google.com"
            );
        }

        #[tokio::test]
        async fn test_open_without_context_redirects() {
            let (app, _state) = create_test_app();

            let response = app.oneshot(get_request("/open")).await.unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER);
        }

        #[tokio::test]
        async fn test_open_from_page_opens_new_tab() {
            let (app, _state) = create_test_app();

            let response = app
                .oneshot(get_request("/open?from=https%3A%2F%2Fwww.rust-lang.org"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = body_string(response).await;
            assert!(body.contains("target=\"_blank\""));
            assert!(body.contains("https://mail.google.com"));
        }
    }

    mod color_tests {
        use super::*;

        fn color_request(color: &str) -> Request<Body> {
            let form = serde_urlencoded::to_string([("color", color)]).unwrap();
            Request::builder()
                .method("POST")
                .uri("/color")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap()
        }

        #[tokio::test]
        async fn test_set_valid_color() {
            let (app, state) = create_test_app();

            let response = app.oneshot(color_request("#FF8800")).await.unwrap();

            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(state.prefs.color(), "#FF8800");
        }

        #[tokio::test]
        async fn test_reject_invalid_color() {
            let (app, state) = create_test_app();

            let response = app.oneshot(color_request("orange")).await.unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(state.prefs.color(), "#186DEE");
        }
    }
}
