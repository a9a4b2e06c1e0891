use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{info, instrument, warn};

use super::{
    dto::{
        AuthResponse, CallbackQuery, LoginRequest, PublicUser, RegisterRequest, StatusResponse,
        SuccessResponse,
    },
    extractors::CurrentSession,
    services::{authenticate_local, enroll_external, register_local},
    session::new_token,
};
use crate::{error::AppError, state::AppState};

const EXTERNAL_SUCCESS_REDIRECT: &str = "/editor";
const EXTERNAL_FAILURE_REDIRECT: &str = "/?error=discord_auth_failed";
const EXTERNAL_SUSPENDED_REDIRECT: &str = "/?error=account_suspended";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/status", get(status))
        .route("/auth/discord", get(discord_start))
        .route("/auth/discord/callback", get(discord_callback))
}

#[instrument(skip(state, current, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
    Json(payload): Json<RegisterRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let user = register_local(&state, &payload.username, &payload.email, &payload.password).await?;
    let token = state.sessions.rotate(current.token.as_deref(), |s| {
        s.user_id = Some(user.id.clone());
    });
    Ok((
        state.sessions.set_cookie(jar, token),
        Json(AuthResponse {
            success: true,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, current, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let user = authenticate_local(&state, &payload.email, &payload.password).await?;
    let token = state.sessions.rotate(current.token.as_deref(), |s| {
        s.user_id = Some(user.id.clone());
    });
    Ok((
        state.sessions.set_cookie(jar, token),
        Json(AuthResponse {
            success: true,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    if let Some(token) = current.token.as_deref() {
        state.sessions.destroy(token);
    }
    (
        state.sessions.clear_cookie(jar),
        Json(SuccessResponse { success: true }),
    )
}

#[instrument(skip_all)]
pub async fn status(State(state): State<AppState>, current: CurrentSession) -> Json<StatusResponse> {
    let user = current.user(&state).filter(|u| !u.suspended);
    Json(StatusResponse {
        authenticated: user.is_some(),
        user: user.as_ref().map(PublicUser::from),
    })
}

#[instrument(skip_all)]
pub async fn discord_start(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let provider = state
        .identity
        .clone()
        .ok_or(AppError::NotFound("identity provider"))?;
    let oauth_state = new_token();
    let url = provider.authorize_url(&oauth_state)?;
    let token = state.sessions.update(current.token.as_deref(), |s| {
        s.oauth_state = Some(oauth_state);
    });
    Ok((state.sessions.set_cookie(jar, token), Redirect::to(&url)))
}

#[instrument(skip_all)]
pub async fn discord_callback(
    State(state): State<AppState>,
    current: CurrentSession,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    let provider = state
        .identity
        .clone()
        .ok_or(AppError::NotFound("identity provider"))?;

    let expected = current.session.as_ref().and_then(|s| s.oauth_state.as_deref());
    let (Some(code), Some(returned)) = (query.code.as_deref(), query.state.as_deref()) else {
        warn!("discord callback without code or state");
        return Ok((jar, Redirect::to(EXTERNAL_FAILURE_REDIRECT)));
    };
    if expected != Some(returned) {
        warn!("discord callback state mismatch");
        return Ok((jar, Redirect::to(EXTERNAL_FAILURE_REDIRECT)));
    }

    let profile = match provider.exchange(code).await {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "discord code exchange failed");
            return Ok((jar, Redirect::to(EXTERNAL_FAILURE_REDIRECT)));
        }
    };

    let user = enroll_external(&state, profile).await;
    if user.suspended {
        warn!(user_id = %user.id, "suspended account tried external login");
        state.sessions.update(current.token.as_deref(), |s| s.oauth_state = None);
        return Ok((jar, Redirect::to(EXTERNAL_SUSPENDED_REDIRECT)));
    }

    let token = state.sessions.rotate(current.token.as_deref(), |s| {
        s.user_id = Some(user.id.clone());
        s.oauth_state = None;
    });
    info!(user_id = %user.id, username = %user.username, "discord login");
    Ok((
        state.sessions.set_cookie(jar, token),
        Redirect::to(EXTERNAL_SUCCESS_REDIRECT),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::session::SESSION_COOKIE};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    fn session_cookie(resp: &Response) -> Option<String> {
        resp.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(SESSION_COOKIE))
            .map(|v| v.split(';').next().unwrap_or_default().to_string())
    }

    async fn json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut req = Request::get(uri);
        if let Some(c) = cookie {
            req = req.header(header::COOKIE, c);
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn register_login_scenario() {
        let app = build_app(AppState::fake());

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/auth/register",
                serde_json::json!({"username": "ana", "email": "ana@example.com", "password": "secret1"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(session_cookie(&resp).is_some());

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"email": "ana@example.com", "password": "wrong"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(resp).await["kind"], "BAD_CREDENTIAL");

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"email": "ana@example.com", "password": "secret1"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = session_cookie(&resp).unwrap();
        let body = json(resp).await;
        assert!(body["user"]["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(body["user"].get("password").is_none());
        assert!(body["user"].get("passwordHash").is_none());
        assert!(body["user"].get("credential").is_none());

        let resp = app.oneshot(get("/api/auth/status", Some(&cookie))).await.unwrap();
        let body = json(resp).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["username"], "ana");
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = build_app(AppState::fake());
        let body = serde_json::json!({"username": "ana", "email": "ana@example.com", "password": "secret1"});
        app.clone()
            .oneshot(post_json("/api/auth/register", body.clone(), None))
            .await
            .unwrap();
        let resp = app
            .oneshot(post_json("/api/auth/register", body, None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(json(resp).await["kind"], "DUPLICATE_EMAIL");
    }

    #[tokio::test]
    async fn logout_destroys_session() {
        let app = build_app(AppState::fake());
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/auth/register",
                serde_json::json!({"username": "ana", "email": "ana@example.com", "password": "secret1"}),
                None,
            ))
            .await
            .unwrap();
        let cookie = session_cookie(&resp).unwrap();

        let resp = app
            .clone()
            .oneshot(post_json("/api/auth/logout", serde_json::json!({}), Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get("/api/auth/status", Some(&cookie))).await.unwrap();
        assert_eq!(json(resp).await["authenticated"], false);
    }

    #[tokio::test]
    async fn discord_round_trip_binds_session() {
        let app = build_app(AppState::fake());

        let resp = app.clone().oneshot(get("/api/auth/discord", None)).await.unwrap();
        assert!(resp.status().is_redirection());
        let cookie = session_cookie(&resp).unwrap();
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        let oauth_state = location.split("state=").nth(1).unwrap().to_string();

        let resp = app
            .clone()
            .oneshot(get(
                &format!("/api/auth/discord/callback?code=d-42&state={oauth_state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(resp.headers()[header::LOCATION], EXTERNAL_SUCCESS_REDIRECT);
        let bound = session_cookie(&resp).unwrap();

        let resp = app.oneshot(get("/api/auth/status", Some(&bound))).await.unwrap();
        let body = json(resp).await;
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["user"]["username"], "user-d-42");
    }

    #[tokio::test]
    async fn discord_callback_rejects_state_mismatch() {
        let app = build_app(AppState::fake());
        let resp = app.clone().oneshot(get("/api/auth/discord", None)).await.unwrap();
        let cookie = session_cookie(&resp).unwrap();

        let resp = app
            .oneshot(get("/api/auth/discord/callback?code=d-1&state=forged", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(resp.headers()[header::LOCATION], EXTERNAL_FAILURE_REDIRECT);
    }

    #[tokio::test]
    async fn suspended_external_account_gets_no_session() {
        let state = AppState::fake();
        let app = build_app(state.clone());

        let resp = app.clone().oneshot(get("/api/auth/discord", None)).await.unwrap();
        let cookie = session_cookie(&resp).unwrap();
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        let oauth_state = location.split("state=").nth(1).unwrap().to_string();

        let user = enroll_external(
            &state,
            crate::auth::discord::ExternalProfile {
                external_id: "d-5".into(),
                username: "eve".into(),
                email: None,
                avatar: None,
            },
        )
        .await;
        state.store.write().users.get_mut(&user.id).unwrap().suspended = true;

        let resp = app
            .clone()
            .oneshot(get(
                &format!("/api/auth/discord/callback?code=d-5&state={oauth_state}"),
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(resp.headers()[header::LOCATION], EXTERNAL_SUSPENDED_REDIRECT);

        let resp = app.oneshot(get("/api/auth/status", Some(&cookie))).await.unwrap();
        assert_eq!(json(resp).await["authenticated"], false);
    }
}
