use axum::{
    extract::State,
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    Json,
};

use crate::{
    error::AppError,
    models::user::{LoginRequest, RefreshRequest, RegisterRequest, SessionPayload, SessionResponse},
    state::AppState,
    utils::cookies::{
        build_auth_cookie, extract_cookie_value, max_age_days, ACCESS_COOKIE_NAME,
        ACCESS_COOKIE_PATH, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH,
    },
    validation::Validate,
};

type SessionReply = (HeaderMap, Json<SessionResponse>);

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<SessionReply, AppError> {
    payload.validate()?;
    let session = state.sessions.register(&payload).await?;
    session_reply(&state, &session)
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<SessionReply, AppError> {
    payload.validate()?;
    let session = state.sessions.authenticate(&payload).await?;
    session_reply(&state, &session)
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshRequest>,
) -> Result<SessionReply, AppError> {
    payload.validate()?;

    let refresh_token = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|cookies| extract_cookie_value(cookies, REFRESH_COOKIE_NAME))
        .filter(|token| !token.is_empty())
        .or_else(|| payload.refresh_token.clone().filter(|t| !t.is_empty()))
        .ok_or_else(|| AppError::BadRequest("Refresh token is required".to_string()))?;

    let session = state
        .sessions
        .refresh_session(&payload.username, &refresh_token)
        .await?;
    session_reply(&state, &session)
}

fn session_reply(state: &AppState, session: &SessionPayload) -> Result<SessionReply, AppError> {
    let options = state.cookie_options();
    let jwt = &state.config.jwt;

    let access_cookie = build_auth_cookie(
        ACCESS_COOKIE_NAME,
        &session.access_token,
        max_age_days(jwt.access_token_days),
        ACCESS_COOKIE_PATH,
        options,
    );
    let refresh_cookie = build_auth_cookie(
        REFRESH_COOKIE_NAME,
        &session.refresh_token,
        max_age_days(jwt.refresh_token_days),
        REFRESH_COOKIE_PATH,
        options,
    );

    let mut headers = HeaderMap::new();
    for cookie in [access_cookie, refresh_cookie] {
        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::InternalServerError(anyhow::anyhow!(e)))?;
        headers.append(SET_COOKIE, value);
    }

    Ok((headers, Json(SessionResponse::from(session))))
}
