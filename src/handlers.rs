use crate::buckets::{Observer, WeekConvention, observer_offset};
use crate::errors::{AppError, FetchError};
use crate::models::{HealthResponse, LoginForm, PageQuery, StatsBucketsResponse};
use crate::state::{AppState, Views};
use crate::ui::{self, NavItem};
use crate::views::{PageView, PlayHistory, StatsPage, settle_within};
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::FixedOffset;
use tracing::info;

const MAX_PAGE_SIZE: u32 = 500;

pub async fn plays_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    if !state.auth().is_authenticated() {
        return Ok(Redirect::to("/login").into_response());
    }
    let observer = observer(&state, &query)?;
    let limit = query
        .limit
        .unwrap_or(state.config.page_size)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    {
        let mut views = state.views.lock().await;
        match views.plays.as_mut() {
            Some(view) if !query.poll => view.navigate_to((limit, offset)),
            Some(_) => {}
            None => views.plays = Some(PlayHistory::open(state.api.clone(), limit, offset)),
        }
    }

    let rendered = settle_and_render(&state, Views::plays_mut, |view| {
        (view.render_html(&observer), view.task().resource().is_pending())
    })
    .await;

    let refresh = format!("/?limit={limit}&offset={offset}&poll=true{}", observer_params(&query));
    Ok(page_response(rendered, "Plays", NavItem::Plays, &refresh))
}

pub async fn stats_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    if !state.auth().is_authenticated() {
        return Ok(Redirect::to("/login").into_response());
    }
    let observer = observer(&state, &query)?;
    mount_stats(&state, query.poll).await;

    let rendered = settle_and_render(&state, Views::stats_mut, |view| {
        (view.render_html(&observer), view.task().resource().is_pending())
    })
    .await;

    let refresh = format!("/stats?poll=true{}", observer_params(&query));
    Ok(page_response(rendered, "Stats", NavItem::Stats, &refresh))
}

pub async fn stats_buckets(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<StatsBucketsResponse>, AppError> {
    if !state.auth().is_authenticated() {
        return Err(FetchError::NotAuthenticated.into());
    }
    let observer = observer(&state, &query)?;
    mount_stats(&state, query.poll).await;

    settle_and_render(&state, Views::stats_mut, |view| view.buckets(&observer))
        .await
        .map(Json)
        .ok_or_else(|| FetchError::NotAuthenticated.into())
}

pub async fn login_form(State(state): State<AppState>) -> Response {
    if state.auth().is_authenticated() {
        return Redirect::to("/").into_response();
    }
    Html(ui::render_login(None)).into_response()
}

pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if form.api_key.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Html(ui::render_login(Some("API key required"))),
        )
            .into_response();
    }

    state.auth().set_api_key(form.api_key);
    state.views.lock().await.unmount_all();
    info!("logged in");
    Redirect::to("/").into_response()
}

pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.auth().clear_api_key();
    state.views.lock().await.unmount_all();
    info!("logged out");
    Redirect::to("/login")
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        authenticated: state.auth().is_authenticated(),
    })
}

async fn mount_stats(state: &AppState, poll: bool) {
    let mut views = state.views.lock().await;
    match views.stats.as_mut() {
        Some(view) if !poll => view.navigate(),
        Some(_) => {}
        None => views.stats = Some(StatsPage::open(state.api.clone())),
    }
}

/// Waits (bounded by `render_wait`) for the selected page's fetch to settle,
/// then renders it. `None` if the page was unmounted meanwhile.
async fn settle_and_render<A, T, R>(
    state: &AppState,
    select: fn(&mut Views) -> Option<&mut PageView<A, T>>,
    render: impl FnOnce(&PageView<A, T>) -> R,
) -> Option<R>
where
    A: Clone + PartialEq + Send + 'static,
    T: Send + 'static,
{
    let (updates, resource) = {
        let mut views = state.views.lock().await;
        select(&mut *views)?.watch()
    };
    settle_within(updates, resource, state.config.render_wait).await;

    let mut views = state.views.lock().await;
    select(&mut *views).map(|view| render(view))
}

fn page_response(
    rendered: Option<(String, bool)>,
    title: &'static str,
    nav: NavItem,
    refresh_url: &str,
) -> Response {
    match rendered {
        Some((body, pending)) => {
            let body = format!("<h1>{title}</h1>{body}");
            let refresh = pending.then_some(refresh_url);
            Html(ui::render_page(title, Some(nav), refresh, &body)).into_response()
        }
        None => Redirect::to("/login").into_response(),
    }
}

fn observer(state: &AppState, query: &PageQuery) -> Result<Observer, AppError> {
    let offset = match query.tz {
        Some(minutes) => minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| AppError::bad_request(format!("invalid tz offset: {minutes}")))?,
        None => observer_offset(),
    };
    let week = match query.week.as_deref() {
        Some(value) => WeekConvention::parse(value)
            .ok_or_else(|| AppError::bad_request(format!("invalid week start: {value}")))?,
        None => state.config.week,
    };
    Ok(Observer { offset, week })
}

/// Carries the observer's clock settings into the polling refresh URL.
fn observer_params(query: &PageQuery) -> String {
    let mut params = String::new();
    if let Some(minutes) = query.tz {
        params.push_str(&format!("&tz={minutes}"));
    }
    if let Some(week) = query.week.as_deref().and_then(WeekConvention::parse) {
        let week = match week {
            WeekConvention::MondayZero => "monday",
            WeekConvention::SundayZero => "sunday",
        };
        params.push_str(&format!("&week={week}"));
    }
    params
}
