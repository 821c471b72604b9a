use axum::{
    Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct Health {
    authenticated: bool,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    label: String,
    sort_key: Option<u8>,
    play_count: u64,
}

#[derive(Debug, Deserialize)]
struct StatsBuckets {
    state: String,
    total_plays: Option<u64>,
    hours: Vec<Bucket>,
    days: Vec<Bucket>,
    months: Vec<Bucket>,
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));
static SERVER: Lazy<Mutex<Option<Arc<TestServer>>>> = Lazy::new(|| Mutex::new(None));

/// Stand-in for the listening-history service, on its own runtime so it
/// outlives any single test.
static UPSTREAM: Lazy<String> = Lazy::new(|| {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind upstream");
    listener.set_nonblocking(true).expect("nonblocking upstream");
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("upstream runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("upstream listener");
            axum::serve(listener, upstream_router())
                .await
                .expect("upstream server");
        });
    });
    format!("http://{addr}")
});

#[cfg(unix)]
mod cleanup {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Once;

    static REGISTER: Once = Once::new();
    static PID: AtomicI32 = AtomicI32::new(0);

    pub fn register(pid: u32) {
        REGISTER.call_once(|| {
            PID.store(pid as i32, Ordering::SeqCst);
            unsafe {
                libc::atexit(on_exit);
            }
        });
    }

    extern "C" fn on_exit() {
        let pid = PID.load(Ordering::SeqCst);
        if pid > 0 {
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
        }
    }
}

fn upstream_router() -> Router {
    Router::new()
        .route("/plays", get(upstream_plays))
        .route("/stats", get(upstream_stats))
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|value| value.to_str().ok())
}

async fn upstream_plays(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, u32>>,
) -> Response {
    let offset = params.get("offset").copied().unwrap_or(0);
    match api_key(&headers) {
        Some("full-key") if offset == 0 => Json(json!([
            play(1, "Everything in Its Right Place", "Radiohead", "Kid A", "like"),
            play(2, "Teardrop", "Massive Attack", "Mezzanine", "unrated"),
            play(3, "Glosoli", "Sigur Ros", "Takk", "TIRED"),
        ]))
        .into_response(),
        Some("full-key") | Some("empty-key") => Json(json!([])).into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn upstream_stats(headers: HeaderMap) -> Response {
    match api_key(&headers) {
        Some("full-key") => Json(full_stats()).into_response(),
        Some("empty-key") => Json(json!({
            "overall": {
                "total_plays": 0,
                "unique_tracks": 0,
                "unique_artists": 0,
                "total_time_seconds": 0,
                "first_play": null,
                "last_play": null
            },
            "top_tracks": [],
            "top_artists": [],
            "top_albums": [],
            "top_stations": [],
            "plays_by_hour": [],
            "plays_by_day": [],
            "plays_by_month": [],
            "rating_distribution": []
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

fn play(id: i64, title: &str, artist: &str, album: &str, rating: &str) -> Value {
    json!({
        "id": id,
        "track": {
            "id": id,
            "title": title,
            "artist": { "id": id, "name": artist, "mbid": null, "validated": null },
            "album": {
                "id": id,
                "title": album,
                "artist_id": id,
                "mbid": null,
                "cover_art_url": null,
                "validated": null
            },
            "mbid": null,
            "created_at": "2025-03-29T20:14:32",
            "updated_at": "2025-03-29T20:14:32",
            "validated": null
        },
        "station": {
            "id": 1,
            "name": "Radiohead Radio",
            "created_at": "2025-03-01T00:00:00",
            "updated_at": "2025-03-01T00:00:00"
        },
        "rating": rating,
        "played_at": "2025-03-29T20:14:32",
        "created_at": "2025-03-29T20:14:32"
    })
}

fn full_stats() -> Value {
    json!({
        "overall": {
            "total_plays": 42,
            "unique_tracks": 30,
            "unique_artists": 12,
            "total_time_seconds": 9000,
            "first_play": "2025-01-02T10:00:00",
            "last_play": "2025-03-29T20:14:32"
        },
        "top_tracks": [{ "id": 1, "name": "Teardrop", "play_count": 5 }],
        "top_artists": [{ "id": 1, "name": "Massive Attack", "play_count": 9 }],
        "top_albums": [{ "id": 1, "name": "Mezzanine", "play_count": 7 }],
        "top_stations": [{ "id": 1, "name": "Radiohead Radio", "play_count": 42 }],
        "plays_by_hour": [
            { "hour": 13, "play_count": 10 },
            { "hour": 0, "play_count": 20 },
            { "hour": 23, "play_count": 12 }
        ],
        "plays_by_day": [
            { "day": 6, "play_count": 2 },
            { "day": 0, "play_count": 40 }
        ],
        "plays_by_month": [
            { "month": 12, "play_count": 1 },
            { "month": 1, "play_count": 30 },
            { "month": 6, "play_count": 11 }
        ],
        "rating_distribution": [{ "rating": "like", "play_count": 20 }]
    })
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/api/health")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn spawn_server() -> TestServer {
    let port = pick_free_port();
    let child = Command::new(env!("CARGO_BIN_EXE_listening_dashboard"))
        .env("PORT", port.to_string())
        .env("DASHBOARD_API_URL", UPSTREAM.as_str())
        .env_remove("DASHBOARD_API_KEY")
        .env("DASHBOARD_RENDER_WAIT_MS", "3000")
        .env("RUST_LOG", "info")
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .expect("failed to spawn server");

    #[cfg(unix)]
    cleanup::register(child.id());

    let base_url = format!("http://127.0.0.1:{port}");
    wait_until_ready(&base_url).await;

    TestServer { base_url, child }
}

async fn shared_server() -> Arc<TestServer> {
    let mut guard = SERVER.lock().await;
    if let Some(server) = guard.as_ref() {
        return Arc::clone(server);
    }
    let server = Arc::new(spawn_server().await);
    *guard = Some(Arc::clone(&server));
    server
}

/// Logs in without following the redirect, so no page fetch runs yet.
async fn login(server: &TestServer, api_key: &str) {
    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .post(format!("{}/login", server.base_url))
        .form(&[("api_key", api_key)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/");
}

async fn get_text(client: &Client, url: String) -> (String, String) {
    let response = client.get(url).send().await.unwrap();
    let path = response.url().path().to_string();
    (path, response.text().await.unwrap())
}

#[tokio::test]
async fn http_stats_buckets_are_sorted_for_the_viewer() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let stats: StatsBuckets = client
        .get(format!("{}/api/stats?tz=0", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats.state, "complete");
    assert_eq!(stats.total_plays, Some(42));

    let months: Vec<_> = stats.months.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(months, vec!["Jan", "Jun", "Dec"]);

    let hours: Vec<_> = stats.hours.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(hours, vec!["12:00 AM", "1:00 PM", "11:00 PM"]);
    assert_eq!(stats.hours[0].play_count, 20);

    let days: Vec<_> = stats.days.iter().map(|b| (b.label.as_str(), b.sort_key)).collect();
    assert_eq!(days, vec![("Sun", Some(0)), ("Mon", Some(1))]);
}

#[tokio::test]
async fn http_stats_buckets_follow_tz_and_week_start() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let stats: StatsBuckets = client
        .get(format!("{}/api/stats?tz=60&week=monday", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let hours: Vec<_> = stats.hours.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(hours, vec!["12:00 AM", "1:00 AM", "2:00 PM"]);

    let days: Vec<_> = stats.days.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(days, vec!["Mon", "Sun"]);
}

#[tokio::test]
async fn http_stats_page_renders_grid() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let (path, body) = get_text(&client, format!("{}/stats?tz=0", server.base_url)).await;

    assert_eq!(path, "/stats");
    assert!(body.contains("Overall Stats"));
    assert!(body.contains("Radiohead Radio"));
    assert!(body.contains("Plays by Hour"));
    assert!(!body.contains("Loading stats..."));
}

#[tokio::test]
async fn http_empty_stats_show_empty_state() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "empty-key").await;

    let (_, body) = get_text(&client, format!("{}/stats?tz=0", server.base_url)).await;

    assert!(body.contains("No listening data yet"));
    assert!(!body.contains("Overall Stats"));
}

#[tokio::test]
async fn http_plays_page_lists_history() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let (path, body) = get_text(&client, format!("{}/?tz=0", server.base_url)).await;
    assert_eq!(path, "/");
    assert!(body.contains("Everything in Its Right Place"));
    assert!(body.contains("by Massive Attack"));
    assert!(body.contains(r#"title="Tired""#));

    let (_, body) = get_text(&client, format!("{}/?tz=0&limit=2&offset=2", server.base_url)).await;
    assert!(!body.contains("Teardrop"));
    assert!(body.contains("offset=0"));
}

#[tokio::test]
async fn http_rejected_key_expires_session() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "expired-key").await;

    let (_, body) = get_text(&client, format!("{}/stats?tz=0", server.base_url)).await;
    assert!(body.contains("Failed to load stats: Session expired"));

    let health: Health = client
        .get(format!("{}/api/health", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!health.authenticated);

    let (path, _) = get_text(&client, format!("{}/stats", server.base_url)).await;
    assert_eq!(path, "/login");
}

#[tokio::test]
async fn http_logout_requires_login_again() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let response = client
        .post(format!("{}/logout", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.url().path(), "/login");
    assert!(response.text().await.unwrap().contains("API key"));

    let response = client
        .get(format!("{}/api/stats", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_blank_api_key_is_rejected() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{}/login", server.base_url))
        .form(&[("api_key", "   ")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().contains("API key required"));
}

#[tokio::test]
async fn http_invalid_tz_is_bad_request() {
    let _guard = TEST_LOCK.lock().await;
    let server = shared_server().await;
    let client = Client::new();
    login(&server, "full-key").await;

    let response = client
        .get(format!("{}/api/stats?tz=100000", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
