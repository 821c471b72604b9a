use askama::Template;
use tracing::error;

use crate::buckets::{BucketKind, LocalizedBucket, Observer, sort_buckets};
use crate::errors::FetchError;
use crate::format::{format_date, format_duration};
use crate::models::{OverallStats, Play, Rating, RatingStat, Stats, TopItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavItem {
    Plays,
    Stats,
}

#[derive(Template)]
#[template(source = r#"<meta http-equiv="refresh" content="1;url={{ url }}" />"#, ext = "html")]
struct RefreshTag<'a> {
    url: &'a str,
}

#[derive(Template)]
#[template(source = r#"<div class="error">{{ message }}</div>"#, ext = "html")]
struct ErrorBanner<'a> {
    message: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<div class="error">{{ prefix }}{{ message }}
      {%- if relogin %} <a href="/login">Log in again</a>{% endif %}</div>"#,
    ext = "html"
)]
struct FetchErrorBanner<'a> {
    prefix: &'a str,
    message: String,
    relogin: bool,
}

#[derive(Template)]
#[template(
    source = r#"<div class="empty-state">
      <h2>{{ title }}</h2>
      <p>{{ message }}</p>
    </div>"#,
    ext = "html"
)]
struct EmptyState<'a> {
    title: &'a str,
    message: &'a str,
}

struct StatRow<'a> {
    label: &'a str,
    value: String,
}

#[derive(Template)]
#[template(
    source = r#"<div class="card">
      {%- if counted %}<div class="card-heading"><h2>{{ title }}</h2><div>Plays</div></div>
      {%- else %}<h2>{{ title }}</h2>{% endif %}
      {%- for row in rows %}
      <div class="stat">
        <span class="stat-label">{{ row.label }}</span>
        <span class="stat-value">{{ row.value }}</span>
      </div>
      {%- endfor %}
    </div>"#,
    ext = "html"
)]
struct Card<'a> {
    title: &'a str,
    counted: bool,
    rows: Vec<StatRow<'a>>,
}

struct PlayRow<'a> {
    title: &'a str,
    artist: &'a str,
    album: &'a str,
    station: &'a str,
    played: String,
    badge: &'static str,
}

#[derive(Template)]
#[template(
    source = r#"<div class="play-list">
      {%- for play in plays %}
      <div class="play-item">
        <div class="play-content">
          <div class="primary-info">
            <span class="track-title">{{ play.title }}</span>
            <span class="artist">by {{ play.artist }}</span>
          </div>
          <div class="secondary-info">
            <span>{{ play.album }}</span><span>&bull;</span>
            <span class="station">{{ play.station }}</span><span>&bull;</span>
            <span>{{ play.played }}</span>
          </div>
        </div>
        {{ play.badge|safe }}
      </div>
      {%- endfor %}
    </div>
    <div class="pager">
      {%- if let Some(previous) = newer %}
      <a href="/?limit={{ limit }}&amp;offset={{ previous }}">Newer</a>
      {%- endif %}
      {%- if let Some(next) = older %}
      <a href="/?limit={{ limit }}&amp;offset={{ next }}">Older</a>
      {%- endif %}
    </div>"#,
    ext = "html"
)]
struct PlayList<'a> {
    plays: Vec<PlayRow<'a>>,
    limit: u32,
    newer: Option<u32>,
    older: Option<u32>,
}

fn render(template: &impl Template) -> String {
    template.render().unwrap_or_else(|err| {
        error!("template render failed: {err}");
        String::new()
    })
}

/// `body` is already rendered markup.
pub fn render_page(
    title: &'static str,
    active: Option<NavItem>,
    refresh_url: Option<&str>,
    body: &str,
) -> String {
    let refresh = refresh_url
        .map(|url| render(&RefreshTag { url }))
        .unwrap_or_default();
    let nav = active.map(render_nav).unwrap_or_default();

    LAYOUT_HTML
        .replace("{{TITLE}}", title)
        .replace("{{REFRESH}}", &refresh)
        .replace("{{NAV}}", &nav)
        .replace("{{BODY}}", body)
}

fn render_nav(active: NavItem) -> String {
    let link = |item: NavItem, href: &str, label: &str| {
        let class = if item == active { r#" class="active""# } else { "" };
        format!(r#"<a href="{href}"{class}>{label}</a>"#)
    };
    format!(
        r#"<nav>
      <div class="brand">track.haus</div>
      {}
      {}
      <form method="post" action="/logout"><button type="submit">Log out</button></form>
    </nav>"#,
        link(NavItem::Plays, "/", "Plays"),
        link(NavItem::Stats, "/stats", "Stats"),
    )
}

pub fn render_login(error: Option<&str>) -> String {
    let error = error
        .map(|message| render(&ErrorBanner { message }))
        .unwrap_or_default();
    let body = format!(
        r#"<section class="login">
      <h1>Log in</h1>
      {error}
      <form method="post" action="/login">
        <label for="api_key">API key</label>
        <input id="api_key" name="api_key" type="password" autocomplete="off" required />
        <button type="submit">Continue</button>
      </form>
    </section>"#
    );
    render_page("Log in", None, None, &body)
}

pub fn render_loading_stats() -> String {
    r#"<div class="loading">Loading stats...</div>"#.to_string()
}

pub fn render_loading_plays() -> String {
    r#"<div class="loading">Loading plays...</div>"#.to_string()
}

pub fn render_empty_state(title: &str, message: &str) -> String {
    render(&EmptyState { title, message })
}

/// Error text is shown as reported; session errors also link to the login form.
pub fn render_fetch_error(prefix: &str, err: &FetchError) -> String {
    render(&FetchErrorBanner {
        prefix,
        message: err.to_string(),
        relogin: matches!(err, FetchError::NotAuthenticated | FetchError::SessionExpired),
    })
}

pub fn render_stats_grid(stats: &Stats, observer: &Observer) -> String {
    let cards = [
        render_overall(&stats.overall, observer),
        render_top_items("Top Stations", &stats.top_stations),
        render_top_items("Top Artists", &stats.top_artists),
        render_top_items("Top Albums", &stats.top_albums),
        render_top_items("Top Tracks", &stats.top_tracks),
        render_buckets(
            "Plays by Hour",
            &sort_buckets(&stats.plays_by_hour, BucketKind::Hour, observer),
        ),
        render_buckets(
            "Plays by Day",
            &sort_buckets(&stats.plays_by_day, BucketKind::Day, observer),
        ),
        render_buckets(
            "Plays by Month",
            &sort_buckets(&stats.plays_by_month, BucketKind::Month, observer),
        ),
        render_ratings(&stats.rating_distribution),
    ];
    format!(r#"<div class="grid">{}</div>"#, cards.concat())
}

fn render_overall(overall: &OverallStats, observer: &Observer) -> String {
    let date = |raw: &Option<String>| {
        raw.as_deref()
            .map(|raw| format_date(raw, observer.offset))
            .unwrap_or_else(|| "--".to_string())
    };
    let rows = vec![
        row("Total Plays", overall.total_plays),
        row("Unique Tracks", overall.unique_tracks),
        row("Unique Artists", overall.unique_artists),
        row("Total Time", format_duration(overall.total_time_seconds)),
        row("First Play", date(&overall.first_play)),
        row("Last Play", date(&overall.last_play)),
    ];
    render(&Card {
        title: "Overall Stats",
        counted: false,
        rows,
    })
}

fn render_top_items(title: &str, items: &[TopItem]) -> String {
    let rows = items
        .iter()
        .map(|item| row(&item.name, item.play_count))
        .collect();
    counted_card(title, rows)
}

fn render_buckets(title: &str, buckets: &[LocalizedBucket]) -> String {
    let rows = buckets
        .iter()
        .map(|bucket| row(&bucket.label, bucket.play_count))
        .collect();
    counted_card(title, rows)
}

fn render_ratings(ratings: &[RatingStat]) -> String {
    let rows = ratings
        .iter()
        .map(|stat| row(&stat.rating, stat.play_count))
        .collect();
    counted_card("Ratings", rows)
}

fn counted_card(title: &str, rows: Vec<StatRow<'_>>) -> String {
    render(&Card {
        title,
        counted: true,
        rows,
    })
}

fn row(label: &str, value: impl ToString) -> StatRow<'_> {
    StatRow {
        label,
        value: value.to_string(),
    }
}

pub fn render_play_list(plays: &[Play], limit: u32, offset: u32, observer: &Observer) -> String {
    if plays.is_empty() && offset == 0 {
        return render_empty_state(
            "No plays yet",
            "Plays recorded by your player will show up here.",
        );
    }

    let rows = plays
        .iter()
        .map(|play| PlayRow {
            title: &play.track.title,
            artist: &play.track.artist.name,
            album: &play.track.album.title,
            station: &play.station.name,
            played: format_date(&play.played_at, observer.offset),
            badge: rating_badge(play.rating),
        })
        .collect();

    render(&PlayList {
        plays: rows,
        limit,
        newer: (offset > 0).then(|| offset.saturating_sub(limit)),
        older: (plays.len() as u32 >= limit).then(|| offset.saturating_add(limit)),
    })
}

fn rating_badge(rating: Rating) -> &'static str {
    match rating {
        Rating::Like => r#"<span class="rating like" title="Like">&#9829;</span>"#,
        Rating::Ban | Rating::Dislike => {
            r#"<span class="rating ban" title="Ban">&#8856;</span>"#
        }
        Rating::Tired => r#"<span class="rating tired" title="Tired">&#9790;</span>"#,
        Rating::Unrated | Rating::Unknown => "",
    }
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  {{REFRESH}}
  <title>{{TITLE}} · track.haus</title>
  <script>
    (function () {
      var url = new URL(window.location.href);
      if (url.pathname !== "/login" && !url.searchParams.has("tz")) {
        url.searchParams.set("tz", String(-new Date().getTimezoneOffset()));
        window.location.replace(url.toString());
      }
    })();
  </script>
  <style>
    :root {
      --midnight-plum: #2a1638;
      --synthwave-plum: #4b2660;
      --toxic-green: #9dff3a;
      --text: #f3e9ff;
      --text-muted: #b8a6c9;
      --error: #ff007f;
      --radius: 14px;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: linear-gradient(160deg, #150a1f, #221130 60%, #150a1f);
      color: var(--text);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      display: grid;
      grid-template-columns: 240px 1fr;
    }

    nav {
      display: flex;
      flex-direction: column;
      gap: 12px;
      padding: 32px 20px;
      border-right: 2px solid var(--synthwave-plum);
    }

    nav .brand {
      color: var(--toxic-green);
      font-weight: 600;
      font-size: 1.3rem;
      margin-bottom: 12px;
    }

    nav a {
      color: var(--text-muted);
      text-decoration: none;
    }

    nav a.active {
      color: var(--text);
      font-weight: 600;
    }

    main {
      padding: 32px;
      max-width: 960px;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(280px, 1fr));
      gap: 20px;
    }

    .card {
      background: var(--midnight-plum);
      border-radius: var(--radius);
      padding: 20px;
    }

    .card h2 {
      margin: 0 0 12px;
      color: var(--toxic-green);
      font-size: 1.2rem;
    }

    .card-heading {
      display: flex;
      justify-content: space-between;
      align-items: baseline;
    }

    .stat {
      display: flex;
      justify-content: space-between;
      padding: 6px 0;
      border-bottom: 2px solid var(--synthwave-plum);
    }

    .stat:last-child {
      border-bottom: none;
    }

    .stat-label {
      color: var(--text-muted);
    }

    .play-item {
      display: grid;
      grid-template-columns: 1fr auto;
      padding: 12px;
      border-bottom: 4px double rgba(255, 255, 255, 0.2);
    }

    .primary-info {
      display: flex;
      gap: 8px;
    }

    .track-title {
      font-weight: 600;
    }

    .secondary-info {
      display: flex;
      gap: 8px;
      font-size: 0.85rem;
      color: var(--text-muted);
    }

    .station {
      color: var(--toxic-green);
    }

    .pager {
      display: flex;
      gap: 16px;
      padding: 16px 0;
    }

    .pager a {
      color: var(--toxic-green);
    }

    .error {
      color: var(--error);
      padding: 12px;
      border: 1px solid var(--error);
      border-radius: 6px;
      text-align: center;
      background: rgba(255, 0, 127, 0.1);
    }

    .loading,
    .empty-state {
      text-align: center;
      color: var(--text-muted);
      padding: 40px;
    }

    .login {
      grid-column: 1 / -1;
      max-width: 360px;
      margin: 80px auto;
      display: grid;
      gap: 12px;
    }

    .login form {
      display: grid;
      gap: 8px;
    }

    input,
    button {
      font: inherit;
      padding: 8px 12px;
      border-radius: 6px;
      border: 1px solid var(--synthwave-plum);
    }

    button {
      background: var(--toxic-green);
      color: #150a1f;
      cursor: pointer;
    }
  </style>
</head>
<body>
  {{NAV}}
  <main>
    {{BODY}}
  </main>
</body>
</html>
"#;
