// tests/http_collaborators.rs
//
// Chat webhooks and the Supabase REST store against a local axum server on
// 127.0.0.1:0 that records what it receives.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use http::{HeaderMap, StatusCode};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};

use ch_scout_agent::dedup::{DedupStore, SupabaseSeenStore};
use ch_scout_agent::notify::{DiscordNotifier, Notifier, NotifierMux, SlackNotifier, TelegramNotifier};
use ch_scout_agent::{PainPoint, Post, ScoredPost, Source};

#[derive(Debug, Clone)]
struct Hit {
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone, Default)]
struct Recorded {
    hits: Arc<Mutex<Vec<Hit>>>,
    known_ids: Arc<Mutex<BTreeSet<String>>>,
}

impl Recorded {
    fn paths(&self) -> Vec<String> {
        self.hits.lock().iter().map(|h| h.path.clone()).collect()
    }
}

async fn ok_hook(
    State(rec): State<Recorded>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    rec.hits.lock().push(Hit {
        path: format!("/hook/{name}"),
        query: HashMap::new(),
        headers,
        body,
    });
    StatusCode::NO_CONTENT
}

async fn broken_hook() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn telegram(
    State(rec): State<Recorded>,
    Path(bot): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    rec.hits.lock().push(Hit {
        path: format!("/{bot}/sendMessage"),
        query: HashMap::new(),
        headers,
        body,
    });
    Json(json!({ "ok": true }))
}

async fn seen_select(
    State(rec): State<Recorded>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let id = q
        .get("external_id")
        .and_then(|v| v.strip_prefix("eq."))
        .unwrap_or_default()
        .to_string();
    let known = rec.known_ids.lock().contains(&id);
    rec.hits.lock().push(Hit {
        path: "GET /rest/v1/scout_seen_posts".into(),
        query: q,
        headers,
        body: Value::Null,
    });
    if known {
        Json(json!([{ "id": 1 }]))
    } else {
        Json(json!([]))
    }
}

async fn seen_upsert(
    State(rec): State<Recorded>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    if let Some(id) = body["external_id"].as_str() {
        rec.known_ids.lock().insert(id.to_string());
    }
    rec.hits.lock().push(Hit {
        path: "POST /rest/v1/scout_seen_posts".into(),
        query: q,
        headers,
        body,
    });
    StatusCode::CREATED
}

async fn serve(rec: Recorded) -> SocketAddr {
    let app = Router::new()
        .route("/hook/{name}", post(ok_hook))
        .route("/broken", post(broken_hook))
        .route("/{bot}/sendMessage", post(telegram))
        .route("/rest/v1/scout_seen_posts", get(seen_select).post(seen_upsert))
        .route("/down/rest/v1/scout_seen_posts", get(broken_hook).post(broken_hook))
        .with_state(rec);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

fn scored(id: &str) -> ScoredPost {
    ScoredPost {
        post: Post {
            source: Source::GitHub,
            external_id: id.into(),
            url: format!("https://github.com/example/ch-client/issues/{id}"),
            title: "Handle <429> from Companies House API".into(),
            body: "We get throttled & need backoff".into(),
            tags: vec!["bug".into()],
            created_at: Utc::now(),
        },
        score: 0.6,
        matched_pain_points: BTreeSet::from([PainPoint::RateLimit]),
    }
}

#[tokio::test]
async fn every_channel_posts_its_own_payload() {
    let rec = Recorded::default();
    let addr = serve(rec.clone()).await;

    let channels: Vec<Box<dyn Notifier>> = vec![
        Box::new(DiscordNotifier::new(format!("http://{addr}/hook/discord")).unwrap()),
        Box::new(SlackNotifier::new(format!("http://{addr}/hook/slack")).unwrap()),
        Box::new(
            TelegramNotifier::new("TOKEN".into(), "-100".into())
                .unwrap()
                .with_api_base(format!("http://{addr}/")),
        ),
    ];
    let mux = NotifierMux::new(channels, "https://api.example.test");
    assert_eq!(mux.channel_names(), vec!["discord", "slack", "telegram"]);

    assert!(mux.send(&scored("17")).await);

    let hits = rec.hits.lock().clone();
    assert_eq!(hits.len(), 3);

    let discord = &hits[0];
    assert_eq!(discord.path, "/hook/discord");
    let embed = &discord.body["embeds"][0];
    assert_eq!(embed["url"], "https://github.com/example/ch-client/issues/17");
    assert_eq!(embed["fields"][2]["value"], "rate_limit");
    assert_eq!(embed["footer"]["text"], "ch-scout-agent \u{2022} do not auto-post");

    let slack = &hits[1];
    assert!(slack.body["text"].as_str().unwrap().contains("*Score:* 0.60"));

    let tg = &hits[2];
    assert_eq!(tg.path, "/botTOKEN/sendMessage");
    assert_eq!(tg.body["chat_id"], "-100");
    assert_eq!(tg.body["parse_mode"], "HTML");
    let text = tg.body["text"].as_str().unwrap();
    assert!(text.contains("Handle &lt;429&gt; from Companies House API"));
    assert!(text.contains("throttled &amp; need backoff"));
}

#[tokio::test]
async fn failing_channel_does_not_block_the_others() {
    let rec = Recorded::default();
    let addr = serve(rec.clone()).await;

    let broken = DiscordNotifier::new(format!("http://{addr}/broken")).unwrap();
    assert!(broken.send(&ch_scout_agent::notify::Alert::from_scored(&scored("1"), "x")).await.is_err());

    let mux = NotifierMux::new(
        vec![
            Box::new(broken),
            Box::new(SlackNotifier::new(format!("http://{addr}/hook/slack")).unwrap()),
        ],
        "x",
    );
    assert!(mux.send(&scored("2")).await);
    assert_eq!(rec.paths(), vec!["/hook/slack".to_string()]);

    let all_broken = NotifierMux::new(
        vec![Box::new(SlackNotifier::new(format!("http://{addr}/broken")).unwrap())],
        "x",
    );
    assert!(!all_broken.send(&scored("3")).await);
}

#[tokio::test]
async fn supabase_store_checks_and_upserts_by_key() {
    let rec = Recorded::default();
    let addr = serve(rec.clone()).await;

    let store = SupabaseSeenStore::new(&format!("http://{addr}/"), "service-key").unwrap();
    let dedup = DedupStore::new(Arc::new(store));
    assert_eq!(dedup.backend_name(), "supabase");

    let s = scored("17");
    assert!(dedup.is_new(&s.post).await);
    dedup.mark_seen(&s, true).await;

    // A fresh process (empty cache) still sees the persisted row.
    dedup.reset();
    assert!(!dedup.is_new(&s.post).await);

    let hits = rec.hits.lock().clone();
    let select = &hits[0];
    assert_eq!(select.query["source"], "eq.github");
    assert_eq!(select.query["external_id"], "eq.17");
    assert_eq!(select.query["limit"], "1");
    assert_eq!(select.headers["apikey"], "service-key");
    assert_eq!(select.headers["authorization"], "Bearer service-key");

    let upsert = &hits[1];
    assert_eq!(upsert.path, "POST /rest/v1/scout_seen_posts");
    assert_eq!(upsert.query["on_conflict"], "source,external_id");
    assert!(upsert.headers["prefer"]
        .to_str()
        .unwrap()
        .contains("resolution=merge-duplicates"));
    assert_eq!(upsert.body["source"], "github");
    assert_eq!(upsert.body["notified"], true);
    assert_eq!(upsert.body["matched_pain_points"], json!(["rate_limit"]));
    assert_eq!(upsert.body["relevance_score"], 0.6);
}

#[tokio::test]
async fn unreachable_store_degrades_to_new_and_cache() {
    let rec = Recorded::default();
    let addr = serve(rec.clone()).await;

    let store = SupabaseSeenStore::new(&format!("http://{addr}/down"), "k").unwrap();
    let dedup = DedupStore::new(Arc::new(store));
    let s = scored("9");

    // Check failure counts as new; write failure still updates the cache.
    assert!(dedup.is_new(&s.post).await);
    dedup.mark_seen(&s, false).await;
    assert!(!dedup.is_new(&s.post).await);
}
