//! `HttpGenreSource` and `GenreCache` against a real `genrefm serve` router.

use async_trait::async_trait;
use genrefm::server::{self, AppState};
use genrefm::{
    CacheSettings, CacheStore, Genre, GenreCache, GenreDistribution, GenreSource, HttpGenreSource,
    MemoryStore, Period, RefreshEvent, Served, SledStore, SourceError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

struct CountingSource {
    genres: Option<GenreDistribution>,
    calls: AtomicUsize,
}

#[async_trait]
impl GenreSource for CountingSource {
    async fn fetch_genres(&self, _period: Period) -> Result<GenreDistribution, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.genres.clone().ok_or_else(|| SourceError::Status {
            status: 503,
            message: "upstream down".to_string(),
        })
    }
}

async fn spawn_server(genres: Option<GenreDistribution>) -> (String, Arc<CountingSource>) {
    let source = Arc::new(CountingSource {
        genres,
        calls: AtomicUsize::new(0),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(source.clone());
    tokio::spawn(async move {
        server::serve(listener, state).await.unwrap();
    });

    (format!("http://{addr}"), source)
}

fn sample() -> GenreDistribution {
    vec![Genre::new("post-rock", 640.0), Genre::new("ambient", 210.25)]
}

#[tokio::test]
async fn test_http_source_decodes_genres() {
    let (base_url, _) = spawn_server(Some(sample())).await;
    let source = HttpGenreSource::new(&base_url).unwrap();

    let genres = source.fetch_genres(Period::ThreeMonth).await.unwrap();

    assert_eq!(genres, sample());
}

#[tokio::test]
async fn test_http_source_reports_error_body() {
    let (base_url, _) = spawn_server(None).await;
    let source = HttpGenreSource::new(&base_url).unwrap();

    let err = source.fetch_genres(Period::Overall).await.unwrap_err();

    match err {
        SourceError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to analyze genres");
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cache_over_http_source_fetches_once() {
    let (base_url, server_source) = spawn_server(Some(sample())).await;
    let source = Arc::new(HttpGenreSource::new(&base_url).unwrap());
    let cache = GenreCache::new(source, Arc::new(MemoryStore::new()), &CacheSettings::default());

    let first = cache.get_genres(Period::SevenDay).await.unwrap();
    let second = cache.get_genres(Period::SevenDay).await.unwrap();

    assert_eq!(first.served, Served::Fetched);
    assert_eq!(second.served, Served::Cached);
    assert_eq!(second.genres, sample());
    assert_eq!(server_source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_persists_to_sled() {
    let (base_url, _) = spawn_server(Some(sample())).await;
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("genre_cache");
    let store = Arc::new(SledStore::open(path.to_str().unwrap()).unwrap());

    let source = Arc::new(HttpGenreSource::new(&base_url).unwrap());
    let cache = GenreCache::new(source, store.clone(), &CacheSettings::default());
    cache.get_genres(Period::TwelveMonth).await.unwrap();

    let entry = store.get("genres-cache-12month").unwrap().unwrap();
    assert_eq!(entry.data, sample());
    assert!(entry.timestamp > 0);
}

#[tokio::test]
async fn test_prefetch_publishes_refresh_event() {
    let (base_url, _) = spawn_server(Some(sample())).await;
    let source = Arc::new(HttpGenreSource::new(&base_url).unwrap());
    let settings = CacheSettings {
        prefetch_delay_ms: 0,
        prefetch_periods: vec![Period::SevenDay, Period::ThreeMonth],
        ..CacheSettings::default()
    };
    let cache = GenreCache::new(source, Arc::new(MemoryStore::new()), &settings);
    let mut events = cache.subscribe();

    let scheduled = cache.prefetch_adjacent();
    assert_eq!(scheduled, vec![Period::SevenDay, Period::ThreeMonth]);

    let mut refreshed = Vec::new();
    for _ in 0..scheduled.len() {
        match events.recv().await.unwrap() {
            RefreshEvent::Refreshed { period, genres } => {
                assert_eq!(genres, sample());
                refreshed.push(period);
            }
            other => panic!("expected a refresh, got {other:?}"),
        }
    }
    refreshed.sort_by_key(|period| period.as_str());
    assert_eq!(refreshed, vec![Period::ThreeMonth, Period::SevenDay]);

    let again = cache.get_genres(Period::SevenDay).await.unwrap();
    assert_eq!(again.served, Served::Cached);
}
