use futures::future::join_all;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::favorites::{FavoritesStore, SyncStatus, Toggled};
use crate::listing::{self, Kpis, ListQuery, SimilarSort, SortKey};
use crate::models::{Movie, MovieId};
use crate::tmdb::{TmdbApi, TmdbError};

pub const CATALOG_ERROR: &str = "No se han podido cargar las películas. Inténtalo más tarde.";
pub const FAVORITES_ERROR: &str = "No se han podido cargar tus favoritos.";
pub const MISSING_ID_ERROR: &str = "No se ha proporcionado ninguna película.";
pub const DETAIL_ERROR: &str = "No se ha podido cargar la información de la película.";
pub const SIMILAR_ERROR: &str = "No se han podido cargar las películas similares.";

pub const TOAST_DISMISS_AFTER: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub sync: SyncStatus,
}

impl Notice {
    pub fn from_toggled(toggled: &Toggled) -> Self {
        Self {
            kind: if toggled.now_favorite {
                NoticeKind::Added
            } else {
                NoticeKind::Removed
            },
            sync: toggled.sync,
        }
    }

    pub fn message(&self) -> String {
        let base = match self.kind {
            NoticeKind::Added => "Añadido a favoritos",
            NoticeKind::Removed => "Eliminado de favoritos",
        };
        match self.sync {
            SyncStatus::Persisted => base.to_string(),
            SyncStatus::Failed => format!("{base} (no se ha podido guardar)"),
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self.kind {
            NoticeKind::Added => "added",
            NoticeKind::Removed => "removed",
        }
    }

    pub fn from_params(toast: Option<&str>, sync: Option<&str>) -> Option<Self> {
        let kind = match toast? {
            "added" => NoticeKind::Added,
            "removed" => NoticeKind::Removed,
            _ => return None,
        };
        let sync = match sync {
            Some("failed") => SyncStatus::Failed,
            _ => SyncStatus::Persisted,
        };
        Some(Self { kind, sync })
    }
}

pub fn toggle_favorite(store: &dyn FavoritesStore, id: &MovieId) -> Notice {
    let toggled = store.toggle(id);
    if toggled.sync == SyncStatus::Failed {
        warn!(id = %id, "Favorite toggled but not persisted");
    }
    Notice::from_toggled(&toggled)
}

#[derive(Debug, Clone, Default)]
pub struct ListState {
    pub loading: bool,
    pub error: Option<&'static str>,
    pub all: Vec<Movie>,
    pub filtered: Vec<Movie>,
    pub years: Vec<String>,
    pub query: ListQuery,
}

impl ListState {
    fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn finish_load(&mut self, result: Result<Vec<Movie>, &'static str>) {
        match result {
            Ok(movies) => {
                self.years = listing::distinct_years(&movies);
                self.all = movies;
            }
            Err(message) => {
                self.error = Some(message);
                self.all.clear();
                self.years.clear();
            }
        }
        self.loading = false;
    }

    fn run_pipeline(&mut self, sort: Option<SortKey>) {
        self.filtered = listing::filter_movies(&self.all, &self.query);
        if let Some(key) = sort {
            listing::sort_movies(&mut self.filtered, key);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub list: ListState,
}

impl CatalogView {
    pub fn new(query: ListQuery) -> Self {
        Self {
            list: ListState {
                query,
                ..ListState::default()
            },
        }
    }

    pub fn page(&self) -> u32 {
        self.list.query.page()
    }

    pub fn sort_key(&self) -> SortKey {
        self.list.query.sort_key().unwrap_or_default()
    }

    pub async fn load(&mut self, api: &dyn TmdbApi) {
        self.list.begin_load();
        let result = api.popular_movies(self.page()).await.map_err(|e| {
            error!("Failed to load popular movies: {}", e);
            CATALOG_ERROR
        });
        self.list.finish_load(result);
        self.refresh();
    }

    pub fn reset(&mut self) {
        self.list.query.reset();
        self.refresh();
    }

    pub fn kpis(&self) -> Kpis {
        Kpis::compute(&self.list.filtered)
    }

    fn refresh(&mut self) {
        let key = self.sort_key();
        self.list.run_pipeline(Some(key));
    }
}

#[derive(Debug)]
pub enum BatchOutcome {
    Complete(Vec<Movie>),
    Partial {
        loaded: Vec<Movie>,
        failed: Vec<(MovieId, TmdbError)>,
    },
}

// Order of `loaded` follows `ids`.
pub async fn fetch_all_details(api: &dyn TmdbApi, ids: &[MovieId]) -> BatchOutcome {
    let results = join_all(ids.iter().map(|id| async move {
        let res = api.movie_details(id).await;
        (id.clone(), res)
    }))
    .await;

    let mut loaded = Vec::with_capacity(results.len());
    let mut failed = Vec::new();
    for (id, res) in results {
        match res {
            Ok(movie) => loaded.push(movie),
            Err(e) => failed.push((id, e)),
        }
    }
    if failed.is_empty() {
        BatchOutcome::Complete(loaded)
    } else {
        BatchOutcome::Partial { loaded, failed }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FavoritesView {
    pub list: ListState,
}

impl FavoritesView {
    pub fn new(query: ListQuery) -> Self {
        Self {
            list: ListState {
                query,
                ..ListState::default()
            },
        }
    }

    pub async fn load(&mut self, api: &dyn TmdbApi, store: &dyn FavoritesStore) {
        self.list.begin_load();
        let ids = store.favorites();
        if ids.is_empty() {
            self.list.finish_load(Ok(Vec::new()));
            self.refresh();
            return;
        }

        info!("Loading {} favorites", ids.len());
        let result = match fetch_all_details(api, &ids).await {
            BatchOutcome::Complete(movies) => Ok(movies),
            BatchOutcome::Partial { loaded, failed } => {
                for (id, e) in &failed {
                    error!(id = %id, "Failed to load favorite: {}", e);
                }
                warn!(
                    "{} of {} favorites failed to load; discarding {} loaded",
                    failed.len(),
                    ids.len(),
                    loaded.len()
                );
                Err(FAVORITES_ERROR)
            }
        };
        self.list.finish_load(result);
        self.refresh();
    }

    pub fn reset(&mut self) {
        self.list.query.reset();
        self.refresh();
    }

    pub fn is_empty(&self) -> bool {
        !self.list.loading && self.list.error.is_none() && self.list.filtered.is_empty()
    }

    fn refresh(&mut self) {
        self.list.run_pipeline(None);
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetailView {
    pub id: Option<MovieId>,
    pub movie: Option<Movie>,
    pub error: Option<&'static str>,
    pub similar: Vec<Movie>,
    pub similar_loading: bool,
    pub similar_error: Option<&'static str>,
    pub sort: SimilarSort,
    pub is_favorite: bool,
}

impl DetailView {
    pub fn new(id: Option<MovieId>) -> Self {
        Self {
            id: id.filter(|id| !id.is_empty()),
            ..Self::default()
        }
    }

    pub async fn load(&mut self, api: &dyn TmdbApi, store: &dyn FavoritesStore) {
        let Some(id) = self.id.clone() else {
            self.error = Some(MISSING_ID_ERROR);
            return;
        };

        self.similar_loading = true;
        self.similar_error = None;
        let (detail, similar) = tokio::join!(api.movie_details(&id), api.similar_movies(&id, 1));

        match detail {
            Ok(movie) => {
                self.is_favorite = store.is_favorite(&movie.id);
                self.movie = Some(movie);
            }
            Err(e) => {
                error!(id = %id, "Failed to load movie detail: {}", e);
                self.error = Some(DETAIL_ERROR);
            }
        }

        match similar {
            Ok(movies) => {
                self.similar = movies;
                self.sort.apply(&mut self.similar);
            }
            Err(e) => {
                error!(id = %id, "Failed to load similar movies: {}", e);
                self.similar_error = Some(SIMILAR_ERROR);
            }
        }
        self.similar_loading = false;
    }

    pub fn set_sort(&mut self, sort: SimilarSort) {
        self.sort = sort;
        self.sort.apply(&mut self.similar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::{LocalFavorites, MemoryStorage};
    use crate::listing::SimilarColumn;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTmdb {
        popular: Vec<Movie>,
        details: HashMap<String, Movie>,
        similar: Vec<Movie>,
        fail_popular: bool,
        fail_similar: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TmdbApi for FakeTmdb {
        async fn popular_movies(&self, page: u32) -> Result<Vec<Movie>, TmdbError> {
            self.calls.lock().unwrap().push(format!("popular:{page}"));
            if self.fail_popular {
                return Err(TmdbError::Http {
                    status: 401,
                    body: "{\"status_message\":\"Invalid API key\"}".to_string(),
                });
            }
            Ok(self.popular.clone())
        }

        async fn movie_details(&self, id: &MovieId) -> Result<Movie, TmdbError> {
            self.calls.lock().unwrap().push(format!("detail:{id}"));
            self.details.get(id.as_str()).cloned().ok_or(TmdbError::Http {
                status: 404,
                body: "not found".to_string(),
            })
        }

        async fn similar_movies(&self, id: &MovieId, _page: u32) -> Result<Vec<Movie>, TmdbError> {
            self.calls.lock().unwrap().push(format!("similar:{id}"));
            if self.fail_similar {
                return Err(TmdbError::Http {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(self.similar.clone())
        }
    }

    fn movie(id: i64, title: &str, rating: f64, popularity: f64, date: &str) -> Movie {
        let mut m = Movie::new(id);
        m.title = Some(title.to_string());
        m.vote_average = Some(rating);
        m.popularity = Some(popularity);
        m.release_date = Some(date.to_string());
        m
    }

    fn dune_set() -> Vec<Movie> {
        vec![
            movie(1, "Dune", 8.0, 50.0, "2021-09-15"),
            movie(2, "Dune Part Two", 8.3, 90.0, "2024-02-28"),
            movie(3, "Her", 8.0, 20.0, "2013-12-18"),
        ]
    }

    fn favorites_with(ids: &[&str]) -> LocalFavorites<MemoryStorage> {
        let store = LocalFavorites::new(MemoryStorage::new());
        for id in ids {
            store.toggle(&MovieId::from(*id));
        }
        store
    }

    #[tokio::test]
    async fn catalog_loads_and_sorts_by_popularity() {
        let api = FakeTmdb {
            popular: dune_set(),
            ..FakeTmdb::default()
        };
        let mut view = CatalogView::new(ListQuery::default());
        view.load(&api).await;

        assert!(!view.list.loading);
        assert_eq!(view.list.error, None);
        let ids: Vec<&str> = view.list.filtered.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(view.list.years, vec!["2024", "2021", "2013"]);
        assert_eq!(view.kpis().count, 3);
    }

    #[tokio::test]
    async fn catalog_failure_shows_fixed_message() {
        let api = FakeTmdb {
            popular: dune_set(),
            fail_popular: true,
            ..FakeTmdb::default()
        };
        let mut view = CatalogView::new(ListQuery::default());
        view.load(&api).await;

        assert!(!view.list.loading);
        assert_eq!(view.list.error, Some(CATALOG_ERROR));
        assert!(view.list.filtered.is_empty());
        assert_eq!(view.kpis().rating_text(), "-");
    }

    #[tokio::test]
    async fn catalog_filters_and_resets() {
        let api = FakeTmdb {
            popular: dune_set(),
            ..FakeTmdb::default()
        };
        let mut view = CatalogView::new(ListQuery {
            search: "DUNE".to_string(),
            min_rating: "8.1".to_string(),
            ..ListQuery::default()
        });
        view.load(&api).await;
        assert_eq!(view.list.filtered.len(), 1);
        assert_eq!(view.list.filtered[0].title_or_empty(), "Dune Part Two");
        assert_eq!(view.kpis().rating_text(), "8.3");

        view.reset();
        assert_eq!(view.list.filtered.len(), 3);
        assert_eq!(view.sort_key(), SortKey::Popularity);
    }

    #[tokio::test]
    async fn favorites_without_ids_skip_fetch() {
        let api = FakeTmdb::default();
        let store = favorites_with(&[]);
        let mut view = FavoritesView::new(ListQuery::default());
        view.load(&api, &store).await;

        assert!(view.is_empty());
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn favorites_fail_as_a_whole() {
        let api = FakeTmdb {
            details: HashMap::from([("1".to_string(), dune_set()[0].clone())]),
            ..FakeTmdb::default()
        };
        let store = favorites_with(&["1", "99"]);
        let mut view = FavoritesView::new(ListQuery::default());
        view.load(&api, &store).await;

        assert_eq!(view.list.error, Some(FAVORITES_ERROR));
        assert!(view.list.all.is_empty());
        assert!(!view.list.loading);
        assert!(!view.is_empty());
    }

    #[tokio::test]
    async fn batch_outcome_names_failed_ids() {
        let api = FakeTmdb {
            details: HashMap::from([("1".to_string(), dune_set()[0].clone())]),
            ..FakeTmdb::default()
        };
        let ids = vec![MovieId::from("1"), MovieId::from("99")];
        match fetch_all_details(&api, &ids).await {
            BatchOutcome::Partial { loaded, failed } => {
                assert_eq!(loaded.len(), 1);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].0, MovieId::from("99"));
                assert!(matches!(failed[0].1, TmdbError::Http { status: 404, .. }));
            }
            other => panic!("expected partial outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn removing_favorite_drops_its_row() {
        let set = dune_set();
        let api = FakeTmdb {
            details: set
                .iter()
                .map(|m| (m.id.to_string(), m.clone()))
                .collect(),
            ..FakeTmdb::default()
        };
        let store = favorites_with(&["1", "2", "3"]);
        let mut view = FavoritesView::new(ListQuery {
            search: "dune".to_string(),
            ..ListQuery::default()
        });
        view.load(&api, &store).await;
        assert_eq!(view.list.filtered.len(), 2);

        let notice = toggle_favorite(&store, &MovieId::from(1i64));
        assert_eq!(notice.kind, NoticeKind::Removed);
        assert_eq!(notice.message(), "Eliminado de favoritos");

        view.load(&api, &store).await;
        assert_eq!(view.list.all.len(), 2);
        assert_eq!(view.list.filtered.len(), 1);
        assert_eq!(view.list.filtered[0].title_or_empty(), "Dune Part Two");
        assert_eq!(view.list.years, vec!["2024", "2013"]);
    }

    #[tokio::test]
    async fn detail_without_id_does_not_fetch() {
        let api = FakeTmdb::default();
        let store = favorites_with(&[]);
        let mut view = DetailView::new(None);
        view.load(&api, &store).await;

        assert_eq!(view.error, Some(MISSING_ID_ERROR));
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn detail_and_similar_fail_independently() {
        let set = dune_set();
        let api = FakeTmdb {
            details: HashMap::from([("1".to_string(), set[0].clone())]),
            fail_similar: true,
            ..FakeTmdb::default()
        };
        let store = favorites_with(&["1"]);
        let mut view = DetailView::new(Some(MovieId::from("1")));
        view.load(&api, &store).await;

        assert_eq!(view.error, None);
        assert!(view.is_favorite);
        assert_eq!(view.similar_error, Some(SIMILAR_ERROR));
        assert!(!view.similar_loading);

        let api = FakeTmdb {
            similar: set.clone(),
            ..FakeTmdb::default()
        };
        let mut view = DetailView::new(Some(MovieId::from("1")));
        view.load(&api, &store).await;
        assert_eq!(view.error, Some(DETAIL_ERROR));
        assert_eq!(view.similar.len(), 3);
        assert_eq!(view.similar_error, None);
    }

    #[tokio::test]
    async fn detail_toggle_flips_button_state() {
        let set = dune_set();
        let api = FakeTmdb {
            details: HashMap::from([("3".to_string(), set[2].clone())]),
            similar: set,
            ..FakeTmdb::default()
        };
        let store = favorites_with(&[]);
        let mut view = DetailView::new(Some(MovieId::from("3")));
        view.load(&api, &store).await;
        assert!(!view.is_favorite);

        let notice = toggle_favorite(&store, &MovieId::from(3i64));
        assert_eq!(notice.message(), "Añadido a favoritos");
        view.load(&api, &store).await;
        assert!(view.is_favorite);

        view.set_sort(view.sort.clicked(SimilarColumn::Popularity));
        let pops: Vec<f64> = view.similar.iter().map(|m| m.popularity.unwrap()).collect();
        assert_eq!(pops, vec![20.0, 50.0, 90.0]);
        view.set_sort(view.sort.clicked(SimilarColumn::Popularity));
        assert_eq!(view.similar[0].popularity, Some(90.0));
    }

    #[test]
    fn notice_round_trips_through_params() {
        let notice = Notice {
            kind: NoticeKind::Added,
            sync: SyncStatus::Failed,
        };
        assert_eq!(
            Notice::from_params(Some(notice.as_param()), Some("failed")),
            Some(notice)
        );
        assert_eq!(Notice::from_params(Some("bogus"), None), None);
        assert!(notice.message().contains("no se ha podido guardar"));
    }
}
