use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::env;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Movie, MovieId};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const DEFAULT_LANGUAGE: &str = "es-ES";

pub const POSTER_DEFAULT: &str = "w185";
pub const POSTER_THUMB: &str = "w92";
pub const POSTER_LARGE: &str = "w342";

#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("movie id not provided")]
    MissingId,
    #[error("TMDB API error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("JSON parse failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid request URL: {0}")]
    Url(String),
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn popular_movies(&self, page: u32) -> Result<Vec<Movie>, TmdbError>;
    async fn movie_details(&self, id: &MovieId) -> Result<Movie, TmdbError>;
    async fn similar_movies(&self, id: &MovieId, page: u32) -> Result<Vec<Movie>, TmdbError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>, language: impl Into<String>) -> Result<Self, TmdbError> {
        let user_agent = format!("cinetren/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            language: language.into(),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let language = env::var("TMDB_LANGUAGE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        Self::new(api_key, language).context("Failed to build TMDB HTTP client")
    }

    // Empty params are skipped so upstream defaults apply.
    pub fn build_url(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<Url, TmdbError> {
        let mut url = Url::parse(&format!("{TMDB_BASE}{path}"))
            .map_err(|e| TmdbError::Url(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api_key", &self.api_key);
            query.append_pair("language", &self.language);
            for (key, value) in params {
                if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                    query.append_pair(key, v);
                }
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, TmdbError> {
        debug!("GET {}", url.path());
        let res = self.client.get(url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(TmdbError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_results(&self, url: Url) -> Result<Vec<Movie>, TmdbError> {
        let data: serde_json::Value = self.get_json(url).await?;
        parse_results(data)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn popular_movies(&self, page: u32) -> Result<Vec<Movie>, TmdbError> {
        let url = self.build_url("/movie/popular", &[("page", Some(page.to_string()))])?;
        self.get_results(url).await
    }

    async fn movie_details(&self, id: &MovieId) -> Result<Movie, TmdbError> {
        if id.is_empty() {
            return Err(TmdbError::MissingId);
        }
        let path = format!("/movie/{}", urlencoding::encode(id.as_str()));
        let url = self.build_url(&path, &[])?;
        self.get_json(url).await
    }

    async fn similar_movies(&self, id: &MovieId, page: u32) -> Result<Vec<Movie>, TmdbError> {
        if id.is_empty() {
            return Err(TmdbError::MissingId);
        }
        let path = format!("/movie/{}/similar", urlencoding::encode(id.as_str()));
        let url = self.build_url(&path, &[("page", Some(page.to_string()))])?;
        self.get_results(url).await
    }
}

pub fn parse_results(data: serde_json::Value) -> Result<Vec<Movie>, TmdbError> {
    let items = match data {
        serde_json::Value::Object(mut map) => match map.remove("results") {
            Some(serde_json::Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };
    let mut movies = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Movie>(item) {
            Ok(movie) => movies.push(movie),
            Err(e) => warn!("Skipping unreadable movie in results: {}", e),
        }
    }
    Ok(movies)
}

pub fn poster_url(path: Option<&str>, size: &str) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{IMAGE_BASE}/{size}{p}"),
        _ => String::new(),
    }
}
