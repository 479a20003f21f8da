use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::models::Movie;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    #[serde(rename = "q")]
    pub search: String,
    pub min_rating: String,
    pub year: String,
    pub sort: String,
    pub page: String,
    pub reset: Option<String>,
}

impl ListQuery {
    pub fn min_rating(&self) -> f64 {
        self.min_rating
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    pub fn year(&self) -> Option<&str> {
        Some(self.year.trim()).filter(|y| !y.is_empty())
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        SortKey::parse(self.sort.trim())
    }

    pub fn page(&self) -> u32 {
        self.page
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    pub fn wants_reset(&self) -> bool {
        self.reset.is_some()
    }

    pub fn reset(&mut self) {
        *self = ListQuery {
            page: std::mem::take(&mut self.page),
            ..ListQuery::default()
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Popularity,
    VoteAverage,
    VoteCount,
    ReleaseDate,
    Title,
}

impl SortKey {
    pub const CATALOG: [SortKey; 4] = [
        SortKey::Popularity,
        SortKey::VoteAverage,
        SortKey::VoteCount,
        SortKey::ReleaseDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Popularity => "popularity",
            SortKey::VoteAverage => "vote_average",
            SortKey::VoteCount => "vote_count",
            SortKey::ReleaseDate => "release_date",
            SortKey::Title => "title",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Popularity => "Popularidad",
            SortKey::VoteAverage => "Valoración",
            SortKey::VoteCount => "Votos",
            SortKey::ReleaseDate => "Fecha de estreno",
            SortKey::Title => "Título",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::CATALOG.into_iter().find(|k| k.as_str() == value)
    }
}

pub fn matches(movie: &Movie, query: &ListQuery) -> bool {
    let text = query.search.trim().to_lowercase();
    let min_rating = query.min_rating();

    let match_text = movie.title_or_empty().to_lowercase().contains(&text);
    let match_rating = movie.vote_average.unwrap_or(0.0) >= min_rating;
    let match_year = match query.year() {
        Some(year) => movie
            .release_date
            .as_deref()
            .unwrap_or("")
            .starts_with(year),
        None => true,
    };
    match_text && match_rating && match_year
}

pub fn filter_movies(movies: &[Movie], query: &ListQuery) -> Vec<Movie> {
    movies.iter().filter(|m| matches(m, query)).cloned().collect()
}

fn numeric(movie: &Movie, key: SortKey) -> f64 {
    match key {
        SortKey::Popularity => movie.popularity.unwrap_or(0.0),
        SortKey::VoteAverage => movie.vote_average.unwrap_or(0.0),
        SortKey::VoteCount => movie.vote_count.unwrap_or(0) as f64,
        SortKey::ReleaseDate | SortKey::Title => 0.0,
    }
}

fn release_date(movie: &Movie) -> &str {
    movie.release_date.as_deref().unwrap_or("")
}

// Spanish collation: case and accents are ignored, ñ sorts after every n.
fn title_key(movie: &Movie) -> String {
    let mut key = String::with_capacity(movie.title_or_empty().len());
    for ch in movie.title_or_empty().nfc().flat_map(char::to_lowercase) {
        if ch == 'ñ' {
            key.push('n');
            key.push(char::MAX);
            continue;
        }
        key.extend(std::iter::once(ch).nfd().filter(|c| !is_combining_mark(*c)));
    }
    key
}

fn compare_titles(a: &Movie, b: &Movie) -> Ordering {
    title_key(a)
        .cmp(&title_key(b))
        .then_with(|| a.title_or_empty().cmp(b.title_or_empty()))
}

// Half away from zero, so 7.25 shows as 7.3.
fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

fn one_decimal(value: f64) -> String {
    format!("{:.1}", round_to(value, 1))
}

fn whole(value: f64) -> String {
    format!("{:.0}", value.round())
}

fn compare(a: &Movie, b: &Movie, key: SortKey) -> Ordering {
    match key {
        SortKey::ReleaseDate => release_date(a).cmp(release_date(b)),
        SortKey::Title => compare_titles(a, b),
        _ => numeric(a, key).total_cmp(&numeric(b, key)),
    }
}

pub fn sort_movies(movies: &mut [Movie], key: SortKey) {
    movies.sort_by(|a, b| compare(b, a, key));
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub count: usize,
    pub mean_rating: Option<f64>,
    pub mean_popularity: Option<f64>,
}

impl Kpis {
    pub fn compute(movies: &[Movie]) -> Self {
        let count = movies.len();
        if count == 0 {
            return Self {
                count,
                mean_rating: None,
                mean_popularity: None,
            };
        }
        let rating: f64 = movies.iter().map(|m| m.vote_average.unwrap_or(0.0)).sum();
        let popularity: f64 = movies.iter().map(|m| m.popularity.unwrap_or(0.0)).sum();
        Self {
            count,
            mean_rating: Some(rating / count as f64),
            mean_popularity: Some(popularity / count as f64),
        }
    }

    pub fn rating_text(&self) -> String {
        self.mean_rating
            .map(one_decimal)
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn popularity_text(&self) -> String {
        self.mean_popularity
            .map(whole)
            .unwrap_or_else(|| "-".to_string())
    }
}

pub fn distinct_years(movies: &[Movie]) -> Vec<String> {
    let years: BTreeSet<&str> = movies.iter().filter_map(|m| m.year()).collect();
    years.into_iter().rev().map(str::to_string).collect()
}

pub fn fmt_rating(value: Option<f64>) -> String {
    value.map(one_decimal).unwrap_or_else(|| "-".to_string())
}

pub fn fmt_popularity(value: Option<f64>) -> String {
    value.map(whole).unwrap_or_else(|| "-".to_string())
}

pub fn fmt_count(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn fmt_date(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarColumn {
    Title,
    VoteAverage,
    Popularity,
    ReleaseDate,
}

impl SimilarColumn {
    pub const ALL: [SimilarColumn; 4] = [
        SimilarColumn::Title,
        SimilarColumn::VoteAverage,
        SimilarColumn::Popularity,
        SimilarColumn::ReleaseDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarColumn::Title => "title",
            SimilarColumn::VoteAverage => "vote_average",
            SimilarColumn::Popularity => "popularity",
            SimilarColumn::ReleaseDate => "release_date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SimilarColumn::Title => "Título",
            SimilarColumn::VoteAverage => "Valoración",
            SimilarColumn::Popularity => "Popularidad",
            SimilarColumn::ReleaseDate => "Estreno",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == value)
    }

    fn sort_key(&self) -> SortKey {
        match self {
            SimilarColumn::Title => SortKey::Title,
            SimilarColumn::VoteAverage => SortKey::VoteAverage,
            SimilarColumn::Popularity => SortKey::Popularity,
            SimilarColumn::ReleaseDate => SortKey::ReleaseDate,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimilarSort {
    pub column: Option<SimilarColumn>,
    pub ascending: bool,
}

impl SimilarSort {
    pub fn new(column: SimilarColumn, ascending: bool) -> Self {
        Self {
            column: Some(column),
            ascending,
        }
    }

    pub fn clicked(self, column: SimilarColumn) -> Self {
        if self.column == Some(column) {
            Self::new(column, !self.ascending)
        } else {
            Self::new(column, true)
        }
    }

    pub fn indicator(&self, column: SimilarColumn) -> Option<bool> {
        (self.column == Some(column)).then_some(self.ascending)
    }

    pub fn apply(&self, movies: &mut [Movie]) {
        let Some(column) = self.column else { return };
        let key = column.sort_key();
        if self.ascending {
            movies.sort_by(|a, b| compare(a, b, key));
        } else {
            movies.sort_by(|a, b| compare(b, a, key));
        }
    }
}
