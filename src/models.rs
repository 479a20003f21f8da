use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// Held in normalized string form so numeric and string ids compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl MovieId {
    pub fn normalize(raw: impl fmt::Display) -> Self {
        Self(raw.to_string().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MovieId {
    fn from(value: &str) -> Self {
        Self::normalize(value)
    }
}

impl From<String> for MovieId {
    fn from(value: String) -> Self {
        Self::normalize(value)
    }
}

impl From<i64> for MovieId {
    fn from(value: i64) -> Self {
        Self::normalize(value)
    }
}

impl From<u64> for MovieId {
    fn from(value: u64) -> Self {
        Self::normalize(value)
    }
}

impl From<i32> for MovieId {
    fn from(value: i32) -> Self {
        Self::normalize(value)
    }
}

impl<'de> Deserialize<'de> for MovieId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => MovieId::from(n),
            Raw::Float(f) => MovieId::normalize(f),
            Raw::Text(s) => MovieId::from(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<u64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub genres: Vec<Genre>,
}

impl Movie {
    pub fn new(id: impl Into<MovieId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            overview: None,
            poster_path: None,
            release_date: None,
            runtime: None,
            original_language: None,
            vote_average: None,
            vote_count: None,
            popularity: None,
            genres: Vec::new(),
        }
    }

    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .map(|d| d.get(..4).unwrap_or(d))
            .filter(|y| !y.is_empty())
    }
}

// TMDB sends "" for unknown release dates.
fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Genre>, D::Error> {
    Ok(Option::<Vec<Genre>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_string_ids_are_equal() {
        assert_eq!(MovieId::from(550i64), MovieId::from("550"));
        assert_eq!(MovieId::from(550u64), MovieId::from(" 550 "));

        let from_number: MovieId = serde_json::from_value(json!(27205)).unwrap();
        let from_text: MovieId = serde_json::from_value(json!("27205")).unwrap();
        assert_eq!(from_number, from_text);
    }

    #[test]
    fn parses_partial_movie_record() {
        let movie: Movie = serde_json::from_value(json!({
            "id": 438631,
            "title": "Dune",
            "release_date": "",
            "vote_average": 7.8,
            "genres": [{ "id": 878, "name": "Ciencia ficción" }]
        }))
        .unwrap();
        assert_eq!(movie.id.as_str(), "438631");
        assert_eq!(movie.release_date, None);
        assert_eq!(movie.year(), None);
        assert_eq!(movie.vote_count, None);
        assert_eq!(movie.genres[0].name, "Ciencia ficción");
    }

    #[test]
    fn year_is_date_prefix() {
        let mut movie = Movie::new(1i64);
        movie.release_date = Some("2021-09-15".to_string());
        assert_eq!(movie.year(), Some("2021"));
    }
}
