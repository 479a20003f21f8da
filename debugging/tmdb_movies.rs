//! Fetch TMDB records through the app's client and print them as JSON.
//! Usage:
//!   cargo run --bin tmdb_movies -- popular [page]
//!   cargo run --bin tmdb_movies -- movie <tmdb_id>
//!   cargo run --bin tmdb_movies -- similar <tmdb_id> [page]
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use cinetren::listing::{self, Kpis};
use cinetren::models::MovieId;
use cinetren::tmdb::{poster_url, TmdbApi, TmdbClient, POSTER_DEFAULT};
use dotenvy::dotenv;
use serde_json::json;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Popular,
    Movie,
    Similar,
}

impl FromStr for Command {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "popular" => Ok(Command::Popular),
            "movie" => Ok(Command::Movie),
            "similar" => Ok(Command::Similar),
            _ => Err(anyhow::anyhow!(
                "command must be 'popular', 'movie' or 'similar'"
            )),
        }
    }
}

fn page_arg(arg: Option<&String>) -> Result<u32> {
    match arg {
        Some(p) => p.parse().context("page must be a positive integer"),
        None => Ok(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: cargo run --bin tmdb_movies -- popular [page]");
        eprintln!("       cargo run --bin tmdb_movies -- movie <tmdb_id>");
        eprintln!("       cargo run --bin tmdb_movies -- similar <tmdb_id> [page]");
        std::process::exit(1);
    }

    let command = Command::from_str(&args[1])?;
    let client = TmdbClient::from_env()?;

    let movies = match command {
        Command::Popular => client.popular_movies(page_arg(args.get(2))?).await?,
        Command::Movie | Command::Similar => {
            let id = MovieId::from(
                args.get(2)
                    .ok_or_else(|| anyhow::anyhow!("missing tmdb id"))?
                    .as_str(),
            );
            if command == Command::Movie {
                vec![client.movie_details(&id).await?]
            } else {
                client.similar_movies(&id, page_arg(args.get(3))?).await?
            }
        }
    };

    for movie in &movies {
        let out = json!({
            "id": movie.id,
            "title": movie.title,
            "release_date": movie.release_date,
            "vote_average": listing::fmt_rating(movie.vote_average),
            "vote_count": listing::fmt_count(movie.vote_count),
            "popularity": listing::fmt_popularity(movie.popularity),
            "runtime": movie.runtime,
            "genres": movie.genres.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            "poster": poster_url(movie.poster_path.as_deref(), POSTER_DEFAULT),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    let kpis = Kpis::compute(&movies);
    println!(
        "{} movies, mean rating {}, mean popularity {}",
        kpis.count,
        kpis.rating_text(),
        kpis.popularity_text()
    );
    Ok(())
}
