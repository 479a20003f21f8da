use crate::listing::{self, SimilarColumn, SortKey};
use crate::models::{Movie, MovieId};
use crate::tmdb::{poster_url, POSTER_LARGE, POSTER_THUMB};
use crate::views::{CatalogView, DetailView, FavoritesView, ListState, Notice, TOAST_DISMISS_AFTER};

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #111; color: #eee; }
header nav { display: flex; gap: 1rem; padding: 1rem; background: #1c1c1c; }
header a { color: #f5c518; text-decoration: none; }
main { padding: 1rem; }
.hidden { display: none; }
.error { color: #ff6b6b; }
.data-table { width: 100%; border-collapse: collapse; }
.data-table td, .data-table th { padding: .4rem; border-bottom: 1px solid #333; }
.clickable-row a.row-link { color: inherit; text-decoration: none; display: block; }
.poster-thumb { height: 69px; }
.poster-large { max-width: 342px; }
.icon-btn.fav { background: none; border: none; color: #777; font-size: 1.2rem; cursor: pointer; }
.icon-btn.fav.active { color: #f5c518; }
th.sorted-asc::after { content: " ▲"; }
th.sorted-desc::after { content: " ▼"; }
.badge { background: #333; border-radius: 4px; padding: 0 .4rem; }
.kpis { display: flex; gap: 2rem; }
.toast { position: fixed; bottom: 1rem; right: 1rem; background: #333; padding: .6rem 1rem; opacity: 0; transition: opacity .3s; }
.toast.show { opacity: 1; }
"#;

pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn movie_href(id: &MovieId) -> String {
    format!("/movie?id={}", urlencoding::encode(id.as_str()))
}

fn layout(title: &str, body: &str, notice: Option<Notice>) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - CineTren</title>
    <style>{STYLE}</style>
</head>
<body>
    <header>
        <nav>
            <a href="/">Populares</a>
            <a href="/favorites">Favoritos</a>
        </nav>
    </header>
    <main>
{body}
    </main>
{toast}
</body>
</html>"#,
        title = html_escape(title),
        toast = toast(notice),
    )
}

pub fn toast(notice: Option<Notice>) -> String {
    match notice {
        Some(n) => format!(
            r#"    <div id="toast" class="toast show" role="status">{msg}</div>
    <script>setTimeout(function () {{ document.getElementById("toast").classList.remove("show"); }}, {ms});</script>"#,
            msg = html_escape(&n.message()),
            ms = TOAST_DISMISS_AFTER.as_millis(),
        ),
        None => r#"    <div id="toast" class="toast" role="status"></div>"#.to_string(),
    }
}

fn loading_and_error(prefix: &str, loading: bool, error: Option<&str>) -> String {
    format!(
        r#"<div id="{prefix}loading" class="{loading_class}">Cargando…</div>
<div id="{prefix}error" class="error{error_class}">{message}</div>"#,
        loading_class = if loading { "" } else { "hidden" },
        error_class = if error.is_some() { "" } else { " hidden" },
        message = html_escape(error.unwrap_or("")),
    )
}

pub fn favorite_button(id: &MovieId, active: bool, return_to: &str) -> String {
    format!(
        r#"<form method="post" action="/favorites/toggle" class="fav-form">
  <input type="hidden" name="id" value="{id}">
  <input type="hidden" name="return_to" value="{return_to}">
  <button class="icon-btn fav{active}" type="submit" data-id="{id}" aria-label="{label}">★</button>
</form>"#,
        id = html_escape(id.as_str()),
        return_to = html_escape(return_to),
        active = if active { " active" } else { "" },
        label = if active {
            "Quitar de favoritos"
        } else {
            "Marcar como favorito"
        },
    )
}

fn poster_cell(movie: &Movie) -> String {
    let url = poster_url(movie.poster_path.as_deref(), POSTER_THUMB);
    if url.is_empty() {
        return String::new();
    }
    format!(
        r#"<img src="{}" alt="Póster de {}" class="poster-thumb">"#,
        html_escape(&url),
        html_escape(movie.title_or_empty())
    )
}

fn linked(movie: &Movie, content: &str) -> String {
    format!(
        r#"<a class="row-link" href="{}">{}</a>"#,
        html_escape(&movie_href(&movie.id)),
        content
    )
}

fn title_text(movie: &Movie) -> String {
    html_escape(movie.title.as_deref().unwrap_or("-"))
}

fn year_options(years: &[String], selected: Option<&str>) -> String {
    let mut out = String::from(r#"<option value="">Todos</option>"#);
    for year in years {
        let sel = if selected == Some(year.as_str()) { " selected" } else { "" };
        out.push_str(&format!(
            r#"<option value="{y}"{sel}>{y}</option>"#,
            y = html_escape(year)
        ));
    }
    out
}

fn filter_form(
    action: &str,
    view_list: &ListState,
    sort: Option<SortKey>,
    page: Option<u32>,
) -> String {
    let query = &view_list.query;
    let sort_select = sort
        .map(|current| {
            let options: String = SortKey::CATALOG
                .iter()
                .map(|k| {
                    format!(
                        r#"<option value="{}"{}>{}</option>"#,
                        k.as_str(),
                        if *k == current { " selected" } else { "" },
                        k.label()
                    )
                })
                .collect();
            format!(r#"<select id="sort-select" name="sort">{options}</select>"#)
        })
        .unwrap_or_default();
    let page_input = page
        .map(|p| format!(r#"<input type="hidden" name="page" value="{p}">"#))
        .unwrap_or_default();

    format!(
        r#"<form method="get" action="{action}" class="filters">
  <input id="search-input" type="search" name="q" placeholder="Buscar por título" value="{search}">
  <input id="min-rating" type="number" name="min_rating" min="0" max="10" step="0.1" value="{min_rating}">
  <select id="year-select" name="year">{years}</select>
  {sort_select}
  {page_input}
  <button type="submit">Filtrar</button>
  <button id="reset-filters" type="submit" name="reset" value="1">Restablecer</button>
</form>"#,
        search = html_escape(&query.search),
        min_rating = html_escape(if query.min_rating.is_empty() {
            "0"
        } else {
            query.min_rating.as_str()
        }),
        years = year_options(&view_list.years, query.year()),
    )
}

pub fn catalog_page(
    view: &CatalogView,
    favorites: &[MovieId],
    return_to: &str,
    notice: Option<Notice>,
) -> String {
    let list = &view.list;
    let kpis = view.kpis();
    let mut rows = String::new();
    if list.filtered.is_empty() && list.error.is_none() {
        rows.push_str(
            r#"<tr><td colspan="8" class="empty-row">No se han encontrado resultados.</td></tr>"#,
        );
    }
    for (index, movie) in list.filtered.iter().enumerate() {
        rows.push_str(&format!(
            r#"<tr class="clickable-row" data-id="{id}">
  <td>{pos}</td>
  <td>{poster}</td>
  <td>{title}</td>
  <td>{rating}</td>
  <td>{votes}</td>
  <td>{popularity}</td>
  <td>{date}</td>
  <td>{fav}</td>
</tr>"#,
            id = html_escape(movie.id.as_str()),
            pos = linked(movie, &(index + 1).to_string()),
            poster = linked(movie, &poster_cell(movie)),
            title = linked(movie, &title_text(movie)),
            rating = linked(movie, &listing::fmt_rating(movie.vote_average)),
            votes = linked(movie, &listing::fmt_count(movie.vote_count)),
            popularity = linked(movie, &listing::fmt_popularity(movie.popularity)),
            date = linked(movie, &html_escape(&listing::fmt_date(movie.release_date.as_deref()))),
            fav = favorite_button(&movie.id, favorites.contains(&movie.id), return_to),
        ));
    }

    let body = format!(
        r#"<h1>Películas populares</h1>
{filters}
<section class="kpis">
  <div>Películas: <span id="kpi-count">{count}</span></div>
  <div>Valoración media: <span id="kpi-rating">{rating}</span></div>
  <div>Popularidad media: <span id="kpi-popularity">{popularity}</span></div>
</section>
{status}
<table class="data-table">
  <thead><tr><th>#</th><th></th><th>Título</th><th>Valoración</th><th>Votos</th><th>Popularidad</th><th>Estreno</th><th></th></tr></thead>
  <tbody id="movies-tbody">
{rows}
  </tbody>
</table>"#,
        filters = filter_form("/", list, Some(view.sort_key()), Some(view.page())),
        count = kpis.count,
        rating = kpis.rating_text(),
        popularity = kpis.popularity_text(),
        status = loading_and_error("", list.loading, list.error),
    );
    layout("Populares", &body, notice)
}

pub fn favorites_page(view: &FavoritesView, return_to: &str, notice: Option<Notice>) -> String {
    let list = &view.list;
    let mut rows = String::new();
    for movie in &list.filtered {
        rows.push_str(&format!(
            r#"<tr class="clickable-row" data-id="{id}">
  <td>{poster}</td>
  <td>{title}</td>
  <td>{rating}</td>
  <td>{votes}</td>
  <td>{date}</td>
  <td>{fav}</td>
</tr>"#,
            id = html_escape(movie.id.as_str()),
            poster = linked(movie, &poster_cell(movie)),
            title = linked(movie, &title_text(movie)),
            rating = linked(movie, &listing::fmt_rating(movie.vote_average)),
            votes = linked(movie, &listing::fmt_count(movie.vote_count)),
            date = linked(movie, &html_escape(&listing::fmt_date(movie.release_date.as_deref()))),
            fav = favorite_button(&movie.id, true, return_to),
        ));
    }

    let body = format!(
        r#"<h1>Mis favoritos</h1>
{filters}
{status}
<div id="fav-empty" class="{empty_class}">No tienes favoritos que coincidan.</div>
<table class="data-table">
  <thead><tr><th></th><th>Título</th><th>Valoración</th><th>Votos</th><th>Estreno</th><th></th></tr></thead>
  <tbody id="fav-tbody">
{rows}
  </tbody>
</table>"#,
        filters = filter_form("/favorites", list, None, None),
        status = loading_and_error("fav-", list.loading, list.error),
        empty_class = if view.is_empty() { "empty" } else { "empty hidden" },
    );
    layout("Favoritos", &body, notice)
}

fn similar_header(view: &DetailView, id: &MovieId, column: SimilarColumn) -> String {
    let next = view.sort.clicked(column);
    let href = format!(
        "{}&sort={}&dir={}",
        movie_href(id),
        column.as_str(),
        if next.ascending { "asc" } else { "desc" }
    );
    let class = match view.sort.indicator(column) {
        Some(true) => r#" class="sorted-asc""#,
        Some(false) => r#" class="sorted-desc""#,
        None => "",
    };
    format!(
        r#"<th data-sort="{key}"{class}><a href="{href}">{label}</a></th>"#,
        key = column.as_str(),
        href = html_escape(&href),
        label = column.label(),
    )
}

fn detail_section(movie: &Movie, is_favorite: bool, return_to: &str) -> String {
    let poster = poster_url(movie.poster_path.as_deref(), POSTER_LARGE);
    let poster = if poster.is_empty() {
        String::new()
    } else {
        format!(
            r#"<img src="{}" alt="Póster de {}" class="poster-large">"#,
            html_escape(&poster),
            html_escape(movie.title_or_empty())
        )
    };

    let mut sub = Vec::new();
    if let Some(year) = movie.year() {
        sub.push(format!("<span>{}</span>", html_escape(year)));
    }
    if let Some(runtime) = movie.runtime.filter(|r| *r > 0) {
        sub.push(format!("{runtime} min"));
    }
    if let Some(lang) = movie.original_language.as_deref().filter(|l| !l.is_empty()) {
        sub.push(format!("Idioma: {}", html_escape(&lang.to_uppercase())));
    }

    let genres = movie
        .genres
        .iter()
        .map(|g| format!(r#"<span class="badge">{}</span>"#, html_escape(&g.name)))
        .collect::<Vec<_>>()
        .join(" ");
    let overview = movie
        .overview
        .as_deref()
        .filter(|o| !o.trim().is_empty())
        .unwrap_or("Sin sinopsis disponible.");

    format!(
        r#"<div>{poster}</div>
<div class="detail-meta">
  <h2 class="detail-title">{title}</h2>
  <div class="detail-sub">{sub}</div>
  <div class="detail-kpis">
    <span class="detail-kpi">⭐ {rating} / 10</span>
    <span class="detail-kpi">Votos: {votes}</span>
    <span class="detail-kpi">Popularidad: {popularity}</span>
  </div>
  <div>{genres}</div>
  <p class="detail-overview">{overview}</p>
  <form method="post" action="/favorites/toggle">
    <input type="hidden" name="id" value="{id}">
    <input type="hidden" name="return_to" value="{return_to}">
    <button id="fav-detail-btn" class="favorite-btn" type="submit" data-id="{id}">
      <span class="favorite-icon">{icon}</span>
      <span>{label}</span>
    </button>
  </form>
</div>"#,
        title = html_escape(movie.title_or_empty()),
        sub = sub.join(" • "),
        rating = listing::fmt_rating(movie.vote_average),
        votes = listing::fmt_count(movie.vote_count),
        popularity = listing::fmt_popularity(movie.popularity),
        overview = html_escape(overview),
        id = html_escape(movie.id.as_str()),
        return_to = html_escape(return_to),
        icon = if is_favorite { "★" } else { "☆" },
        label = if is_favorite {
            "Quitar de favoritos"
        } else {
            "Añadir a favoritos"
        },
    )
}

pub fn detail_page(
    view: &DetailView,
    back_href: &str,
    return_to: &str,
    notice: Option<Notice>,
) -> String {
    let back = format!(
        r#"<a id="back-button" href="{}">← Volver</a>"#,
        html_escape(back_href)
    );

    let Some(id) = view.id.as_ref() else {
        let body = format!(
            r#"{back}
<section id="movie-detail"><p class="error">{}</p></section>"#,
            html_escape(view.error.unwrap_or_default())
        );
        return layout("Detalle", &body, notice);
    };

    let detail = match (&view.movie, view.error) {
        (Some(movie), _) => detail_section(movie, view.is_favorite, return_to),
        (None, Some(message)) => format!(r#"<p class="error">{}</p>"#, html_escape(message)),
        (None, None) => String::new(),
    };

    let mut rows = String::new();
    if view.similar.is_empty() && view.similar_error.is_none() && !view.similar_loading {
        rows.push_str(
            r#"<tr><td colspan="4" class="empty-row">No se encontraron películas similares.</td></tr>"#,
        );
    }
    for movie in &view.similar {
        rows.push_str(&format!(
            r#"<tr class="clickable-row">
  <td>{title}</td>
  <td>{rating}</td>
  <td>{popularity}</td>
  <td>{date}</td>
</tr>"#,
            title = linked(movie, &title_text(movie)),
            rating = linked(movie, &listing::fmt_rating(movie.vote_average)),
            popularity = linked(movie, &listing::fmt_popularity(movie.popularity)),
            date = linked(movie, &html_escape(&listing::fmt_date(movie.release_date.as_deref()))),
        ));
    }
    let headers: String = SimilarColumn::ALL
        .iter()
        .map(|c| similar_header(view, id, *c))
        .collect();

    let title = view
        .movie
        .as_ref()
        .and_then(|m| m.title.clone())
        .unwrap_or_else(|| "Detalle".to_string());
    let body = format!(
        r#"{back}
<section id="movie-detail" class="detail">
{detail}
</section>
<h3>Películas similares</h3>
{status}
<table class="data-table interactive">
  <thead><tr>{headers}</tr></thead>
  <tbody id="similar-tbody">
{rows}
  </tbody>
</table>"#,
        status = loading_and_error("similar-", view.similar_loading, view.similar_error),
    );
    layout(&title, &body, notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::SyncStatus;
    use crate::listing::SimilarSort;
    use crate::views::NoticeKind;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn detail_link_encodes_id() {
        assert_eq!(movie_href(&MovieId::from("a b/1")), "/movie?id=a%20b%2F1");
    }

    #[test]
    fn row_without_poster_has_no_image() {
        let mut movie = Movie::new(1i64);
        movie.title = Some("Her".to_string());
        assert_eq!(poster_cell(&movie), "");
        movie.poster_path = Some("/her.jpg".to_string());
        assert!(poster_cell(&movie).contains("https://image.tmdb.org/t/p/w92/her.jpg"));
    }

    #[test]
    fn toast_dismisses_after_two_seconds() {
        let html = toast(Some(Notice {
            kind: NoticeKind::Removed,
            sync: SyncStatus::Persisted,
        }));
        assert!(html.contains("Eliminado de favoritos"));
        assert!(html.contains("2000"));
        assert!(toast(None).contains(r#"class="toast""#));
    }

    #[test]
    fn only_active_header_has_indicator() {
        let mut view = DetailView::new(Some(MovieId::from("7")));
        view.sort = SimilarSort::new(SimilarColumn::Title, true);
        let id = MovieId::from("7");
        let title = similar_header(&view, &id, SimilarColumn::Title);
        assert!(title.contains("sorted-asc"));
        assert!(title.contains("sort=title&amp;dir=desc"));

        let rating = similar_header(&view, &id, SimilarColumn::VoteAverage);
        assert!(!rating.contains("sorted-"));
        assert!(rating.contains("sort=vote_average&amp;dir=asc"));
    }

    #[test]
    fn favorite_button_reflects_membership() {
        let id = MovieId::from(5i64);
        assert!(favorite_button(&id, true, "/").contains("icon-btn fav active"));
        assert!(!favorite_button(&id, false, "/").contains("fav active"));
    }
}
