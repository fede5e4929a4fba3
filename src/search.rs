use tracing::debug;

use crate::app::{ActiveTab, AppState};
use crate::catalog::Library;

/// How the search box query is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Case-sensitive substring of the name.
    #[default]
    ByName,
    /// Exact identifier.
    ById,
}

impl SearchMode {
    pub fn toggled(self) -> Self {
        match self {
            SearchMode::ByName => SearchMode::ById,
            SearchMode::ById => SearchMode::ByName,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchMode::ByName => "name",
            SearchMode::ById => "id",
        }
    }
}

/// Book ids matching `query`. An empty query matches everything.
pub fn find_books(library: &Library, query: &str, mode: SearchMode) -> Vec<u32> {
    if query.is_empty() {
        return library.books().map(|b| b.identifier).collect();
    }
    match mode {
        SearchMode::ByName => library.fuzzy_find_books(query).iter().map(|b| b.identifier).collect(),
        SearchMode::ById => query
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|id| library.find_book(id))
            .map(|b| vec![b.identifier])
            .unwrap_or_default(),
    }
}

/// User ids matching `query`. An empty query matches everything.
pub fn find_users(library: &Library, query: &str, mode: SearchMode) -> Vec<u32> {
    if query.is_empty() {
        return library.users().map(|u| u.identifier).collect();
    }
    match mode {
        SearchMode::ByName => library.fuzzy_find_users(query).iter().map(|u| u.identifier).collect(),
        SearchMode::ById => query
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|id| library.find_user(id))
            .map(|u| vec![u.identifier])
            .unwrap_or_default(),
    }
}

/// Recompute both tables: the active tab is filtered by the query, the other
/// tab shows everything. Selections are clamped to the new lengths.
pub fn apply_search(app: &mut AppState) {
    let (book_query, user_query) = match app.active_tab {
        ActiveTab::Books => (app.search_query.as_str(), ""),
        ActiveTab::Users => ("", app.search_query.as_str()),
    };
    app.books = find_books(&app.library, book_query, app.search_mode);
    app.users = find_users(&app.library, user_query, app.search_mode);
    debug!(
        query = %app.search_query,
        mode = app.search_mode.label(),
        books = app.books.len(),
        users = app.users.len(),
        "search applied"
    );
    app.selected_book_index = app.selected_book_index.min(app.books.len().saturating_sub(1));
    app.selected_user_index = app.selected_user_index.min(app.users.len().saturating_sub(1));
}
