//! Frame layout and modal routing.
//!
//! Header with tabs and search prompt, a table on the left, details and the
//! loan list on the right, and a one-line status bar.
//!
pub mod books;
pub mod components;
pub mod users;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::keymap::KeyAction;
use crate::app::{ActiveTab, AppState, InputMode, ModalState};

pub fn render(f: &mut Frame, app: &mut AppState) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5), Constraint::Length(1)].as_ref())
        .split(f.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(root[1]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(5)].as_ref())
        .split(body[1]);

    let who = app.session.describe(&app.library);
    let tabs = match app.active_tab {
        ActiveTab::Books => "[Books]  Users",
        ActiveTab::Users => "Books  [Users]",
    };
    let prompt = match app.input_mode {
        InputMode::SearchBooks => format!("  Search books by {}: {}", app.search_mode.label(), app.search_query),
        InputMode::SearchUsers => format!("  Search users by {}: {}", app.search_mode.label(), app.search_query),
        InputMode::Normal | InputMode::Modal => String::new(),
    };
    let help_key = app.keymap.key_for(KeyAction::OpenHelp).unwrap_or_else(|| "?".to_string());
    let p = Paragraph::new(format!("{who}  {tabs}{prompt}  ({help_key}: help)"))
        .block(
            Block::default()
                .title("library-manager")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .style(Style::default().fg(app.theme.header_fg).bg(app.theme.header_bg));
    f.render_widget(p, root[0]);

    // The login prompt hides the catalog
    if !app.session.is_signed_out() {
        match app.active_tab {
            ActiveTab::Books => {
                books::render_books_table(f, body[0], app);
                books::render_book_details(f, right[0], app);
                books::render_book_readers(f, right[1], app);
            }
            ActiveTab::Users => {
                users::render_users_table(f, body[0], app);
                users::render_user_details(f, right[0], app);
                users::render_user_books(f, right[1], app);
            }
        }
    }

    components::render_status_bar(f, root[2], app);

    if app.modal.is_some() {
        render_modal(f, f.area(), app);
    }
}

fn render_modal(f: &mut Frame, area: Rect, app: &AppState) {
    let Some(state) = app.modal.as_ref() else { return };
    match state {
        ModalState::Actions { selected } => match app.active_tab {
            ActiveTab::Books => books::render_book_actions(f, area, app, *selected),
            ActiveTab::Users => users::render_user_actions(f, area, app, *selected),
        },
        ModalState::BookForm { .. } => books::render_book_form(f, area, app, state),
        ModalState::PickBook { .. } => books::render_pick_book(f, area, app, state),
        ModalState::UserForm { .. } | ModalState::ChangePassword { .. } => users::render_user_modal(f, area, app, state),
        ModalState::Login { .. } => components::render_login_modal(f, area, app, state),
        ModalState::DeleteConfirm { .. }
        | ModalState::ForceDeleteConfirm { .. }
        | ModalState::ReloadConfirm { .. }
        | ModalState::QuitConfirm { .. } => {
            components::render_confirm_modal(f, area, app, state)
        }
        ModalState::PathInput { .. } => components::render_path_modal(f, area, app, state),
        ModalState::Info { .. } => components::render_info_modal(f, area, app, state),
        ModalState::Help { scroll } => components::render_help_modal(f, area, app, *scroll),
    }
}
