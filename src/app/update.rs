use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::keymap::KeyAction;
use crate::app::{ActiveTab, AppState, FormField, InputMode, ModalState, PathPurpose, PickPurpose};
use crate::catalog::{BookInfo, BookUpdate, BorrowOutcome, DataPaths, UserInfo, UserUpdate};
use crate::error::{CatalogError, RecordKind};
use crate::search::apply_search;
use crate::session::Session;
use crate::ui;

pub const BOOK_ACTIONS: [&str; 4] = ["Borrow", "Return", "Edit", "Delete"];
pub const USER_ACTIONS: [&str; 5] = ["Edit", "Borrow for user", "Return for user", "Change password", "Delete"];
pub const QUIT_OPTIONS: [&str; 3] = ["Save and quit", "Quit without saving", "Cancel"];

const PAGE_STEP: usize = 10;

pub fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut AppState) -> Result<()> {
    loop {
        terminal.draw(|f| {
            ui::render(f, app);
        })?;
        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }
    }
    info!(uptime_secs = app.started_at.elapsed().as_secs(), "leaving");
    Ok(())
}

/// Feed one key press through the current input mode.
pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    match app.input_mode {
        InputMode::Normal => handle_normal_key(app, key),
        InputMode::SearchBooks | InputMode::SearchUsers => match key.code {
            KeyCode::Enter => {
                apply_search(app);
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Esc => {
                app.search_query.clear();
                apply_search(app);
                app.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                app.search_query.pop();
            }
            KeyCode::Char(c) => app.search_query.push(c),
            _ => {}
        },
        InputMode::Modal => handle_modal_key(app, key),
    }
}

fn handle_normal_key(app: &mut AppState, key: KeyEvent) {
    let Some(action) = app.keymap.resolve(&key) else { return };
    let next = match action {
        KeyAction::Quit => request_quit(app),
        KeyAction::OpenHelp => Some(ModalState::Help { scroll: 0 }),
        KeyAction::StartSearch => {
            app.search_query.clear();
            app.input_mode = match app.active_tab {
                ActiveTab::Books => InputMode::SearchBooks,
                ActiveTab::Users => InputMode::SearchUsers,
            };
            None
        }
        KeyAction::ToggleSearchMode => {
            app.search_mode = app.search_mode.toggled();
            apply_search(app);
            app.set_status(format!("Searching by {}", app.search_mode.label()));
            None
        }
        KeyAction::SwitchTab => {
            app.active_tab = match app.active_tab {
                ActiveTab::Books => ActiveTab::Users,
                ActiveTab::Users => ActiveTab::Books,
            };
            apply_search(app);
            None
        }
        KeyAction::EnterAction => {
            let has_selection = match app.active_tab {
                ActiveTab::Books => app.selected_book_id().is_some(),
                ActiveTab::Users => app.selected_user_id().is_some(),
            };
            has_selection.then_some(ModalState::Actions { selected: 0 })
        }
        KeyAction::NewRecord => match app.active_tab {
            ActiveTab::Books => open_book_form(app, None),
            ActiveTab::Users => open_user_form(app, None),
        },
        KeyAction::DeleteSelection => match app.active_tab {
            ActiveTab::Books => app.selected_book_id().and_then(|id| start_delete(app, RecordKind::Book, id)),
            ActiveTab::Users => app.selected_user_id().and_then(|id| start_delete(app, RecordKind::User, id)),
        },
        KeyAction::Borrow => selected_book_for_self(app).and_then(|id| borrow_for_self(app, id)),
        KeyAction::Return => selected_book_for_self(app).and_then(|id| return_for_self(app, id)),
        KeyAction::Save => save(app),
        KeyAction::Reload => match app.library.paths().cloned() {
            Some(paths) => confirm_load(app, paths, "Reload", "Reloaded"),
            None => Some(ModalState::Info { message: "No data files configured.".to_string() }),
        },
        KeyAction::Import => path_input(app, PathPurpose::Import),
        KeyAction::Export => path_input(app, PathPurpose::Export),
        KeyAction::AboutMe => about_me(app),
        KeyAction::SignOut => {
            info!("signed out");
            app.session = Session::signed_out();
            Some(ModalState::login())
        }
        KeyAction::MoveUp => {
            move_selection(app, -1);
            None
        }
        KeyAction::MoveDown => {
            move_selection(app, 1);
            None
        }
        KeyAction::PageUp => {
            let rpp = app.rows_per_page.max(1) as isize;
            move_selection(app, -rpp);
            None
        }
        KeyAction::PageDown => {
            let rpp = app.rows_per_page.max(1) as isize;
            move_selection(app, rpp);
            None
        }
        KeyAction::Ignore => None,
    };
    if let Some(modal) = next {
        app.open_modal(modal);
    }
}

fn move_selection(app: &mut AppState, delta: isize) {
    let (index, len) = match app.active_tab {
        ActiveTab::Books => (&mut app.selected_book_index, app.books.len()),
        ActiveTab::Users => (&mut app.selected_user_index, app.users.len()),
    };
    *index = index.saturating_add_signed(delta).min(len.saturating_sub(1));
}

fn selected_book_for_self(app: &AppState) -> Option<u32> {
    match app.active_tab {
        ActiveTab::Books => app.selected_book_id(),
        ActiveTab::Users => None,
    }
}

fn handle_modal_key(app: &mut AppState, key: KeyEvent) {
    let Some(modal) = app.modal.take() else {
        app.input_mode = InputMode::Normal;
        return;
    };
    let code = key.code;
    let next = match modal {
        ModalState::Login { mut selected, mut name, mut password, error } => match code {
            KeyCode::Esc => request_quit(app),
            KeyCode::Enter => match Session::login(&app.library, &name, &password) {
                Ok(session) => {
                    app.session = session;
                    apply_search(app);
                    app.set_status(format!("Logged in as {}", app.session.describe(&app.library)));
                    None
                }
                Err(e) => Some(ModalState::Login { selected: 1, name, password: String::new(), error: Some(e.to_string()) }),
            },
            _ => {
                if !cycle(&mut selected, 2, code) {
                    edit_text(if selected == 0 { &mut name } else { &mut password }, code);
                }
                Some(ModalState::Login { selected, name, password, error })
            }
        },
        ModalState::Actions { mut selected } => {
            let total = match app.active_tab {
                ActiveTab::Books => BOOK_ACTIONS.len(),
                ActiveTab::Users => USER_ACTIONS.len(),
            };
            match code {
                KeyCode::Esc => None,
                KeyCode::Up | KeyCode::Char('k') => {
                    selected = selected.saturating_sub(1);
                    Some(ModalState::Actions { selected })
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if selected + 1 < total {
                        selected += 1;
                    }
                    Some(ModalState::Actions { selected })
                }
                KeyCode::Enter => run_action(app, selected),
                _ => Some(ModalState::Actions { selected }),
            }
        }
        ModalState::BookForm { target, mut selected, mut name, mut identifier, mut quantity, error } => {
            let fields = FormField::book_fields();
            match code {
                KeyCode::Esc => None,
                KeyCode::Enter => match submit_book_form(app, target, &name, &identifier, &quantity) {
                    Ok(()) => None,
                    Err(e) => Some(ModalState::BookForm { target, selected, name, identifier, quantity, error: Some(e) }),
                },
                _ => {
                    if !cycle(&mut selected, fields.len(), code) {
                        match fields[selected] {
                            FormField::Name => edit_text(&mut name, code),
                            FormField::Identifier => edit_digits(&mut identifier, code),
                            FormField::Quantity => edit_digits(&mut quantity, code),
                            _ => {}
                        }
                    }
                    Some(ModalState::BookForm { target, selected, name, identifier, quantity, error })
                }
            }
        }
        ModalState::UserForm { target, mut selected, mut name, mut identifier, mut password, mut is_admin, error } => {
            let fields = FormField::user_fields(target.is_none());
            match code {
                KeyCode::Esc => None,
                KeyCode::Enter => match submit_user_form(app, target, &name, &identifier, &password, is_admin) {
                    Ok(()) => None,
                    Err(e) => Some(ModalState::UserForm { target, selected, name, identifier, password, is_admin, error: Some(e) }),
                },
                _ => {
                    if !cycle(&mut selected, fields.len(), code) {
                        match fields[selected] {
                            FormField::Name => edit_text(&mut name, code),
                            FormField::Identifier => edit_digits(&mut identifier, code),
                            FormField::Password => edit_text(&mut password, code),
                            FormField::Admin if code == KeyCode::Char(' ') => is_admin = !is_admin,
                            _ => {}
                        }
                    }
                    Some(ModalState::UserForm { target, selected, name, identifier, password, is_admin, error })
                }
            }
        }
        ModalState::ChangePassword { target, mut selected, mut old, mut new, mut confirm, error } => match code {
            KeyCode::Esc => None,
            KeyCode::Enter => {
                let result = if new != confirm {
                    Err("Passwords do not match.".to_string())
                } else {
                    app.session
                        .change_password(&mut app.library, target, &old, &new)
                        .map_err(|e| e.to_string())
                };
                match result {
                    Ok(()) => {
                        app.dirty = true;
                        app.set_status("Password changed");
                        None
                    }
                    Err(e) => Some(ModalState::ChangePassword { target, selected, old, new, confirm, error: Some(e) }),
                }
            }
            _ => {
                if !cycle(&mut selected, 3, code) {
                    match selected {
                        0 => edit_text(&mut old, code),
                        1 => edit_text(&mut new, code),
                        _ => edit_text(&mut confirm, code),
                    }
                }
                Some(ModalState::ChangePassword { target, selected, old, new, confirm, error })
            }
        },
        ModalState::PickBook { user_id, purpose, mut selected } => {
            let choices = pick_list(app, user_id, purpose);
            let total = choices.len();
            match code {
                KeyCode::Esc => None,
                KeyCode::Up | KeyCode::Char('k') => {
                    selected = selected.saturating_sub(1);
                    Some(ModalState::PickBook { user_id, purpose, selected })
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if selected + 1 < total {
                        selected += 1;
                    }
                    Some(ModalState::PickBook { user_id, purpose, selected })
                }
                KeyCode::PageUp => {
                    selected = selected.saturating_sub(PAGE_STEP);
                    Some(ModalState::PickBook { user_id, purpose, selected })
                }
                KeyCode::PageDown => {
                    selected = (selected + PAGE_STEP).min(total.saturating_sub(1));
                    Some(ModalState::PickBook { user_id, purpose, selected })
                }
                KeyCode::Enter => match choices.get(selected) {
                    Some(&book_id) => match purpose {
                        PickPurpose::Borrow => borrow_for(app, user_id, book_id),
                        PickPurpose::Return => return_for(app, user_id, book_id),
                    },
                    None => None,
                },
                _ => Some(ModalState::PickBook { user_id, purpose, selected }),
            }
        }
        ModalState::DeleteConfirm { kind, id, selected } => match code {
            KeyCode::Esc => None,
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => Some(ModalState::DeleteConfirm { kind, id, selected: 1 - selected.min(1) }),
            KeyCode::Enter if selected == 0 => delete_record(app, kind, id, false),
            KeyCode::Enter => None,
            _ => Some(ModalState::DeleteConfirm { kind, id, selected }),
        },
        ModalState::ForceDeleteConfirm { kind, id, count, selected } => match code {
            KeyCode::Esc => None,
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                Some(ModalState::ForceDeleteConfirm { kind, id, count, selected: 1 - selected.min(1) })
            }
            KeyCode::Enter if selected == 0 => delete_record(app, kind, id, true),
            KeyCode::Enter => None,
            _ => Some(ModalState::ForceDeleteConfirm { kind, id, count, selected }),
        },
        ModalState::PathInput { purpose, mut selected, mut users, mut books, error } => match code {
            KeyCode::Esc => None,
            KeyCode::Enter => {
                if users.trim().is_empty() || books.trim().is_empty() {
                    Some(ModalState::PathInput {
                        purpose,
                        selected,
                        users,
                        books,
                        error: Some("File paths cannot be empty.".to_string()),
                    })
                } else {
                    let paths = DataPaths::new(users.trim(), books.trim());
                    match purpose {
                        PathPurpose::Import => confirm_load(app, paths, "Import", "Imported"),
                        PathPurpose::Export => match app.library.save(&paths) {
                            Ok(()) => {
                                app.set_status(format!("Exported to {}, {}", paths.books.display(), paths.users.display()));
                                None
                            }
                            Err(e) => Some(ModalState::PathInput { purpose, selected, users, books, error: Some(e.to_string()) }),
                        },
                    }
                }
            }
            _ => {
                if !cycle(&mut selected, 2, code) {
                    edit_text(if selected == 0 { &mut books } else { &mut users }, code);
                }
                Some(ModalState::PathInput { purpose, selected, users, books, error })
            }
        },
        ModalState::ReloadConfirm { paths, verb, done, selected } => match code {
            KeyCode::Esc => None,
            KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                Some(ModalState::ReloadConfirm { paths, verb, done, selected: 1 - selected.min(1) })
            }
            KeyCode::Enter if selected == 0 => load_from(app, &paths, done),
            KeyCode::Enter => None,
            _ => Some(ModalState::ReloadConfirm { paths, verb, done, selected }),
        },
        ModalState::QuitConfirm { mut selected } => match code {
            KeyCode::Esc => back_to_login(app),
            KeyCode::Up | KeyCode::Left | KeyCode::Char('k') => {
                selected = selected.saturating_sub(1);
                Some(ModalState::QuitConfirm { selected })
            }
            KeyCode::Down | KeyCode::Right | KeyCode::Char('j') => {
                selected = (selected + 1).min(QUIT_OPTIONS.len() - 1);
                Some(ModalState::QuitConfirm { selected })
            }
            KeyCode::Enter => match selected {
                0 => match app.library.save_to_loaded_paths() {
                    Ok(()) => {
                        app.dirty = false;
                        app.should_quit = true;
                        None
                    }
                    Err(e) => Some(ModalState::Info { message: format!("Failed to write files: {}", e) }),
                },
                1 => {
                    app.should_quit = true;
                    None
                }
                _ => back_to_login(app),
            },
            _ => Some(ModalState::QuitConfirm { selected }),
        },
        ModalState::Info { message } => match code {
            KeyCode::Esc | KeyCode::Enter => back_to_login(app),
            _ => Some(ModalState::Info { message }),
        },
        ModalState::Help { scroll } => match code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') => None,
            KeyCode::Up | KeyCode::Char('k') => Some(ModalState::Help { scroll: scroll.saturating_sub(1) }),
            KeyCode::Down | KeyCode::Char('j') => Some(ModalState::Help { scroll: scroll.saturating_add(1) }),
            _ => Some(ModalState::Help { scroll }),
        },
    };
    match next {
        Some(modal) => app.open_modal(modal),
        None => app.close_modal(),
    }
}

/// Move focus between form rows. Returns whether `code` was a navigation key.
fn cycle(selected: &mut usize, len: usize, code: KeyCode) -> bool {
    match code {
        KeyCode::Tab | KeyCode::Down => {
            *selected = (*selected + 1) % len;
            true
        }
        KeyCode::BackTab | KeyCode::Up => {
            *selected = (*selected + len - 1) % len;
            true
        }
        _ => false,
    }
}

fn edit_text(buf: &mut String, code: KeyCode) {
    match code {
        KeyCode::Backspace => {
            buf.pop();
        }
        KeyCode::Char(c) => buf.push(c),
        _ => {}
    }
}

fn edit_digits(buf: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) if !c.is_ascii_digit() => {}
        other => edit_text(buf, other),
    }
}

fn request_quit(app: &mut AppState) -> Option<ModalState> {
    if app.dirty {
        Some(ModalState::QuitConfirm { selected: 0 })
    } else {
        app.should_quit = true;
        None
    }
}

/// Dialogs dismissed while signed out fall back to the login prompt.
fn back_to_login(app: &AppState) -> Option<ModalState> {
    app.session.is_signed_out().then(ModalState::login)
}

fn run_action(app: &mut AppState, selected: usize) -> Option<ModalState> {
    match app.active_tab {
        ActiveTab::Books => {
            let id = app.selected_book_id()?;
            match selected {
                0 => borrow_for_self(app, id),
                1 => return_for_self(app, id),
                2 => open_book_form(app, Some(id)),
                _ => start_delete(app, RecordKind::Book, id),
            }
        }
        ActiveTab::Users => {
            let id = app.selected_user_id()?;
            match selected {
                0 => open_user_form(app, Some(id)),
                1 | 2 => {
                    if let Err(e) = app.session.check_acting_for(id) {
                        return Some(ModalState::Info { message: e.to_string() });
                    }
                    let purpose = if selected == 1 { PickPurpose::Borrow } else { PickPurpose::Return };
                    if pick_list(app, id, purpose).is_empty() {
                        let message = match purpose {
                            PickPurpose::Borrow => "The catalog has no books.",
                            PickPurpose::Return => "This user holds no books.",
                        };
                        return Some(ModalState::Info { message: message.to_string() });
                    }
                    Some(ModalState::PickBook { user_id: id, purpose, selected: 0 })
                }
                3 => {
                    if !app.session.can_edit_user(id) {
                        return Some(ModalState::Info { message: "You can only change your own password.".to_string() });
                    }
                    // Admins skip the old password row
                    let selected = if app.session.is_admin { 1 } else { 0 };
                    Some(ModalState::ChangePassword {
                        target: id,
                        selected,
                        old: String::new(),
                        new: String::new(),
                        confirm: String::new(),
                        error: None,
                    })
                }
                _ => start_delete(app, RecordKind::User, id),
            }
        }
    }
}

/// Books offered by the picker: everything for borrowing, the user's loans for returning.
pub fn pick_list(app: &AppState, user_id: u32, purpose: PickPurpose) -> Vec<u32> {
    match purpose {
        PickPurpose::Borrow => app.library.books().map(|b| b.identifier).collect(),
        PickPurpose::Return => app
            .library
            .books_held_by(user_id)
            .iter()
            .map(|b| b.identifier)
            .collect(),
    }
}

fn book_title(app: &AppState, id: u32) -> String {
    app.library
        .find_book(id)
        .map(|b| b.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn borrow_for_self(app: &mut AppState, book_id: u32) -> Option<ModalState> {
    match app.session.borrower() {
        Ok(user_id) => borrow_for(app, user_id, book_id),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn return_for_self(app: &mut AppState, book_id: u32) -> Option<ModalState> {
    match app.session.borrower() {
        Ok(user_id) => return_for(app, user_id, book_id),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn borrow_for(app: &mut AppState, user_id: u32, book_id: u32) -> Option<ModalState> {
    if let Err(e) = app.session.check_acting_for(user_id) {
        return Some(ModalState::Info { message: e.to_string() });
    }
    match app.library.borrow(user_id, book_id) {
        Ok(BorrowOutcome::Borrowed) => {
            app.dirty = true;
            apply_search(app);
            app.set_status(format!("Borrowed \u{ab}{}\u{bb}", book_title(app, book_id)));
            None
        }
        Ok(BorrowOutcome::AlreadyHeld) => {
            app.set_status(format!("\u{ab}{}\u{bb} is already borrowed", book_title(app, book_id)));
            None
        }
        Err(CatalogError::Unavailable { .. }) => Some(ModalState::Info { message: "No copies of this book are left.".to_string() }),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn return_for(app: &mut AppState, user_id: u32, book_id: u32) -> Option<ModalState> {
    if let Err(e) = app.session.check_acting_for(user_id) {
        return Some(ModalState::Info { message: e.to_string() });
    }
    match app.library.return_book(user_id, book_id) {
        Ok(()) => {
            app.dirty = true;
            apply_search(app);
            app.set_status(format!("Returned \u{ab}{}\u{bb}", book_title(app, book_id)));
            None
        }
        Err(CatalogError::NotBorrowed { .. }) => Some(ModalState::Info { message: "This book was not borrowed.".to_string() }),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn open_book_form(app: &mut AppState, target: Option<u32>) -> Option<ModalState> {
    let action = if target.is_some() { "edit books" } else { "add books" };
    if let Err(e) = app.session.require_admin(action) {
        return Some(ModalState::Info { message: e.to_string() });
    }
    let book = target.and_then(|id| app.library.find_book(id));
    Some(ModalState::BookForm {
        target,
        selected: 0,
        name: book.map(|b| b.name.clone()).unwrap_or_default(),
        identifier: book.map(|b| b.identifier.to_string()).unwrap_or_default(),
        quantity: book.map(|b| b.quantity.to_string()).unwrap_or_else(|| "1".to_string()),
        error: None,
    })
}

fn open_user_form(app: &mut AppState, target: Option<u32>) -> Option<ModalState> {
    match target {
        None => {
            if let Err(e) = app.session.require_admin("add users") {
                return Some(ModalState::Info { message: e.to_string() });
            }
        }
        Some(id) if !app.session.can_edit_user(id) => {
            return Some(ModalState::Info { message: "You can only edit your own account.".to_string() });
        }
        Some(_) => {}
    }
    let user = target.and_then(|id| app.library.find_user(id));
    Some(ModalState::UserForm {
        target,
        selected: 0,
        name: user.map(|u| u.name.clone()).unwrap_or_default(),
        identifier: user.map(|u| u.identifier.to_string()).unwrap_or_default(),
        password: String::new(),
        is_admin: user.map(|u| u.is_admin).unwrap_or(false),
        error: None,
    })
}

fn parse_id(s: &str, what: &str) -> std::result::Result<u32, String> {
    s.trim()
        .parse::<u32>()
        .map_err(|_| format!("{} must be a non-negative integer.", what))
}

fn submit_book_form(
    app: &mut AppState,
    target: Option<u32>,
    name: &str,
    identifier: &str,
    quantity: &str,
) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty.".to_string());
    }
    let identifier = parse_id(identifier, "Id")?;
    let quantity = parse_id(quantity, "Quantity")?;
    match target {
        None => {
            app.library
                .add_book(BookInfo::new(name.trim(), identifier, quantity))
                .map_err(|e| e.to_string())?;
            app.set_status(format!("Added \u{ab}{}\u{bb}", name.trim()));
        }
        Some(id) => {
            let update = BookUpdate { name: name.trim().to_string(), identifier, quantity };
            app.library.update_book(id, update).map_err(|e| e.to_string())?;
            app.set_status(format!("Saved \u{ab}{}\u{bb}", name.trim()));
        }
    }
    app.dirty = true;
    apply_search(app);
    Ok(())
}

fn submit_user_form(
    app: &mut AppState,
    target: Option<u32>,
    name: &str,
    identifier: &str,
    password: &str,
    is_admin: bool,
) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name cannot be empty.".to_string());
    }
    let identifier = parse_id(identifier, "Id")?;
    match target {
        None => {
            app.session.require_admin("add users").map_err(|e| e.to_string())?;
            app.library
                .add_user(UserInfo::new(name.trim(), identifier, password, is_admin))
                .map_err(|e| e.to_string())?;
            app.set_status(format!("Added user {}", name.trim()));
        }
        Some(id) => {
            let update = UserUpdate { name: name.trim().to_string(), identifier, is_admin };
            app.session
                .check_user_update(&app.library, id, &update)
                .map_err(|e| e.to_string())?;
            app.library.update_user(id, update.clone()).map_err(|e| e.to_string())?;
            app.session.track_user_update(id, &update);
            app.set_status(format!("Saved user {}", name.trim()));
        }
    }
    app.dirty = true;
    apply_search(app);
    Ok(())
}

fn start_delete(app: &mut AppState, kind: RecordKind, id: u32) -> Option<ModalState> {
    match app.session.check_delete(kind, id) {
        Ok(()) => Some(ModalState::DeleteConfirm { kind, id, selected: 1 }),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn delete_record(app: &mut AppState, kind: RecordKind, id: u32, force: bool) -> Option<ModalState> {
    let result = match kind {
        RecordKind::Book => app.library.delete_book(id, force).map(|b| b.name),
        RecordKind::User => app.library.delete_user(id, force).map(|u| u.name),
    };
    match result {
        Ok(name) => {
            app.dirty = true;
            apply_search(app);
            app.set_status(format!("Deleted {} {}", kind, name));
            None
        }
        Err(CatalogError::HasDependents { count, .. }) => Some(ModalState::ForceDeleteConfirm { kind, id, count, selected: 1 }),
        Err(e) => Some(ModalState::Info { message: e.to_string() }),
    }
}

fn save(app: &mut AppState) -> Option<ModalState> {
    match app.library.save_to_loaded_paths() {
        Ok(()) => {
            app.dirty = false;
            if let Some(paths) = app.library.paths() {
                let msg = format!("Saved {}, {}", paths.books.display(), paths.users.display());
                app.set_status(msg);
            }
            None
        }
        Err(e) => Some(ModalState::Info { message: format!("Failed to write files: {}", e) }),
    }
}

/// Replace the catalog from `paths`; a session whose user vanished is signed out.
fn load_from(app: &mut AppState, paths: &DataPaths, verb: &str) -> Option<ModalState> {
    if let Err(e) = app.library.load(paths) {
        return Some(ModalState::Info { message: format!("Failed to read files: {}", e) });
    }
    app.dirty = false;
    apply_search(app);
    app.set_status(format!("{} {}, {}", verb, paths.books.display(), paths.users.display()));
    match app.session.user_id {
        Some(id) => match app.library.find_user(id) {
            Some(user) => {
                app.session = Session::for_user(user);
                None
            }
            None => {
                debug!(user = id, "logged-in user missing after load");
                app.session = Session::signed_out();
                Some(ModalState::login())
            }
        },
        None => None,
    }
}

/// Loads straight away when nothing is pending, otherwise asks before dropping edits.
fn confirm_load(app: &mut AppState, paths: DataPaths, verb: &'static str, done: &'static str) -> Option<ModalState> {
    if app.dirty {
        return Some(ModalState::ReloadConfirm { paths, verb, done, selected: 1 });
    }
    load_from(app, &paths, done)
}

fn path_input(app: &AppState, purpose: PathPurpose) -> Option<ModalState> {
    let action = match purpose {
        PathPurpose::Import => "import data",
        PathPurpose::Export => "export data",
    };
    if let Err(e) = app.session.require_admin(action) {
        return Some(ModalState::Info { message: e.to_string() });
    }
    let (users, books) = app
        .library
        .paths()
        .map(|p| (p.users.display().to_string(), p.books.display().to_string()))
        .unwrap_or_default();
    Some(ModalState::PathInput { purpose, selected: 0, users, books, error: None })
}

fn about_me(app: &mut AppState) -> Option<ModalState> {
    let Some(id) = app.session.user_id else {
        return Some(ModalState::Info { message: "Please log in first.".to_string() });
    };
    app.active_tab = ActiveTab::Users;
    app.search_query.clear();
    apply_search(app);
    if let Some(index) = app.users.iter().position(|u| *u == id) {
        app.selected_user_index = index;
    }
    None
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::{keymap::Keymap, Theme};
	use crate::catalog::Library;
	use crossterm::event::KeyModifiers;

	fn press(app: &mut AppState, code: KeyCode) {
		handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
	}

	fn type_str(app: &mut AppState, s: &str) {
		for c in s.chars() {
			press(app, KeyCode::Char(c));
		}
	}

	fn mk_app() -> AppState {
		let mut lib = Library::new();
		lib.add_book(BookInfo::new("Dune", 1, 1)).unwrap();
		lib.add_user(UserInfo::new("admin", 0, "root", true)).unwrap();
		lib.add_user(UserInfo::new("reader", 1, "pw", false)).unwrap();
		let mut app = AppState::new(lib, Session::signed_out(), Theme::dark(), Keymap::default());
		app.open_modal(ModalState::login());
		app
	}

	fn login(app: &mut AppState, name: &str, password: &str) {
		type_str(app, name);
		press(app, KeyCode::Tab);
		type_str(app, password);
		press(app, KeyCode::Enter);
	}

	#[test]
	fn login_then_borrow_and_return_selected_book() {
		let mut app = mk_app();
		login(&mut app, "reader", "pw");
		assert!(app.modal.is_none());
		assert_eq!(app.session.user_id, Some(1));

		press(&mut app, KeyCode::Char('b'));
		assert!(app.library.find_book(1).unwrap().readers.contains(&1));
		assert!(app.dirty);

		press(&mut app, KeyCode::Char('r'));
		assert!(app.library.find_book(1).unwrap().readers.is_empty());
	}

	#[test]
	fn wrong_password_keeps_login_open() {
		let mut app = mk_app();
		login(&mut app, "reader", "nope");
		match &app.modal {
			Some(ModalState::Login { error: Some(_), password, .. }) => assert!(password.is_empty()),
			other => panic!("unexpected modal: {other:?}"),
		}
		assert!(app.session.user_id.is_none());
	}

	#[test]
	fn non_admin_cannot_add_books() {
		let mut app = mk_app();
		login(&mut app, "reader", "pw");
		press(&mut app, KeyCode::Char('n'));
		assert!(matches!(app.modal, Some(ModalState::Info { .. })));
		assert_eq!(app.library.book_count(), 1);
	}

	#[test]
	fn admin_adds_book_through_form() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		press(&mut app, KeyCode::Char('n'));
		type_str(&mut app, "Emma");
		press(&mut app, KeyCode::Tab);
		type_str(&mut app, "7x");
		press(&mut app, KeyCode::Enter);

		assert!(app.modal.is_none());
		let book = app.library.find_book(7).unwrap();
		assert_eq!(book.name, "Emma");
		assert_eq!(book.quantity, 1);
		assert_eq!(app.books, vec![1, 7]);
	}

	#[test]
	fn duplicate_id_in_form_shows_error() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		press(&mut app, KeyCode::Char('n'));
		type_str(&mut app, "Other");
		press(&mut app, KeyCode::Tab);
		type_str(&mut app, "1");
		press(&mut app, KeyCode::Enter);
		assert!(matches!(app.modal, Some(ModalState::BookForm { error: Some(_), .. })));
		assert_eq!(app.library.book_count(), 1);
	}

	#[test]
	fn delete_with_loans_asks_to_force() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		app.library.borrow(1, 1).unwrap();

		press(&mut app, KeyCode::Delete);
		press(&mut app, KeyCode::Left);
		press(&mut app, KeyCode::Enter);
		assert!(matches!(app.modal, Some(ModalState::ForceDeleteConfirm { count: 1, .. })));

		press(&mut app, KeyCode::Left);
		press(&mut app, KeyCode::Enter);
		assert!(app.modal.is_none());
		assert_eq!(app.library.book_count(), 0);
		assert!(app.library.find_user(1).unwrap().books.is_empty());
	}

	#[test]
	fn quit_with_changes_asks_first() {
		let mut app = mk_app();
		login(&mut app, "reader", "pw");
		press(&mut app, KeyCode::Char('b'));
		press(&mut app, KeyCode::Char('q'));
		assert!(matches!(app.modal, Some(ModalState::QuitConfirm { .. })));
		assert!(!app.should_quit);

		press(&mut app, KeyCode::Down);
		press(&mut app, KeyCode::Enter);
		assert!(app.should_quit);
	}

	#[test]
	fn reload_with_changes_asks_first() {
		let mut app = mk_app();
		app.library.set_paths(DataPaths::new("lm_missing_users.csv", "lm_missing_books.csv"));
		login(&mut app, "reader", "pw");
		press(&mut app, KeyCode::Char('b'));
		assert!(app.dirty);

		press(&mut app, KeyCode::Char('R'));
		assert!(matches!(app.modal, Some(ModalState::ReloadConfirm { verb: "Reload", selected: 1, .. })));
		assert!(app.library.find_book(1).unwrap().readers.contains(&1));

		// "No" is preselected
		press(&mut app, KeyCode::Enter);
		assert!(app.modal.is_none());
		assert!(app.dirty);
		assert!(app.library.find_user(1).unwrap().books.contains(&1));
	}

	#[test]
	fn import_with_changes_asks_first() {
		let mut app = mk_app();
		app.library.set_paths(DataPaths::new("lm_missing_users.csv", "lm_missing_books.csv"));
		login(&mut app, "admin", "root");
		app.library.borrow(1, 1).unwrap();
		app.dirty = true;

		press(&mut app, KeyCode::Char('o'));
		assert!(matches!(app.modal, Some(ModalState::PathInput { purpose: PathPurpose::Import, .. })));
		press(&mut app, KeyCode::Enter);
		assert!(matches!(app.modal, Some(ModalState::ReloadConfirm { verb: "Import", .. })));

		press(&mut app, KeyCode::Esc);
		assert!(app.modal.is_none());
		assert!(app.library.find_book(1).unwrap().readers.contains(&1));
	}

	#[test]
	fn reload_without_changes_loads_directly() {
		let mut app = mk_app();
		app.library.set_paths(DataPaths::new("lm_missing_users.csv", "lm_missing_books.csv"));
		login(&mut app, "reader", "pw");
		press(&mut app, KeyCode::Char('R'));
		// The files do not exist, so the load fails and reports it
		assert!(matches!(app.modal, Some(ModalState::Info { .. })));
		assert_eq!(app.library.book_count(), 1);
	}

	#[test]
	fn non_admin_cannot_export() {
		let mut app = mk_app();
		login(&mut app, "reader", "pw");
		press(&mut app, KeyCode::Char('e'));
		match &app.modal {
			Some(ModalState::Info { message }) => assert!(message.contains("export")),
			other => panic!("unexpected modal: {other:?}"),
		}
		press(&mut app, KeyCode::Esc);
		press(&mut app, KeyCode::Char('o'));
		assert!(matches!(app.modal, Some(ModalState::Info { .. })));
	}

	#[test]
	fn admin_can_open_export_prompt() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		press(&mut app, KeyCode::Char('e'));
		assert!(matches!(app.modal, Some(ModalState::PathInput { purpose: PathPurpose::Export, .. })));
	}

	#[test]
	fn book_picker_selection_stays_in_range() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		app.library.add_book(BookInfo::new("Emma", 2, 1)).unwrap();
		app.library.add_book(BookInfo::new("Ulysses", 3, 1)).unwrap();
		app.open_modal(ModalState::PickBook { user_id: 1, purpose: PickPurpose::Borrow, selected: 0 });

		press(&mut app, KeyCode::PageDown);
		press(&mut app, KeyCode::Down);
		assert!(matches!(app.modal, Some(ModalState::PickBook { selected: 2, .. })));
		press(&mut app, KeyCode::Enter);
		assert!(app.library.find_user(1).unwrap().books.contains(&3));
	}

	#[test]
	fn search_prompt_filters_books() {
		let mut app = mk_app();
		login(&mut app, "admin", "root");
		app.library.add_book(BookInfo::new("Dune Messiah", 2, 1)).unwrap();
		app.library.add_book(BookInfo::new("Emma", 3, 1)).unwrap();
		press(&mut app, KeyCode::Char('/'));
		type_str(&mut app, "Dune");
		press(&mut app, KeyCode::Enter);
		assert_eq!(app.books, vec![1, 2]);

		press(&mut app, KeyCode::Char('/'));
		press(&mut app, KeyCode::Esc);
		assert_eq!(app.books, vec![1, 2, 3]);
	}
}
