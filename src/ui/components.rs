//! Shared UI components (status bar, modal helpers).
//!
//! Contains small building blocks reused by the books and users screens,
//! plus the dialogs that belong to neither.
//!
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::app::keymap::KeyAction;
use crate::app::update::QUIT_OPTIONS;
use crate::app::{AppState, InputMode, ModalState, PathPurpose, Theme};
use crate::error::RecordKind;
use std::collections::BTreeMap;

/// Render the bottom status bar with mode, counts and the latest message.
pub fn render_status_bar(f: &mut Frame, area: Rect, app: &AppState) {
    let mode = match app.input_mode {
        InputMode::Normal => "NORMAL",
        InputMode::SearchBooks => "SEARCH(books)",
        InputMode::SearchUsers => "SEARCH(users)",
        InputMode::Modal => "MODAL",
    };
    let dirty = if app.dirty { "  [modified]" } else { "" };
    let msg = match app.status_message() {
        Some(m) => format!("  {}", m),
        None => String::new(),
    };
    let line = format!(
        "mode: {mode}  books:{}  users:{}  search by {}{dirty}{msg}",
        app.library.book_count(),
        app.library.user_count(),
        app.search_mode.label(),
    );
    let p = Paragraph::new(line).style(Style::default().fg(app.theme.status_fg).bg(app.theme.status_bg));
    f.render_widget(p, area);
}

/// Compute a rectangle centered within `area` with a maximum size.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

pub fn modal_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
}

/// One option per line, the selected one marked with `▶`.
pub fn menu_text(options: &[&str], selected: usize) -> String {
    let mut text = String::new();
    for (idx, label) in options.iter().enumerate() {
        if idx == selected {
            text.push_str(&format!("▶ {}\n", label));
        } else {
            text.push_str(&format!("  {}\n", label));
        }
    }
    text
}

/// A `label: value` form row, highlighted when focused.
pub fn field_line(label: &str, value: &str, focused: bool, theme: &Theme) -> Line<'static> {
    let marker = if focused { "▶ " } else { "  " };
    let value_style = if focused {
        Style::default().fg(theme.highlight_fg).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    let label = if label.is_empty() { String::new() } else { format!("{}: ", label) };
    Line::from(vec![
        Span::raw(format!("{}{}", marker, label)),
        Span::styled(value.to_string(), value_style),
    ])
}

/// Render a generic informational modal dialog.
pub fn render_info_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    if let ModalState::Info { message } = state {
        let max_w = area.width.saturating_sub(6).max(30);
        let min_w = 48u16.min(max_w);
        let approx_lines = (message.len() as u16 / (min_w.saturating_sub(4).max(10))).max(1);
        let max_h = area.height.saturating_sub(6).max(5);
        let height = (approx_lines + 4).min(max_h).max(5);
        let rect = centered_rect(min_w, height, area);
        let p = Paragraph::new(message.clone())
            .wrap(Wrap { trim: false })
            .block(modal_block("Info", &app.theme));
        f.render_widget(Clear, rect);
        f.render_widget(p, rect);
    }
}

pub fn render_login_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    if let ModalState::Login { selected, name, password, error } = state {
        let width = 48u16.min(area.width.saturating_sub(4)).max(36);
        let masked = "*".repeat(password.chars().count());
        let mut lines = vec![
            field_line("User", name, *selected == 0, &app.theme),
            field_line("Password", &masked, *selected == 1, &app.theme),
            Line::raw(""),
            Line::styled("Enter: log in   Esc: quit", Style::default().fg(app.theme.muted)),
        ];
        if let Some(err) = error {
            lines.push(Line::styled(err.clone(), Style::default().fg(app.theme.error)));
        }
        let rect = centered_rect(width, lines.len() as u16 + 2, area);
        let p = Paragraph::new(lines).block(modal_block("Log in", &app.theme));
        f.render_widget(Clear, rect);
        f.render_widget(p, rect);
    }
}

fn yes_no(selected: usize) -> String {
    let yes = if selected == 0 { "[Yes]" } else { " Yes " };
    let no = if selected == 1 { "[No]" } else { " No  " };
    format!("  {}    {}", yes, no)
}

/// Delete, forced delete, reload and quit confirmations.
pub fn render_confirm_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    let describe = |kind: RecordKind, id: u32| -> String {
        let name = match kind {
            RecordKind::Book => app.library.find_book(id).map(|b| b.name.clone()),
            RecordKind::User => app.library.find_user(id).map(|u| u.name.clone()),
        };
        format!("{} '{}' ({})", kind, name.unwrap_or_default(), id)
    };
    let (title, body) = match state {
        ModalState::DeleteConfirm { kind, id, selected } => {
            ("Confirm delete", format!("Delete {} ?\n\n{}", describe(*kind, *id), yes_no(*selected)))
        }
        ModalState::ForceDeleteConfirm { kind, id, count, selected } => {
            let detail = match kind {
                RecordKind::Book => format!("{} reader(s) still hold this book.", count),
                RecordKind::User => format!("This user still holds {} book(s).", count),
            };
            (
                "Outstanding loans",
                format!(
                    "{}\n{}\nDelete anyway and drop those loans?\n\n{}",
                    describe(*kind, *id),
                    detail,
                    yes_no(*selected)
                ),
            )
        }
        ModalState::ReloadConfirm { paths, verb, selected, .. } => (
            "Unsaved changes",
            format!(
                "{} from {}, {}?\nUnsaved changes will be lost.\n\n{}",
                verb,
                paths.books.display(),
                paths.users.display(),
                yes_no(*selected)
            ),
        ),
        ModalState::QuitConfirm { selected } => (
            "Unsaved changes",
            format!("The catalog has unsaved changes.\n\n{}", menu_text(&QUIT_OPTIONS, *selected)),
        ),
        _ => return,
    };
    let width = 56u16.min(area.width.saturating_sub(4)).max(40);
    let height = body.lines().count() as u16 + 3;
    let rect = centered_rect(width, height, area);
    let p = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(modal_block(title, &app.theme));
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

/// Import/export path prompt.
pub fn render_path_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    if let ModalState::PathInput { purpose, selected, users, books, error } = state {
        let title = match purpose {
            PathPurpose::Import => "Import from files",
            PathPurpose::Export => "Export to files",
        };
        let mut lines = vec![
            field_line("Books file", books, *selected == 0, &app.theme),
            field_line("Users file", users, *selected == 1, &app.theme),
        ];
        if *purpose == PathPurpose::Import {
            lines.push(Line::styled(
                "Importing replaces the current catalog.",
                Style::default().fg(app.theme.muted),
            ));
        }
        if let Some(err) = error {
            lines.push(Line::raw(""));
            lines.push(Line::styled(err.clone(), Style::default().fg(app.theme.error)));
        }
        let width = 72u16.min(area.width.saturating_sub(4)).max(40);
        let rect = centered_rect(width, lines.len() as u16 + 2, area);
        let p = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(modal_block(title, &app.theme));
        f.render_widget(Clear, rect);
        f.render_widget(p, rect);
    }
}

/// Help modal listing the configured bindings, grouped like the keymap file.
pub fn render_help_modal(f: &mut Frame, area: Rect, app: &AppState, scroll: u16) {
    let width = 72u16.min(area.width.saturating_sub(4)).max(50);
    let height = 26u16.min(area.height.saturating_sub(4)).max(12);
    let rect = centered_rect(width, height, area);

    let sections: [(&str, &[(&str, KeyAction)]); 3] = [
        (
            "General",
            &[
                ("Quit", KeyAction::Quit),
                ("Help", KeyAction::OpenHelp),
                ("Switch tab", KeyAction::SwitchTab),
                ("Search", KeyAction::StartSearch),
                ("Search by name / id", KeyAction::ToggleSearchMode),
                ("Save", KeyAction::Save),
                ("Reload from disk", KeyAction::Reload),
                ("Import", KeyAction::Import),
                ("Export", KeyAction::Export),
                ("About me", KeyAction::AboutMe),
                ("Sign out", KeyAction::SignOut),
            ],
        ),
        (
            "Records",
            &[
                ("Actions menu", KeyAction::EnterAction),
                ("New book / user", KeyAction::NewRecord),
                ("Delete", KeyAction::DeleteSelection),
                ("Borrow selected book", KeyAction::Borrow),
                ("Return selected book", KeyAction::Return),
            ],
        ),
        (
            "Navigation",
            &[
                ("Move up", KeyAction::MoveUp),
                ("Move down", KeyAction::MoveDown),
                ("Page up", KeyAction::PageUp),
                ("Page down", KeyAction::PageDown),
            ],
        ),
    ];

    let mut lines: Vec<Line> = Vec::new();
    for (heading, entries) in sections {
        let rows: BTreeMap<&str, String> = entries
            .iter()
            .filter_map(|(label, action)| app.keymap.key_for(*action).map(|k| (*label, k)))
            .collect();
        if rows.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(
            format!("{}:", heading),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (label, key) in rows {
            lines.push(Line::from(vec![
                Span::raw(format!("  {:>22} │ ", label)),
                Span::styled(key, Style::default().add_modifier(Modifier::ITALIC)),
            ]));
        }
        lines.push(Line::raw(""));
    }
    lines.push(Line::from(vec![
        Span::raw("In dialogs: "),
        Span::styled("Tab/Up/Down", Style::default().add_modifier(Modifier::ITALIC)),
        Span::raw(" move, "),
        Span::styled("Space", Style::default().add_modifier(Modifier::ITALIC)),
        Span::raw(" toggles, "),
        Span::styled("Enter", Style::default().add_modifier(Modifier::ITALIC)),
        Span::raw(" confirms, "),
        Span::styled("Esc", Style::default().add_modifier(Modifier::ITALIC)),
        Span::raw(" cancels"),
    ]));

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(modal_block("Help", &app.theme));
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}
