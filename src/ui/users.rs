use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};

use crate::app::update::USER_ACTIONS;
use crate::app::{AppState, FormField, ModalState};
use crate::ui::components::{centered_rect, field_line, menu_text, modal_block};

pub fn render_users_table(f: &mut Frame, area: Rect, app: &mut AppState) {
    let body_height = area.height.saturating_sub(3) as usize;
    if body_height > 0 {
        app.rows_per_page = body_height;
    }

    let start = (app.selected_user_index / app.rows_per_page) * app.rows_per_page;
    let end = (start + app.rows_per_page).min(app.users.len());
    let slice = &app.users[start..end];

    let rows = slice.iter().enumerate().filter_map(|(i, id)| {
        let user = app.library.find_user(*id)?;
        let absolute_index = start + i;
        let style = if absolute_index == app.selected_user_index {
            Style::default().fg(app.theme.highlight_fg).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(app.theme.text)
        };
        let marker = if app.session.user_id == Some(user.identifier) { "*" } else { "" };
        Some(
            Row::new(vec![
                Cell::from(user.identifier.to_string()),
                Cell::from(format!("{}{}", user.name, marker)),
                Cell::from(if user.is_admin { "yes" } else { "" }),
                Cell::from(user.books.len().to_string()),
            ])
            .style(style),
        )
    });

    let widths = [Constraint::Length(8), Constraint::Percentage(100), Constraint::Length(6), Constraint::Length(6)];
    let header = Row::new(vec!["ID", "USER", "ADMIN", "LOANS"])
        .style(Style::default().fg(app.theme.title).add_modifier(Modifier::BOLD));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(format!("Users ({})", app.users.len()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .row_highlight_style(
            Style::default()
                .fg(app.theme.highlight_fg)
                .bg(app.theme.highlight_bg)
                .add_modifier(Modifier::REVERSED),
        )
        .column_spacing(1);

    f.render_widget(table, area);
}

pub fn render_user_details(f: &mut Frame, area: Rect, app: &AppState) {
    let text = match app.selected_user_id().and_then(|id| app.library.find_user(id)) {
        Some(u) => format!(
            "Name: {}\nID: {}\nAdministrator: {}\nBooks held: {}",
            u.name,
            u.identifier,
            if u.is_admin { "yes" } else { "no" },
            u.books.len()
        ),
        None => "No user selected".to_string(),
    };
    let p = Paragraph::new(text).style(Style::default().fg(app.theme.text)).block(
        Block::default()
            .title("Details")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(app.theme.border)),
    );
    f.render_widget(p, area);
}

/// Books held by the selected user, in borrow order.
pub fn render_user_books(f: &mut Frame, area: Rect, app: &AppState) {
    let held = app
        .selected_user_id()
        .map(|id| app.library.books_held_by(id))
        .unwrap_or_default();
    let visible = area.height.saturating_sub(3) as usize;

    let rows = held.iter().take(visible).map(|b| {
        Row::new(vec![Cell::from(b.identifier.to_string()), Cell::from(b.name.clone())])
            .style(Style::default().fg(app.theme.text))
    });
    let widths = [Constraint::Length(8), Constraint::Percentage(100)];
    let header = Row::new(vec!["ID", "Title"]).style(Style::default().fg(app.theme.title).add_modifier(Modifier::BOLD));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title("Borrowed books")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .column_spacing(1);
    f.render_widget(table, area);
}

pub fn render_user_actions(f: &mut Frame, area: Rect, app: &AppState, selected: usize) {
    let rect = centered_rect(30, USER_ACTIONS.len() as u16 + 2, area);
    let p = Paragraph::new(menu_text(&USER_ACTIONS, selected)).block(modal_block("User actions", &app.theme));
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

pub fn render_user_modal(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    match state {
        ModalState::UserForm { target, selected, name, identifier, password, is_admin, error } => {
            let fields = FormField::user_fields(target.is_none());
            let focused = fields.get(*selected).copied();
            // Non-admins editing themselves cannot touch these two
            let locked = if app.session.is_admin { "" } else { " (admin only)" };
            let mut lines = vec![
                field_line("Name", name, focused == Some(FormField::Name), &app.theme),
                field_line(&format!("ID{}", locked), identifier, focused == Some(FormField::Identifier), &app.theme),
            ];
            if target.is_none() {
                let masked = "*".repeat(password.chars().count());
                lines.push(field_line("Password", &masked, focused == Some(FormField::Password), &app.theme));
            }
            let checkbox = if *is_admin { "[x]" } else { "[ ]" };
            lines.push(field_line(&format!("Admin{}", locked), checkbox, focused == Some(FormField::Admin), &app.theme));
            lines.push(field_line("", "[ Save ]", focused == Some(FormField::Submit), &app.theme));
            if let Some(err) = error {
                lines.push(Line::raw(""));
                lines.push(Line::styled(err.clone(), Style::default().fg(app.theme.error)));
            }
            let width = 60u16.min(area.width.saturating_sub(4)).max(40);
            let height = lines.len() as u16 + 2;
            let rect = centered_rect(width, height, area);
            let title = if target.is_some() { "Edit user" } else { "New user" };
            let p = Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(modal_block(title, &app.theme));
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        ModalState::ChangePassword { target, selected, old, new, confirm, error } => {
            let mask = |s: &str| "*".repeat(s.chars().count());
            let old_value = if app.session.is_admin { "(not required)".to_string() } else { mask(old) };
            let mut lines = vec![
                field_line("Old password", &old_value, *selected == 0, &app.theme),
                field_line("New password", &mask(new), *selected == 1, &app.theme),
                field_line("Confirm", &mask(confirm), *selected == 2, &app.theme),
            ];
            if let Some(err) = error {
                lines.push(Line::raw(""));
                lines.push(Line::styled(err.clone(), Style::default().fg(app.theme.error)));
            }
            let who = app
                .library
                .find_user(*target)
                .map(|u| u.name.clone())
                .unwrap_or_default();
            let width = 56u16.min(area.width.saturating_sub(4)).max(40);
            let rect = centered_rect(width, lines.len() as u16 + 2, area);
            let title = format!("Password for {}", who);
            let p = Paragraph::new(lines)
                .wrap(Wrap { trim: false })
                .block(modal_block(&title, &app.theme));
            f.render_widget(Clear, rect);
            f.render_widget(p, rect);
        }
        _ => {}
    }
}
