//! Books screen rendering and modals.
//!
//! Contains the books table, details panel, readers list, and the book
//! form, actions menu and picker dialogs.
//!
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Wrap};

use crate::app::update::{BOOK_ACTIONS, pick_list};
use crate::app::{AppState, FormField, ModalState, PickPurpose};
use crate::ui::components::{centered_rect, field_line, menu_text, modal_block};

/// Render the books table and manage selection/pagination state.
pub fn render_books_table(f: &mut Frame, area: Rect, app: &mut AppState) {
    let body_height = area.height.saturating_sub(3) as usize;
    if body_height > 0 {
        app.rows_per_page = body_height;
    }

    let start = (app.selected_book_index / app.rows_per_page) * app.rows_per_page;
    let end = (start + app.rows_per_page).min(app.books.len());
    let slice = &app.books[start..end];

    let rows = slice.iter().enumerate().filter_map(|(i, id)| {
        let book = app.library.find_book(*id)?;
        let absolute_index = start + i;
        let style = if absolute_index == app.selected_book_index {
            Style::default().fg(app.theme.highlight_fg).add_modifier(Modifier::BOLD)
        } else if !book.is_available() {
            Style::default().fg(app.theme.muted)
        } else {
            Style::default().fg(app.theme.text)
        };
        Some(
            Row::new(vec![
                Cell::from(book.identifier.to_string()),
                Cell::from(book.name.clone()),
                Cell::from(book.quantity.to_string()),
                Cell::from(book.remaining().to_string()),
            ])
            .style(style),
        )
    });

    let widths = [
        Constraint::Length(8),
        Constraint::Percentage(100),
        Constraint::Length(6),
        Constraint::Length(6),
    ];
    let header = Row::new(vec!["ID", "TITLE", "TOTAL", "LEFT"])
        .style(Style::default().fg(app.theme.title).add_modifier(Modifier::BOLD));

    let title = format!("Books ({})", app.books.len());
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
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

/// Render the selected book's summary details.
pub fn render_book_details(f: &mut Frame, area: Rect, app: &AppState) {
    let text = match app.selected_book_id().and_then(|id| app.library.find_book(id)) {
        Some(b) => format!(
            "Title: {}\nID: {}\nQuantity: {}\nRemaining: {}\nBorrowed: {}",
            b.name,
            b.identifier,
            b.quantity,
            b.remaining(),
            b.readers.len()
        ),
        None => "No book selected".to_string(),
    };
    let p = Paragraph::new(text)
        .style(Style::default().fg(app.theme.text))
        .block(
            Block::default()
                .title("Book Details")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        );
    f.render_widget(p, area);
}

/// Render the users currently holding the selected book.
pub fn render_book_readers(f: &mut Frame, area: Rect, app: &AppState) {
    let readers = app
        .selected_book_id()
        .map(|id| app.library.readers_of(id))
        .unwrap_or_default();
    let visible = area.height.saturating_sub(3) as usize;

    let rows = readers.iter().take(visible).map(|u| {
        Row::new(vec![Cell::from(u.identifier.to_string()), Cell::from(u.name.clone())])
            .style(Style::default().fg(app.theme.text))
    });
    let widths = [Constraint::Length(8), Constraint::Percentage(100)];
    let header = Row::new(vec!["ID", "Reader"])
        .style(Style::default().fg(app.theme.title).add_modifier(Modifier::BOLD));

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title("Borrowed by")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(app.theme.border)),
        )
        .column_spacing(1);
    f.render_widget(table, area);
}

pub fn render_book_actions(f: &mut Frame, area: Rect, app: &AppState, selected: usize) {
    let rect = centered_rect(30, BOOK_ACTIONS.len() as u16 + 2, area);
    let p = Paragraph::new(menu_text(&BOOK_ACTIONS, selected)).block(modal_block("Book actions", &app.theme));
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

/// Add/edit book form.
pub fn render_book_form(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    if let ModalState::BookForm { target, selected, name, identifier, quantity, error } = state {
        let width = 56u16.min(area.width.saturating_sub(4)).max(40);
        let height = if error.is_some() { 10 } else { 8 };
        let rect = centered_rect(width, height, area);
        let fields = FormField::book_fields();
        let focused = fields.get(*selected).copied();
        let mut lines = vec![
            field_line("Title", name, focused == Some(FormField::Name), &app.theme),
            field_line("ID", identifier, focused == Some(FormField::Identifier), &app.theme),
            field_line("Quantity", quantity, focused == Some(FormField::Quantity), &app.theme),
            field_line("", "[ Save ]", focused == Some(FormField::Submit), &app.theme),
        ];
        if let Some(err) = error {
            lines.push(ratatui::text::Line::raw(""));
            lines.push(ratatui::text::Line::styled(err.clone(), Style::default().fg(app.theme.error)));
        }
        let title = if target.is_some() { "Edit book" } else { "New book" };
        let p = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(modal_block(title, &app.theme));
        f.render_widget(Clear, rect);
        f.render_widget(p, rect);
    }
}

/// Scrollable book picker used to borrow or return on behalf of a user.
pub fn render_pick_book(f: &mut Frame, area: Rect, app: &AppState, state: &ModalState) {
    if let ModalState::PickBook { user_id, purpose, selected } = state {
        let choices = pick_list(app, *user_id, *purpose);
        let width = (area.width.saturating_sub(10)).clamp(40, 64);
        let height = (area.height.saturating_sub(6)).clamp(8, 20);
        let rect = centered_rect(width, height, area);
        let visible_capacity = rect.height.saturating_sub(2) as usize;
        let total = choices.len();
        let max_offset = total.saturating_sub(visible_capacity);
        let off = selected.saturating_sub(visible_capacity / 2).min(max_offset);
        let start = off.min(total);
        let end = (start + visible_capacity).min(total);

        let items: Vec<ListItem> = choices[start..end]
            .iter()
            .enumerate()
            .filter_map(|(i, id)| {
                let book = app.library.find_book(*id)?;
                let focus = if start + i == *selected { "▶ " } else { "  " };
                let line = format!("{}{} ({})  {}/{}", focus, book.name, book.identifier, book.remaining(), book.quantity);
                let style = if start + i == *selected {
                    Style::default().fg(app.theme.highlight_fg).add_modifier(Modifier::BOLD)
                } else if *purpose == PickPurpose::Borrow && !book.is_available() {
                    Style::default().fg(app.theme.muted)
                } else {
                    Style::default()
                };
                Some(ListItem::new(line).style(style))
            })
            .collect();

        let who = app
            .library
            .find_user(*user_id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| user_id.to_string());
        let title = match purpose {
            PickPurpose::Borrow => format!("Borrow for {}", who),
            PickPurpose::Return => format!("Return for {}", who),
        };
        let list = List::new(items).block(modal_block(&title, &app.theme));
        f.render_widget(Clear, rect);
        f.render_widget(list, rect);
    }
}
