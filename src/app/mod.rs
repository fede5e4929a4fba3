//! Application state types and entry glue.
//!
//! Defines enums and structs that model the TUI state, as well as helpers
//! to construct it and to run the application loop (re-exported as `run`).
//!
pub mod keymap;
pub mod update;

use ratatui::style::Color;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::catalog::{DataPaths, Library};
use crate::error::RecordKind;
use crate::search::SearchMode;
use crate::session::Session;

/// How long a status-bar message stays visible.
pub const STATUS_TTL: Duration = Duration::from_secs(3);

/// Top-level active tab in the UI.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActiveTab {
    Books,
    Users,
}

/// Current input mode for key handling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    SearchBooks,
    SearchUsers,
    Modal,
}

/// Color palette for theming the TUI.
#[derive(Clone, Copy, Debug)]
pub struct Theme {
    pub text: Color,
    pub muted: Color,
    pub title: Color,
    pub border: Color,
    pub header_bg: Color,
    pub header_fg: Color,
    pub status_bg: Color,
    pub status_fg: Color,
    pub highlight_fg: Color,
    pub highlight_bg: Color,
    pub error: Color,
}

const THEME_KEYS: [&str; 11] = [
    "text",
    "muted",
    "title",
    "border",
    "header_bg",
    "header_fg",
    "status_bg",
    "status_fg",
    "highlight_fg",
    "highlight_bg",
    "error",
];

impl Theme {
    /// Plain terminal colors.
    pub fn dark() -> Self {
        Self {
            text: Color::Gray,
            muted: Color::DarkGray,
            title: Color::Cyan,
            border: Color::Gray,
            header_bg: Color::Black,
            header_fg: Color::Cyan,
            status_bg: Color::DarkGray,
            status_fg: Color::Black,
            highlight_fg: Color::Yellow,
            highlight_bg: Color::Reset,
            error: Color::Red,
        }
    }

    /// Catppuccin Mocha theme defaults.
    pub fn mocha() -> Self {
        // Palette reference: https://github.com/catppuccin/catppuccin
        Self {
            text: Color::Rgb(0xcd, 0xd6, 0xf4),         // text
            muted: Color::Rgb(0x7f, 0x84, 0x9c),        // overlay1
            title: Color::Rgb(0xcb, 0xa6, 0xf7),        // mauve
            border: Color::Rgb(0x58, 0x5b, 0x70),       // surface2
            header_bg: Color::Rgb(0x31, 0x32, 0x44),    // surface0
            header_fg: Color::Rgb(0xb4, 0xbe, 0xfe),    // lavender
            status_bg: Color::Rgb(0x45, 0x47, 0x5a),    // surface1
            status_fg: Color::Rgb(0xcd, 0xd6, 0xf4),    // text
            highlight_fg: Color::Rgb(0xf9, 0xe2, 0xaf), // yellow
            highlight_bg: Color::Rgb(0x45, 0x47, 0x5a), // surface1
            error: Color::Rgb(0xf3, 0x8b, 0xa8),        // red
        }
    }

    fn slot(&mut self, key: &str) -> Option<&mut Color> {
        Some(match key {
            "text" => &mut self.text,
            "muted" => &mut self.muted,
            "title" => &mut self.title,
            "border" => &mut self.border,
            "header_bg" => &mut self.header_bg,
            "header_fg" => &mut self.header_fg,
            "status_bg" => &mut self.status_bg,
            "status_fg" => &mut self.status_fg,
            "highlight_fg" => &mut self.highlight_fg,
            "highlight_bg" => &mut self.highlight_bg,
            "error" => &mut self.error,
            _ => return None,
        })
    }

    /// Load theme from a simple key=value file. Unknown or missing keys fall back to `mocha`.
    pub fn from_file(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let mut theme = Self::mocha();

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            if let (Some(color), Some(slot)) = (Self::parse_color(val), theme.slot(key.trim())) {
                *slot = color;
            }
        }

        Some(theme)
    }

    /// Parse a color from hex ("#RRGGBB" or "RRGGBB") or "reset".
    fn parse_color(s: &str) -> Option<Color> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "reset" {
            return Some(Color::Reset);
        }
        let hex = lower.strip_prefix('#').unwrap_or(lower.as_str());
        if hex.len() != 6 {
            return None;
        }
        let channel = |i: usize| hex.get(i..i + 2).and_then(|h| u8::from_str_radix(h, 16).ok());
        Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    fn color_to_str(c: Color) -> String {
        match c {
            Color::Rgb(r, g, b) => format!("#{:02X}{:02X}{:02X}", r, g, b),
            Color::Reset => "reset".to_string(),
            // Named colors get a best-effort hex approximation
            Color::Black => "#000000".to_string(),
            Color::Red | Color::LightRed => "#FF0000".to_string(),
            Color::Green | Color::LightGreen => "#00FF00".to_string(),
            Color::Yellow | Color::LightYellow => "#FFFF00".to_string(),
            Color::Blue | Color::LightBlue => "#0000FF".to_string(),
            Color::Magenta | Color::LightMagenta => "#FF00FF".to_string(),
            Color::Cyan | Color::LightCyan => "#00FFFF".to_string(),
            Color::Gray => "#B3B3B3".to_string(),
            Color::DarkGray => "#4D4D4D".to_string(),
            Color::White => "#FFFFFF".to_string(),
            Color::Indexed(_) => "reset".to_string(),
        }
    }

    /// Persist the theme to a config file in key=value format.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# library-manager theme configuration\n");
        buf.push_str("# Colors: hex as #RRGGBB or RRGGBB, or 'reset'\n\n");
        let mut copy = *self;
        for key in THEME_KEYS {
            if let Some(color) = copy.slot(key) {
                let _ = writeln!(&mut buf, "{} = {}", key, Self::color_to_str(*color));
            }
        }
        std::fs::write(path, buf)
    }

    /// Load from `path`, or write the default theme there when missing.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::from_file(path).unwrap_or_else(Self::mocha);
        }
        let t = Self::mocha();
        let _ = t.write_file(path);
        t
    }
}

/// Book or user record form fields, in focus order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Name,
    Identifier,
    Quantity,
    Password,
    Admin,
    Submit,
}

/// What a book picker does with the chosen book.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickPurpose {
    Borrow,
    Return,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPurpose {
    Import,
    Export,
}

/// Modal dialog states.
#[derive(Clone, Debug)]
pub enum ModalState {
    Login {
        selected: usize,
        name: String,
        password: String,
        error: Option<String>,
    },
    Actions {
        selected: usize,
    },
    BookForm {
        /// `None` when creating a new book.
        target: Option<u32>,
        selected: usize,
        name: String,
        identifier: String,
        quantity: String,
        error: Option<String>,
    },
    UserForm {
        target: Option<u32>,
        selected: usize,
        name: String,
        identifier: String,
        /// Only asked for when creating a user.
        password: String,
        is_admin: bool,
        error: Option<String>,
    },
    ChangePassword {
        target: u32,
        selected: usize,
        old: String,
        new: String,
        confirm: String,
        error: Option<String>,
    },
    PickBook {
        user_id: u32,
        purpose: PickPurpose,
        selected: usize,
    },
    DeleteConfirm {
        kind: RecordKind,
        id: u32,
        selected: usize,
    },
    ForceDeleteConfirm {
        kind: RecordKind,
        id: u32,
        count: usize,
        selected: usize,
    },
    PathInput {
        purpose: PathPurpose,
        selected: usize,
        users: String,
        books: String,
        error: Option<String>,
    },
    /// Reload or import over unsaved changes.
    ReloadConfirm {
        paths: DataPaths,
        verb: &'static str,
        done: &'static str,
        selected: usize,
    },
    QuitConfirm {
        selected: usize,
    },
    Info {
        message: String,
    },
    Help {
        scroll: u16,
    },
}

impl ModalState {
    pub fn login() -> Self {
        ModalState::Login {
            selected: 0,
            name: String::new(),
            password: String::new(),
            error: None,
        }
    }
}

impl FormField {
    pub fn book_fields() -> &'static [FormField] {
        &[FormField::Name, FormField::Identifier, FormField::Quantity, FormField::Submit]
    }

    /// Password is only part of the form when the user is new.
    pub fn user_fields(creating: bool) -> &'static [FormField] {
        if creating {
            &[FormField::Name, FormField::Identifier, FormField::Password, FormField::Admin, FormField::Submit]
        } else {
            &[FormField::Name, FormField::Identifier, FormField::Admin, FormField::Submit]
        }
    }
}

pub struct AppState {
    pub started_at: Instant,
    pub library: Library,
    pub session: Session,
    /// Ids visible in the books table, in display order.
    pub books: Vec<u32>,
    /// Ids visible in the users table, in display order.
    pub users: Vec<u32>,
    pub active_tab: ActiveTab,
    pub selected_book_index: usize,
    pub selected_user_index: usize,
    pub rows_per_page: usize,
    pub input_mode: InputMode,
    pub search_query: String,
    pub search_mode: SearchMode,
    pub theme: Theme,
    pub keymap: keymap::Keymap,
    pub modal: Option<ModalState>,
    pub status: Option<(String, Instant)>,
    /// Unsaved changes since the last load or save.
    pub dirty: bool,
    pub should_quit: bool,
}

impl AppState {
    /// Build the state around an already loaded catalog.
    pub fn new(library: Library, session: Session, theme: Theme, keymap: keymap::Keymap) -> Self {
        let mut app = Self {
            started_at: Instant::now(),
            books: Vec::new(),
            users: Vec::new(),
            library,
            session,
            active_tab: ActiveTab::Books,
            selected_book_index: 0,
            selected_user_index: 0,
            rows_per_page: 10,
            input_mode: InputMode::Normal,
            search_query: String::new(),
            search_mode: SearchMode::ByName,
            theme,
            keymap,
            modal: None,
            status: None,
            dirty: false,
            should_quit: false,
        };
        crate::search::apply_search(&mut app);
        app
    }

    pub fn selected_book_id(&self) -> Option<u32> {
        self.books.get(self.selected_book_index).copied()
    }

    pub fn selected_user_id(&self) -> Option<u32> {
        self.users.get(self.selected_user_index).copied()
    }

    pub fn open_modal(&mut self, modal: ModalState) {
        self.modal = Some(modal);
        self.input_mode = InputMode::Modal;
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
        self.input_mode = InputMode::Normal;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    /// Status message, if still fresh.
    pub fn status_message(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TTL)
            .map(|(m, _)| m.as_str())
    }
}

/// Resolve a config file name inside `dir`.
pub fn config_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(name)
}

/// Re-export the application event loop entry function.
pub use update::run_app as run;
