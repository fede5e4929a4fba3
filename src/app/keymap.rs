//! Keybinding configuration: parse `keybinds.conf`, provide defaults, and map keys to actions.
//!
//! Only normal-mode keys go through the keymap; text entry inside modals and the
//! search prompt is handled directly.

use std::collections::HashMap;
use std::path::Path;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Semantic keyboard actions that can be bound to key combinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAction {
    Quit,
    OpenHelp,
    StartSearch,
    /// Switch the search box between name and identifier matching.
    ToggleSearchMode,
    SwitchTab,
    /// Open the actions menu for the selected record.
    EnterAction,
    NewRecord,
    DeleteSelection,
    /// Borrow the selected book for the logged-in user.
    Borrow,
    /// Return the selected book for the logged-in user.
    Return,
    Save,
    Reload,
    Import,
    Export,
    /// Open the logged-in user's own record.
    AboutMe,
    SignOut,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    Ignore,
}

const ACTION_NAMES: [(KeyAction, &str); 21] = [
    (KeyAction::Quit, "Quit"),
    (KeyAction::OpenHelp, "OpenHelp"),
    (KeyAction::StartSearch, "StartSearch"),
    (KeyAction::ToggleSearchMode, "ToggleSearchMode"),
    (KeyAction::SwitchTab, "SwitchTab"),
    (KeyAction::EnterAction, "EnterAction"),
    (KeyAction::NewRecord, "NewRecord"),
    (KeyAction::DeleteSelection, "DeleteSelection"),
    (KeyAction::Borrow, "Borrow"),
    (KeyAction::Return, "Return"),
    (KeyAction::Save, "Save"),
    (KeyAction::Reload, "Reload"),
    (KeyAction::Import, "Import"),
    (KeyAction::Export, "Export"),
    (KeyAction::AboutMe, "AboutMe"),
    (KeyAction::SignOut, "SignOut"),
    (KeyAction::MoveUp, "MoveUp"),
    (KeyAction::MoveDown, "MoveDown"),
    (KeyAction::PageUp, "PageUp"),
    (KeyAction::PageDown, "PageDown"),
    (KeyAction::Ignore, "Ignore"),
];

/// Mapping from `(KeyModifiers, KeyCode)` to [`KeyAction`].
#[derive(Clone, Debug)]
pub struct Keymap {
    bindings: HashMap<(KeyModifiers, KeyCode), KeyAction>,
}

impl Keymap {
    /// Default bindings: arrows and vim keys for navigation, single letters for actions.
    pub fn new_defaults() -> Self {
        use KeyCode::*;
        use KeyModifiers as M;
        let mut bindings = HashMap::new();
        bindings.insert((M::NONE, Char('q')), KeyAction::Quit);
        bindings.insert((M::NONE, Esc), KeyAction::Ignore);
        bindings.insert((M::NONE, Char('?')), KeyAction::OpenHelp);
        bindings.insert((M::NONE, Char('/')), KeyAction::StartSearch);
        bindings.insert((M::NONE, Char('i')), KeyAction::ToggleSearchMode);
        bindings.insert((M::NONE, Tab), KeyAction::SwitchTab);
        bindings.insert((M::NONE, BackTab), KeyAction::SwitchTab);
        bindings.insert((M::SHIFT, BackTab), KeyAction::SwitchTab);
        bindings.insert((M::NONE, Enter), KeyAction::EnterAction);
        bindings.insert((M::NONE, Char('n')), KeyAction::NewRecord);
        bindings.insert((M::NONE, Delete), KeyAction::DeleteSelection);
        bindings.insert((M::NONE, Char('b')), KeyAction::Borrow);
        bindings.insert((M::NONE, Char('r')), KeyAction::Return);
        bindings.insert((M::NONE, Char('w')), KeyAction::Save);
        bindings.insert((M::CONTROL, Char('s')), KeyAction::Save);
        // Shift+R arrives as 'R' with or without the SHIFT flag depending on the terminal
        bindings.insert((M::NONE, Char('R')), KeyAction::Reload);
        bindings.insert((M::SHIFT, Char('R')), KeyAction::Reload);
        bindings.insert((M::NONE, Char('o')), KeyAction::Import);
        bindings.insert((M::NONE, Char('e')), KeyAction::Export);
        bindings.insert((M::NONE, Char('m')), KeyAction::AboutMe);
        bindings.insert((M::NONE, Char('L')), KeyAction::SignOut);
        bindings.insert((M::SHIFT, Char('L')), KeyAction::SignOut);
        bindings.insert((M::NONE, Up), KeyAction::MoveUp);
        bindings.insert((M::NONE, Down), KeyAction::MoveDown);
        bindings.insert((M::NONE, Char('k')), KeyAction::MoveUp);
        bindings.insert((M::NONE, Char('j')), KeyAction::MoveDown);
        bindings.insert((M::NONE, PageUp), KeyAction::PageUp);
        bindings.insert((M::NONE, PageDown), KeyAction::PageDown);
        bindings.insert((M::NONE, Left), KeyAction::PageUp);
        bindings.insert((M::NONE, Right), KeyAction::PageDown);
        bindings.insert((M::NONE, Char('h')), KeyAction::PageUp);
        bindings.insert((M::NONE, Char('l')), KeyAction::PageDown);
        Self { bindings }
    }

    /// Load a keymap from `path`, or write the defaults there when missing.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::from_file(path).unwrap_or_default();
        }
        let km = Self::default();
        let _ = km.write_file(path);
        km
    }

    /// Read `<Action> = <KeySpec>` lines on top of the defaults.
    ///
    /// Returns `None` only when the file cannot be read; bad lines are skipped.
    pub fn from_file(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        let mut map = Self::default();
        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((lhs, rhs)) = line.split_once('=') else { continue };
            if let (Some(action), Some(key)) = (parse_action(lhs), parse_key(rhs)) {
                map.bindings.insert(key, action);
            }
        }
        Some(map)
    }

    /// Write every binding, sorted by action then key, as `<Action> = <KeySpec>`.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# library-manager keybindings\n");
        buf.push_str("# Format: <Action> = <KeySpec>\n");
        buf.push_str("# KeySpec examples: q, Ctrl+s, Enter, Esc, Tab, BackTab, Up, Down, PageUp, PageDown, Delete, /\n");
        let _ = writeln!(
            &mut buf,
            "# Actions: {}\n",
            ACTION_NAMES.iter().map(|(_, n)| *n).collect::<Vec<_>>().join(", ")
        );

        let mut lines: Vec<(String, String)> = self
            .bindings
            .iter()
            .filter(|((mods, _), _)| mods.is_empty() || *mods == KeyModifiers::CONTROL)
            .map(|((mods, code), action)| (format_action(*action).to_string(), Self::format_key(*mods, *code)))
            .collect();
        lines.sort();
        for (action, key) in lines {
            let _ = writeln!(&mut buf, "{} = {}", action, key);
        }
        std::fs::write(path, buf)
    }

    pub fn resolve(&self, key: &KeyEvent) -> Option<KeyAction> {
        self.bindings.get(&(key.modifiers, key.code)).copied()
    }

    /// First-listed key for `action`, for on-screen hints.
    pub fn key_for(&self, action: KeyAction) -> Option<String> {
        let mut keys: Vec<String> = self
            .bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|((mods, code), _)| Self::format_key(*mods, *code))
            .collect();
        keys.sort_by_key(|k| (k.len(), k.clone()));
        keys.into_iter().next()
    }

    /// Human-readable spec like "Ctrl+s" or "BackTab".
    pub fn format_key(mods: KeyModifiers, code: KeyCode) -> String {
        use KeyCode::*;
        let base = match code {
            Enter => "Enter".to_string(),
            Delete => "Delete".to_string(),
            Esc => "Esc".to_string(),
            Tab => "Tab".to_string(),
            BackTab => "BackTab".to_string(),
            Up => "Up".to_string(),
            Down => "Down".to_string(),
            Left => "Left".to_string(),
            Right => "Right".to_string(),
            PageUp => "PageUp".to_string(),
            PageDown => "PageDown".to_string(),
            Char(c) => c.to_string(),
            _ => format!("{:?}", code),
        };
        if mods.contains(KeyModifiers::CONTROL) {
            format!("Ctrl+{}", base)
        } else {
            base
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new_defaults()
    }
}

fn parse_key(spec: &str) -> Option<(KeyModifiers, KeyCode)> {
    use KeyCode::*;
    let s = spec.trim();
    let (mods, rest) = match s.strip_prefix("Ctrl+") {
        Some(after) => (KeyModifiers::CONTROL, after),
        None => (KeyModifiers::NONE, s),
    };
    let code = match rest {
        "Enter" => Enter,
        "Delete" => Delete,
        "Esc" | "Escape" => Esc,
        "Tab" => Tab,
        "BackTab" => BackTab,
        "Up" => Up,
        "Down" => Down,
        "Left" => Left,
        "Right" => Right,
        "PageUp" => PageUp,
        "PageDown" => PageDown,
        _ => {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Char(c),
                _ => return None,
            }
        }
    };
    Some((mods, code))
}

fn parse_action(s: &str) -> Option<KeyAction> {
    let s = s.trim();
    ACTION_NAMES.iter().find(|(_, name)| *name == s).map(|(a, _)| *a)
}

pub fn format_action(a: KeyAction) -> &'static str {
    ACTION_NAMES
        .iter()
        .find(|(action, _)| *action == a)
        .map(|(_, name)| *name)
        .unwrap_or("Ignore")
}
