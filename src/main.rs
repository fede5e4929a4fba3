//! library-manager binary entry point.
//!
//! Parses arguments, runs a subcommand or initializes the terminal in raw
//! mode, runs the TUI event loop, and restores the terminal state on exit.
//!
use clap::Parser;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;

use library_manager::app::keymap::Keymap;
use library_manager::app::{self, AppState, ModalState, Theme, config_file_path};
use library_manager::catalog::Library;
use library_manager::cli::{Cli, execute_command};
use library_manager::error::{Context, Result};
use library_manager::logging;
use library_manager::session::Session;

/// Initialize a Crossterm-backed `ratatui` terminal in raw mode.
fn init_terminal() -> Result<Terminal<CrosstermBackend<std::io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Load the catalog and decide how the UI starts: a login prompt over
/// existing data, or a guest administrator on a fresh catalog.
fn initial_state(cli: &Cli) -> Result<AppState> {
    let paths = cli.data_paths();
    let theme = Theme::load_or_init(&config_file_path(&cli.config_dir, "theme.conf"));
    let keymap = Keymap::load_or_init(&config_file_path(&cli.config_dir, "keybinds.conf"));

    let mut library = Library::new();
    if paths.is_fresh() {
        info!(books = %paths.books.display(), users = %paths.users.display(), "no data files, starting empty");
        library.set_paths(paths);
        let mut app = AppState::new(library, Session::guest_admin(), theme, keymap);
        app.set_status("No data files yet; saving will create them");
        return Ok(app);
    }

    library
        .load(&paths)
        .with_ctx(|| format!("load {} and {}", paths.books.display(), paths.users.display()))?;
    let mut app = AppState::new(library, Session::signed_out(), theme, keymap);
    app.open_modal(ModalState::login());
    Ok(app)
}

/// Program entry point: run a subcommand or the TUI, reporting errors to stderr.
fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        logging::init_for_cli()?;
        let mut stdout = std::io::stdout().lock();
        execute_command(command, &cli.data_paths(), &mut stdout)?;
        return Ok(());
    }

    logging::init_for_tui(cli.log_file.as_deref())?;
    let mut state = initial_state(&cli)?;
    let mut terminal = init_terminal().map_err(|e| format!("init terminal: {}", e))?;

    let res = app::run(&mut terminal, &mut state);

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture).ok();
    terminal.show_cursor().ok();

    if let Err(err) = res {
        eprintln!("application error: {err}");
    }
    Ok(())
}
