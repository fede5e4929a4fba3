// Integration tests for library-manager

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use library_manager::catalog::{BookInfo, DataPaths, Library, UserInfo};

fn tmp_path(tag: &str, ext: &str) -> PathBuf {
    let nonce = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!("lm_{}_{}_{}.{}", tag, std::process::id(), nonce, ext))
}

fn tmp_data_paths(tag: &str) -> DataPaths {
    DataPaths::new(tmp_path(&format!("{tag}_users"), "csv"), tmp_path(&format!("{tag}_books"), "csv"))
}

fn cleanup(paths: &DataPaths) {
    let _ = std::fs::remove_file(&paths.users);
    let _ = std::fs::remove_file(&paths.books);
}

fn snapshot(lib: &Library) -> (Vec<BookInfo>, Vec<UserInfo>) {
    (lib.books().cloned().collect(), lib.users().cloned().collect())
}

// 1) Theme config roundtrip and init
#[test]
fn theme_roundtrip_and_init() {
    use library_manager::app::Theme;

    let path = tmp_path("theme", "conf");
    let t = Theme::mocha();
    t.write_file(&path).expect("write theme");
    let t2 = Theme::from_file(&path).expect("read theme");
    assert_eq!(format!("{:?}", t.text), format!("{:?}", t2.text));
    assert_eq!(format!("{:?}", t.title), format!("{:?}", t2.title));
    assert_eq!(format!("{:?}", t.highlight_bg), format!("{:?}", t2.highlight_bg));

    // load_or_init creates file if missing
    let p2 = tmp_path("theme_init", "conf");
    let _ = Theme::load_or_init(&p2);
    assert!(p2.exists());

    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(&p2);
}

// 2) Keybinding overrides survive a write/read cycle
#[test]
fn keymap_override_from_file() {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use library_manager::app::keymap::{KeyAction, Keymap};

    let path = tmp_path("keys", "conf");
    Keymap::default().write_file(&path).expect("write keymap");
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str("Borrow = x\n");
    std::fs::write(&path, contents).unwrap();

    let km = Keymap::load_or_init(&path);
    let x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
    assert_eq!(km.resolve(&x), Some(KeyAction::Borrow));
    let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
    assert_eq!(km.resolve(&q), Some(KeyAction::Quit));

    let _ = std::fs::remove_file(&path);
}

// 3) Save then load reproduces records, loans and order
#[test]
fn save_load_roundtrip_preserves_everything() {
    let paths = tmp_data_paths("roundtrip");
    let mut lib = Library::new();
    lib.add_book(BookInfo::new("Zen, and the Art", 9, 2)).unwrap();
    lib.add_book(BookInfo::new("C:\\Windows\nfor dummies", 3, 1)).unwrap();
    lib.add_user(UserInfo::new("root", 0, "p,w\\", true)).unwrap();
    lib.add_user(UserInfo::new("ann", 4, "", false)).unwrap();
    lib.borrow(4, 3).unwrap();
    lib.borrow(4, 9).unwrap();
    lib.borrow(0, 9).unwrap();
    lib.save(&paths).unwrap();

    let mut loaded = Library::new();
    loaded.load(&paths).unwrap();
    assert_eq!(snapshot(&loaded), snapshot(&lib));
    assert_eq!(loaded.paths(), Some(&paths));
    let held: Vec<u32> = loaded.find_user(4).unwrap().books.iter().copied().collect();
    assert_eq!(held, vec![3, 9]);

    cleanup(&paths);
}

// 4) A failed load leaves the previous catalog untouched
#[test]
fn failed_load_is_atomic() {
    let good = tmp_data_paths("atomic_good");
    let mut lib = Library::new();
    lib.add_book(BookInfo::new("Dune", 1, 1)).unwrap();
    lib.add_user(UserInfo::new("ann", 1, "pw", false)).unwrap();
    lib.borrow(1, 1).unwrap();
    lib.save(&good).unwrap();

    let bad = tmp_data_paths("atomic_bad");
    std::fs::write(&bad.users, "ann,1,pw,0,1\n").unwrap();
    // Book 1 does not list its reader
    std::fs::write(&bad.books, "Dune,1,1\n").unwrap();

    let mut current = Library::new();
    current.load(&good).unwrap();
    let before = snapshot(&current);
    assert!(current.load(&bad).is_err());
    assert_eq!(snapshot(&current), before);
    assert_eq!(current.paths(), Some(&good));

    std::fs::write(&bad.books, "Dune,one,1\n").unwrap();
    match current.load(&bad) {
        Err(library_manager::CatalogError::Malformed { line, .. }) => assert_eq!(line, 1),
        other => panic!("unexpected: {other:?}"),
    }

    cleanup(&good);
    cleanup(&bad);
}

// 5) Forced delete is persisted without dangling references
#[test]
fn forced_delete_then_save_reloads_clean() {
    let paths = tmp_data_paths("force");
    let mut lib = Library::new();
    lib.add_book(BookInfo::new("Dune", 1, 3)).unwrap();
    lib.add_book(BookInfo::new("Emma", 2, 1)).unwrap();
    for id in 1..=3 {
        lib.add_user(UserInfo::new(format!("u{id}"), id, "pw", false)).unwrap();
        lib.borrow(id, 1).unwrap();
    }
    lib.borrow(3, 2).unwrap();

    assert!(lib.delete_book(1, false).is_err());
    lib.delete_book(1, true).unwrap();
    lib.save(&paths).unwrap();

    let mut loaded = Library::new();
    loaded.load(&paths).unwrap();
    loaded.check_invariants().unwrap();
    assert_eq!(loaded.book_count(), 1);
    assert!(loaded.find_user(1).unwrap().books.is_empty());
    assert_eq!(loaded.find_user(3).unwrap().books.iter().copied().collect::<Vec<_>>(), vec![2]);

    cleanup(&paths);
}

// 6) Driving the UI state machine: login, borrow, save, reload
#[test]
fn tui_session_borrow_and_save() {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use library_manager::app::keymap::Keymap;
    use library_manager::app::update::handle_key;
    use library_manager::app::{AppState, ModalState, Theme};
    use library_manager::session::Session;

    let paths = tmp_data_paths("tui");
    let mut seed = Library::new();
    seed.add_book(BookInfo::new("Dune", 1, 1)).unwrap();
    seed.add_user(UserInfo::new("ann", 7, "pw", false)).unwrap();
    seed.save(&paths).unwrap();

    let mut lib = Library::new();
    lib.load(&paths).unwrap();
    let mut app = AppState::new(lib, Session::signed_out(), Theme::dark(), Keymap::default());
    app.open_modal(ModalState::login());

    let press = |app: &mut AppState, code: KeyCode| handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    for c in "ann".chars() {
        press(&mut app, KeyCode::Char(c));
    }
    press(&mut app, KeyCode::Tab);
    for c in "pw".chars() {
        press(&mut app, KeyCode::Char(c));
    }
    press(&mut app, KeyCode::Enter);
    assert_eq!(app.session.user_id, Some(7));

    press(&mut app, KeyCode::Char('b'));
    assert!(app.dirty);
    press(&mut app, KeyCode::Char('w'));
    assert!(!app.dirty);

    let mut reloaded = Library::new();
    reloaded.load(&paths).unwrap();
    assert!(reloaded.find_book(1).unwrap().readers.contains(&7));
    assert!(reloaded.find_user(7).unwrap().books.contains(&1));

    cleanup(&paths);
}

// 7) Random borrow/return traffic keeps both sides in step
#[test]
fn borrow_return_traffic_keeps_invariants() {
    use library_manager::CatalogError;
    use library_manager::catalog::BorrowOutcome;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut lib = Library::new();
    for b in 0..5u32 {
        lib.add_book(BookInfo::new(format!("b{b}"), b, b % 3)).unwrap();
    }
    for u in 0..6u32 {
        lib.add_user(UserInfo::new(format!("u{u}"), u, "pw", false)).unwrap();
    }

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (mut borrowed, mut already_held, mut unavailable, mut returned) = (0, 0, 0, 0);
    for _ in 0..2000 {
        let user = rng.gen_range(0..6u32);
        let book = rng.gen_range(0..5u32);
        if rng.gen_bool(0.5) {
            match lib.borrow(user, book) {
                Ok(BorrowOutcome::Borrowed) => borrowed += 1,
                Ok(BorrowOutcome::AlreadyHeld) => already_held += 1,
                Err(CatalogError::Unavailable { .. }) => unavailable += 1,
                Err(e) => panic!("unexpected borrow error: {e}"),
            }
        } else if lib.return_book(user, book).is_ok() {
            returned += 1;
        }
        lib.check_invariants().unwrap();
        for b in lib.books() {
            assert!(b.readers.len() <= b.quantity as usize);
        }
    }
    assert!(borrowed > 0 && returned > 0);
    assert!(already_held > 0, "re-borrow path never taken");
    assert!(unavailable > 0, "exhausted-book path never taken");
}
