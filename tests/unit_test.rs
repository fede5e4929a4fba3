// Unit tests for library-manager
// These tests work with the public API without modifying the main codebase

#[cfg(test)]
mod catalog_tests {
    use library_manager::catalog::{BookInfo, BookUpdate, BorrowOutcome, Library, UserInfo, UserUpdate};
    use library_manager::error::{CatalogError, RecordKind};

    fn create_test_library() -> Library {
        let mut lib = Library::new();
        lib.add_book(BookInfo::new("Dune", 1, 1)).unwrap();
        lib.add_book(BookInfo::new("Emma", 2, 3)).unwrap();
        lib.add_user(UserInfo::new("ann", 1, "pw", false)).unwrap();
        lib.add_user(UserInfo::new("bob", 2, "pw", false)).unwrap();
        lib
    }

    #[test]
    fn test_single_copy_lending_scenario() {
        let mut lib = create_test_library();

        assert_eq!(lib.borrow(1, 1).unwrap(), BorrowOutcome::Borrowed);
        assert_eq!(lib.borrow(1, 1).unwrap(), BorrowOutcome::AlreadyHeld);
        assert!(matches!(lib.borrow(2, 1), Err(CatalogError::Unavailable { book: 1 })));

        lib.return_book(1, 1).unwrap();
        assert!(lib.find_book(1).unwrap().readers.is_empty());
        assert!(lib.find_user(1).unwrap().books.is_empty());
        lib.check_invariants().unwrap();
    }

    #[test]
    fn test_duplicate_user_rejected_without_change() {
        let mut lib = Library::new();
        lib.add_user(UserInfo::new("five", 5, "x", false)).unwrap();
        let err = lib.add_user(UserInfo::new("other five", 5, "y", true)).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentifier { kind: RecordKind::User, id: 5 }));
        assert_eq!(lib.user_count(), 1);
        assert_eq!(lib.find_user(5).unwrap().name, "five");
    }

    #[test]
    fn test_remaining_tracks_loans() {
        let mut lib = create_test_library();
        lib.borrow(1, 2).unwrap();
        lib.borrow(2, 2).unwrap();
        let emma = lib.find_book(2).unwrap();
        assert_eq!(emma.remaining(), 1);
        assert!(emma.is_available());
    }

    #[test]
    fn test_readers_never_exceed_quantity() {
        let mut lib = create_test_library();
        for user in 10..20 {
            lib.add_user(UserInfo::new(format!("u{user}"), user, "pw", false)).unwrap();
            let _ = lib.borrow(user, 2);
        }
        let emma = lib.find_book(2).unwrap();
        assert_eq!(emma.readers.len(), 3);
        assert_eq!(emma.remaining(), 0);
        lib.check_invariants().unwrap();
    }

    #[test]
    fn test_delete_user_requires_force_when_holding() {
        let mut lib = create_test_library();
        lib.borrow(1, 1).unwrap();
        lib.borrow(1, 2).unwrap();

        let err = lib.delete_user(1, false).unwrap_err();
        assert!(matches!(err, CatalogError::HasDependents { count: 2, .. }));
        assert!(lib.find_user(1).is_some());

        let removed = lib.delete_user(1, true).unwrap();
        assert_eq!(removed.name, "ann");
        assert!(lib.find_book(1).unwrap().readers.is_empty());
        assert!(lib.find_book(2).unwrap().readers.is_empty());
        lib.check_invariants().unwrap();
    }

    #[test]
    fn test_rekey_book_rewrites_user_side() {
        let mut lib = create_test_library();
        lib.borrow(2, 1).unwrap();
        lib.update_book(1, BookUpdate { name: "Dune".into(), identifier: 40, quantity: 2 }).unwrap();

        assert!(lib.find_book(1).is_none());
        assert!(lib.find_user(2).unwrap().books.contains(&40));
        let ids: Vec<u32> = lib.books().map(|b| b.identifier).collect();
        assert_eq!(ids, vec![40, 2]);

        let clash = UserUpdate { name: "bob".into(), identifier: 1, is_admin: false };
        assert!(matches!(lib.update_user(2, clash), Err(CatalogError::DuplicateIdentifier { .. })));
    }
}

#[cfg(test)]
mod session_tests {
    use library_manager::catalog::{Library, UserInfo};
    use library_manager::error::CatalogError;
    use library_manager::session::Session;

    #[test]
    fn test_login_requires_exact_credentials() {
        let mut lib = Library::new();
        lib.add_user(UserInfo::new("Ann", 1, "Secret", false)).unwrap();

        assert!(Session::login(&lib, "Ann", "Secret").is_ok());
        assert!(matches!(Session::login(&lib, "ann", "Secret"), Err(CatalogError::LoginFailed)));
        assert!(matches!(Session::login(&lib, "Ann", "secret"), Err(CatalogError::LoginFailed)));
    }

    #[test]
    fn test_ambiguous_login_fails_closed() {
        let mut lib = Library::new();
        lib.add_user(UserInfo::new("twin", 1, "same", false)).unwrap();
        lib.add_user(UserInfo::new("twin", 2, "same", true)).unwrap();
        assert!(Session::login(&lib, "twin", "same").is_err());
    }

    #[test]
    fn test_non_admin_cannot_manage_records() {
        let mut lib = Library::new();
        lib.add_user(UserInfo::new("ann", 1, "pw", false)).unwrap();
        let s = Session::login(&lib, "ann", "pw").unwrap();
        assert!(matches!(s.require_admin("add books"), Err(CatalogError::Forbidden(_))));
        assert_eq!(s.borrower().unwrap(), 1);
        assert!(s.check_acting_for(2).is_err());
    }
}

#[cfg(test)]
mod search_tests {
    use library_manager::catalog::{BookInfo, Library, UserInfo};
    use library_manager::search::{SearchMode, find_books, find_users};

    fn create_test_library() -> Library {
        let mut lib = Library::new();
        lib.add_book(BookInfo::new("The Hobbit", 10, 1)).unwrap();
        lib.add_book(BookInfo::new("Hobbit Tales", 11, 1)).unwrap();
        lib.add_book(BookInfo::new("Emma", 12, 1)).unwrap();
        lib.add_user(UserInfo::new("ann", 1, "pw", false)).unwrap();
        lib
    }

    #[test]
    fn test_name_search_is_substring_in_catalog_order() {
        let lib = create_test_library();
        assert_eq!(find_books(&lib, "Hobbit", SearchMode::ByName), vec![10, 11]);
        assert!(find_books(&lib, "hobbit", SearchMode::ByName).is_empty());
    }

    #[test]
    fn test_id_search_is_exact() {
        let lib = create_test_library();
        assert_eq!(find_books(&lib, "12", SearchMode::ById), vec![12]);
        assert!(find_books(&lib, "1", SearchMode::ById).is_empty());
        assert_eq!(find_users(&lib, "1", SearchMode::ById), vec![1]);
    }

    #[test]
    fn test_empty_query_lists_everything() {
        let lib = create_test_library();
        assert_eq!(find_books(&lib, "", SearchMode::ById).len(), 3);
    }
}

#[cfg(test)]
mod keymap_tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use library_manager::app::keymap::{KeyAction, Keymap};

    #[test]
    fn test_default_bindings() {
        let km = Keymap::default();
        let key = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
        assert_eq!(km.resolve(&key('b')), Some(KeyAction::Borrow));
        assert_eq!(km.resolve(&key('r')), Some(KeyAction::Return));
        assert_eq!(km.resolve(&key('/')), Some(KeyAction::StartSearch));
        assert_eq!(
            km.resolve(&KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            Some(KeyAction::Save)
        );
        assert_eq!(km.resolve(&key('Z')), None);
    }
}
