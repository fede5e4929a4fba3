//! In-memory catalog of books, users and the loans between them.
//!
//! Records are owned by [`Library`] and kept in insertion order. A loan is
//! recorded twice: the user id in the book's `readers` and the book id in the
//! user's `books`. Every mutating operation either keeps both sides in step or
//! changes nothing.
//!
pub mod store;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult, RecordKind};

pub use store::DataPaths;

/// A title with a fixed number of copies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookInfo {
    pub name: String,
    pub identifier: u32,
    /// Total copies owned, borrowed or not.
    pub quantity: u32,
    /// Ids of the users currently holding a copy, in borrow order.
    pub readers: IndexSet<u32>,
}

impl BookInfo {
    pub fn new(name: impl Into<String>, identifier: u32, quantity: u32) -> Self {
        Self {
            name: name.into(),
            identifier,
            quantity,
            readers: IndexSet::new(),
        }
    }

    /// Copies still on the shelf.
    pub fn remaining(&self) -> usize {
        (self.quantity as usize).saturating_sub(self.readers.len())
    }

    pub fn is_available(&self) -> bool {
        self.remaining() > 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub identifier: u32,
    pub password: String,
    pub is_admin: bool,
    /// Ids of the books this user currently holds, in borrow order.
    pub books: IndexSet<u32>,
}

impl UserInfo {
    pub fn new(name: impl Into<String>, identifier: u32, password: impl Into<String>, is_admin: bool) -> Self {
        Self {
            name: name.into(),
            identifier,
            password: password.into(),
            is_admin,
            books: IndexSet::new(),
        }
    }
}

/// Editable fields of a book. Loans are never changed through an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookUpdate {
    pub name: String,
    pub identifier: u32,
    pub quantity: u32,
}

/// Editable fields of a user. The password has its own setter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: String,
    pub identifier: u32,
    pub is_admin: bool,
}

/// Result of a successful [`Library::borrow`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorrowOutcome {
    Borrowed,
    /// The user already held this book; nothing changed.
    AlreadyHeld,
}

#[derive(Clone, Debug, Default)]
pub struct Library {
    books: IndexMap<u32, BookInfo>,
    users: IndexMap<u32, UserInfo>,
    paths: Option<DataPaths>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn books(&self) -> impl Iterator<Item = &BookInfo> {
        self.books.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &UserInfo> {
        self.users.values()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn find_book(&self, id: u32) -> Option<&BookInfo> {
        self.books.get(&id)
    }

    pub fn find_user(&self, id: u32) -> Option<&UserInfo> {
        self.users.get(&id)
    }

    /// The user matching both `name` and `password`.
    ///
    /// Names are not unique, so an ambiguous match is rejected like a wrong password.
    pub fn login(&self, name: &str, password: &str) -> Option<&UserInfo> {
        let mut matches = self
            .users
            .values()
            .filter(|u| u.name == name && u.password == password);
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// Books whose name contains `query` (case-sensitive), in catalog order.
    pub fn fuzzy_find_books(&self, query: &str) -> Vec<&BookInfo> {
        self.books.values().filter(|b| b.name.contains(query)).collect()
    }

    /// Users whose name contains `query` (case-sensitive), in catalog order.
    pub fn fuzzy_find_users(&self, query: &str) -> Vec<&UserInfo> {
        self.users.values().filter(|u| u.name.contains(query)).collect()
    }

    /// Books currently held by `user_id`, in borrow order.
    pub fn books_held_by(&self, user_id: u32) -> Vec<&BookInfo> {
        self.users
            .get(&user_id)
            .map(|u| u.books.iter().filter_map(|id| self.books.get(id)).collect())
            .unwrap_or_default()
    }

    /// Users currently holding `book_id`, in borrow order.
    pub fn readers_of(&self, book_id: u32) -> Vec<&UserInfo> {
        self.books
            .get(&book_id)
            .map(|b| b.readers.iter().filter_map(|id| self.users.get(id)).collect())
            .unwrap_or_default()
    }

    /// Insert a new book at the end of the catalog.
    ///
    /// A new record never carries loans; any readers on `book` are dropped.
    pub fn add_book(&mut self, mut book: BookInfo) -> CatalogResult<&BookInfo> {
        let id = book.identifier;
        if self.books.contains_key(&id) {
            return Err(CatalogError::DuplicateIdentifier { kind: RecordKind::Book, id });
        }
        book.readers.clear();
        info!(book = id, name = %book.name, quantity = book.quantity, "book added");
        let (index, _) = self.books.insert_full(id, book);
        Ok(&self.books[index])
    }

    /// Insert a new user at the end of the catalog.
    pub fn add_user(&mut self, mut user: UserInfo) -> CatalogResult<&UserInfo> {
        let id = user.identifier;
        if self.users.contains_key(&id) {
            return Err(CatalogError::DuplicateIdentifier { kind: RecordKind::User, id });
        }
        user.books.clear();
        info!(user = id, name = %user.name, admin = user.is_admin, "user added");
        let (index, _) = self.users.insert_full(id, user);
        Ok(&self.users[index])
    }

    /// Remove a book. Without `force` a book with readers is kept.
    ///
    /// A forced delete also drops the book from every reader's held set.
    pub fn delete_book(&mut self, id: u32, force: bool) -> CatalogResult<BookInfo> {
        let book = self
            .books
            .get(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id })?;
        if !force && !book.readers.is_empty() {
            return Err(CatalogError::HasDependents {
                kind: RecordKind::Book,
                id,
                count: book.readers.len(),
            });
        }
        let book = self
            .books
            .shift_remove(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id })?;
        for reader in &book.readers {
            if let Some(user) = self.users.get_mut(reader) {
                user.books.shift_remove(&id);
            }
        }
        info!(book = id, force, dropped_loans = book.readers.len(), "book deleted");
        Ok(book)
    }

    /// Remove a user. Without `force` a user holding books is kept.
    ///
    /// A forced delete also drops the user from every held book's readers.
    pub fn delete_user(&mut self, id: u32, force: bool) -> CatalogResult<UserInfo> {
        let user = self
            .users
            .get(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id })?;
        if !force && !user.books.is_empty() {
            return Err(CatalogError::HasDependents {
                kind: RecordKind::User,
                id,
                count: user.books.len(),
            });
        }
        let user = self
            .users
            .shift_remove(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id })?;
        for book_id in &user.books {
            if let Some(book) = self.books.get_mut(book_id) {
                book.readers.shift_remove(&id);
            }
        }
        info!(user = id, force, dropped_loans = user.books.len(), "user deleted");
        Ok(user)
    }

    /// Lend one copy of `book_id` to `user_id`.
    pub fn borrow(&mut self, user_id: u32, book_id: u32) -> CatalogResult<BorrowOutcome> {
        let user = self
            .users
            .get(&user_id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id: user_id })?;
        let book = self
            .books
            .get(&book_id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id: book_id })?;
        if user.books.contains(&book_id) {
            debug!(user = user_id, book = book_id, "book already held, borrow is a no-op");
            return Ok(BorrowOutcome::AlreadyHeld);
        }
        if !book.is_available() {
            return Err(CatalogError::Unavailable { book: book_id });
        }

        // Both records exist; the two inserts below cannot fail halfway.
        if let Some(book) = self.books.get_mut(&book_id) {
            book.readers.insert(user_id);
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.books.insert(book_id);
        }
        info!(user = user_id, book = book_id, "book borrowed");
        Ok(BorrowOutcome::Borrowed)
    }

    /// Take back the copy of `book_id` held by `user_id`.
    pub fn return_book(&mut self, user_id: u32, book_id: u32) -> CatalogResult<()> {
        let user = self
            .users
            .get(&user_id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id: user_id })?;
        let book = self
            .books
            .get(&book_id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id: book_id })?;
        if !user.books.contains(&book_id) || !book.readers.contains(&user_id) {
            return Err(CatalogError::NotBorrowed { user: user_id, book: book_id });
        }

        if let Some(book) = self.books.get_mut(&book_id) {
            book.readers.shift_remove(&user_id);
        }
        if let Some(user) = self.users.get_mut(&user_id) {
            user.books.shift_remove(&book_id);
        }
        info!(user = user_id, book = book_id, "book returned");
        Ok(())
    }

    /// Edit a book in place. A new identifier keeps the catalog position and is
    /// propagated to every reader's held set.
    pub fn update_book(&mut self, id: u32, update: BookUpdate) -> CatalogResult<()> {
        let book = self
            .books
            .get(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id })?;
        if update.identifier != id && self.books.contains_key(&update.identifier) {
            return Err(CatalogError::DuplicateIdentifier {
                kind: RecordKind::Book,
                id: update.identifier,
            });
        }
        if (update.quantity as usize) < book.readers.len() {
            return Err(CatalogError::QuantityBelowBorrowed {
                book: id,
                borrowed: book.readers.len(),
                quantity: update.quantity,
            });
        }

        let new_id = update.identifier;
        if new_id == id {
            if let Some(book) = self.books.get_mut(&id) {
                book.name = update.name;
                book.quantity = update.quantity;
            }
        } else {
            let (index, _, mut book) = self
                .books
                .shift_remove_full(&id)
                .ok_or(CatalogError::NotFound { kind: RecordKind::Book, id })?;
            for reader in &book.readers {
                if let Some(user) = self.users.get_mut(reader) {
                    rekey(&mut user.books, id, new_id);
                }
            }
            book.name = update.name;
            book.quantity = update.quantity;
            book.identifier = new_id;
            self.books.shift_insert(index, new_id, book);
        }
        info!(book = id, new_id, "book updated");
        Ok(())
    }

    /// Edit a user in place. A new identifier keeps the catalog position and is
    /// propagated to every held book's readers.
    pub fn update_user(&mut self, id: u32, update: UserUpdate) -> CatalogResult<()> {
        if !self.users.contains_key(&id) {
            return Err(CatalogError::NotFound { kind: RecordKind::User, id });
        }
        if update.identifier != id && self.users.contains_key(&update.identifier) {
            return Err(CatalogError::DuplicateIdentifier {
                kind: RecordKind::User,
                id: update.identifier,
            });
        }

        let new_id = update.identifier;
        if new_id == id {
            if let Some(user) = self.users.get_mut(&id) {
                user.name = update.name;
                user.is_admin = update.is_admin;
            }
        } else {
            let (index, _, mut user) = self
                .users
                .shift_remove_full(&id)
                .ok_or(CatalogError::NotFound { kind: RecordKind::User, id })?;
            for book_id in &user.books {
                if let Some(book) = self.books.get_mut(book_id) {
                    rekey(&mut book.readers, id, new_id);
                }
            }
            user.name = update.name;
            user.is_admin = update.is_admin;
            user.identifier = new_id;
            self.users.shift_insert(index, new_id, user);
        }
        info!(user = id, new_id, "user updated");
        Ok(())
    }

    pub fn set_password(&mut self, id: u32, password: impl Into<String>) -> CatalogResult<()> {
        let user = self
            .users
            .get_mut(&id)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id })?;
        user.password = password.into();
        info!(user = id, "password changed");
        Ok(())
    }

    /// Verify quantities, dangling ids and the symmetry of every loan.
    pub fn check_invariants(&self) -> CatalogResult<()> {
        for book in self.books.values() {
            if book.readers.len() > book.quantity as usize {
                return Err(CatalogError::Inconsistent(format!(
                    "book {} has {} readers but only {} copies",
                    book.identifier,
                    book.readers.len(),
                    book.quantity
                )));
            }
            for reader in &book.readers {
                match self.users.get(reader) {
                    None => {
                        return Err(CatalogError::Inconsistent(format!(
                            "book {} lists unknown reader {}",
                            book.identifier, reader
                        )));
                    }
                    Some(user) if !user.books.contains(&book.identifier) => {
                        return Err(CatalogError::Inconsistent(format!(
                            "book {} lists reader {} who does not hold it",
                            book.identifier, reader
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        for user in self.users.values() {
            for book_id in &user.books {
                match self.books.get(book_id) {
                    None => {
                        return Err(CatalogError::Inconsistent(format!(
                            "user {} holds unknown book {}",
                            user.identifier, book_id
                        )));
                    }
                    Some(book) if !book.readers.contains(&user.identifier) => {
                        return Err(CatalogError::Inconsistent(format!(
                            "user {} holds book {} which does not list them",
                            user.identifier, book_id
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

/// Replace `old` with `new` in an association set without moving it.
fn rekey(set: &mut IndexSet<u32>, old: u32, new: u32) {
    if let Some(index) = set.get_index_of(&old) {
        set.shift_remove_index(index);
        set.shift_insert(index, new);
    }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lib_with(books: &[(u32, u32)], users: &[u32]) -> Library {
		let mut lib = Library::new();
		for (id, qty) in books {
			lib.add_book(BookInfo::new(format!("Book {id}"), *id, *qty)).unwrap();
		}
		for id in users {
			lib.add_user(UserInfo::new(format!("user{id}"), *id, "pw", false)).unwrap();
		}
		lib
	}

	#[test]
	fn borrow_twice_is_noop_and_respects_quantity() {
		let mut lib = lib_with(&[(1, 1)], &[1, 2]);

		assert_eq!(lib.borrow(1, 1).unwrap(), BorrowOutcome::Borrowed);
		assert_eq!(lib.find_book(1).unwrap().readers.iter().copied().collect::<Vec<_>>(), vec![1]);
		assert!(lib.find_user(1).unwrap().books.contains(&1));

		assert_eq!(lib.borrow(1, 1).unwrap(), BorrowOutcome::AlreadyHeld);
		assert_eq!(lib.find_book(1).unwrap().readers.len(), 1);

		let err = lib.borrow(2, 1).unwrap_err();
		assert!(matches!(err, CatalogError::Unavailable { book: 1 }));
		assert!(lib.find_user(2).unwrap().books.is_empty());

		lib.return_book(1, 1).unwrap();
		assert!(lib.find_book(1).unwrap().readers.is_empty());
		assert!(lib.find_user(1).unwrap().books.is_empty());
		lib.check_invariants().unwrap();
	}

	#[test]
	fn borrow_and_return_reject_unknown_ids() {
		let mut lib = lib_with(&[(1, 2)], &[1]);
		assert!(matches!(
			lib.borrow(9, 1).unwrap_err(),
			CatalogError::NotFound { kind: RecordKind::User, id: 9 }
		));
		assert!(matches!(
			lib.borrow(1, 9).unwrap_err(),
			CatalogError::NotFound { kind: RecordKind::Book, id: 9 }
		));
		assert!(matches!(
			lib.return_book(1, 9).unwrap_err(),
			CatalogError::NotFound { kind: RecordKind::Book, id: 9 }
		));
	}

	#[test]
	fn return_without_loan_is_not_borrowed() {
		let mut lib = lib_with(&[(1, 2)], &[1]);
		assert!(matches!(
			lib.return_book(1, 1).unwrap_err(),
			CatalogError::NotBorrowed { user: 1, book: 1 }
		));
	}

	#[test]
	fn return_restores_previous_order_of_sets() {
		let mut lib = lib_with(&[(1, 3), (2, 3), (3, 3)], &[1]);
		lib.borrow(1, 1).unwrap();
		lib.borrow(1, 3).unwrap();
		let before = lib.find_user(1).unwrap().books.clone();

		lib.borrow(1, 2).unwrap();
		lib.return_book(1, 2).unwrap();

		let after = &lib.find_user(1).unwrap().books;
		assert_eq!(before.iter().collect::<Vec<_>>(), after.iter().collect::<Vec<_>>());
	}

	#[test]
	fn add_rejects_duplicate_ids_and_keeps_size() {
		let mut lib = Library::new();
		lib.add_user(UserInfo::new("eve", 5, "x", false)).unwrap();
		let err = lib.add_user(UserInfo::new("mallory", 5, "y", true)).unwrap_err();
		assert!(matches!(err, CatalogError::DuplicateIdentifier { kind: RecordKind::User, id: 5 }));
		assert_eq!(lib.user_count(), 1);
		assert_eq!(lib.find_user(5).unwrap().name, "eve");
	}

	#[test]
	fn add_drops_preexisting_associations() {
		let mut lib = Library::new();
		let mut book = BookInfo::new("Dune", 1, 2);
		book.readers.insert(42);
		let added = lib.add_book(book).unwrap();
		assert!(added.readers.is_empty());
		lib.check_invariants().unwrap();
	}

	#[test]
	fn delete_without_force_blocks_on_loans() {
		let mut lib = lib_with(&[(1, 2)], &[1]);
		lib.borrow(1, 1).unwrap();

		let err = lib.delete_user(1, false).unwrap_err();
		assert!(matches!(err, CatalogError::HasDependents { kind: RecordKind::User, id: 1, count: 1 }));
		let err = lib.delete_book(1, false).unwrap_err();
		assert!(matches!(err, CatalogError::HasDependents { kind: RecordKind::Book, id: 1, count: 1 }));
		assert!(lib.find_user(1).is_some());
		assert!(lib.find_book(1).is_some());

		lib.return_book(1, 1).unwrap();
		lib.delete_user(1, false).unwrap();
		assert!(lib.find_user(1).is_none());
	}

	#[test]
	fn forced_delete_cleans_other_side() {
		let mut lib = lib_with(&[(1, 2), (2, 2)], &[1, 2]);
		lib.borrow(1, 1).unwrap();
		lib.borrow(1, 2).unwrap();
		lib.borrow(2, 1).unwrap();

		let removed = lib.delete_user(1, true).unwrap();
		assert_eq!(removed.books.len(), 2);
		assert_eq!(lib.find_book(1).unwrap().readers.iter().copied().collect::<Vec<_>>(), vec![2]);
		assert!(lib.find_book(2).unwrap().readers.is_empty());
		lib.check_invariants().unwrap();

		lib.delete_book(1, true).unwrap();
		assert!(lib.find_user(2).unwrap().books.is_empty());
		lib.check_invariants().unwrap();
	}

	#[test]
	fn delete_keeps_order_of_remaining_records() {
		let mut lib = lib_with(&[(3, 1), (1, 1), (2, 1)], &[]);
		lib.delete_book(1, false).unwrap();
		let ids: Vec<u32> = lib.books().map(|b| b.identifier).collect();
		assert_eq!(ids, vec![3, 2]);
	}

	#[test]
	fn fuzzy_find_is_case_sensitive_and_ordered() {
		let mut lib = Library::new();
		lib.add_book(BookInfo::new("The Rust Book", 10, 1)).unwrap();
		lib.add_book(BookInfo::new("rusty nails", 2, 1)).unwrap();
		lib.add_book(BookInfo::new("Trust", 7, 1)).unwrap();

		let hits: Vec<u32> = lib.fuzzy_find_books("rust").iter().map(|b| b.identifier).collect();
		assert_eq!(hits, vec![2, 7]);
		let hits: Vec<u32> = lib.fuzzy_find_books("Rust").iter().map(|b| b.identifier).collect();
		assert_eq!(hits, vec![10]);
	}

	#[test]
	fn login_requires_unique_exact_match() {
		let mut lib = Library::new();
		lib.add_user(UserInfo::new("alice", 1, "secret", true)).unwrap();
		lib.add_user(UserInfo::new("bob", 2, "hunter2", false)).unwrap();
		lib.add_user(UserInfo::new("bob", 3, "hunter2", false)).unwrap();

		assert_eq!(lib.login("alice", "secret").map(|u| u.identifier), Some(1));
		assert!(lib.login("alice", "Secret").is_none());
		assert!(lib.login("carol", "secret").is_none());
		assert!(lib.login("bob", "hunter2").is_none());
	}

	#[test]
	fn update_book_rekeys_readers_and_keeps_position() {
		let mut lib = lib_with(&[(1, 2), (2, 2)], &[1]);
		lib.borrow(1, 2).unwrap();
		lib.borrow(1, 1).unwrap();

		lib.update_book(1, BookUpdate { name: "Renamed".into(), identifier: 9, quantity: 4 }).unwrap();

		let ids: Vec<u32> = lib.books().map(|b| b.identifier).collect();
		assert_eq!(ids, vec![9, 2]);
		assert_eq!(lib.find_book(9).unwrap().name, "Renamed");
		assert!(lib.find_book(1).is_none());
		let held: Vec<u32> = lib.find_user(1).unwrap().books.iter().copied().collect();
		assert_eq!(held, vec![2, 9]);
		lib.check_invariants().unwrap();
	}

	#[test]
	fn update_book_rejects_collision_and_low_quantity() {
		let mut lib = lib_with(&[(1, 2), (2, 2)], &[1, 2]);
		lib.borrow(1, 1).unwrap();
		lib.borrow(2, 1).unwrap();

		let err = lib
			.update_book(1, BookUpdate { name: "x".into(), identifier: 2, quantity: 2 })
			.unwrap_err();
		assert!(matches!(err, CatalogError::DuplicateIdentifier { kind: RecordKind::Book, id: 2 }));

		let err = lib
			.update_book(1, BookUpdate { name: "x".into(), identifier: 1, quantity: 1 })
			.unwrap_err();
		assert!(matches!(err, CatalogError::QuantityBelowBorrowed { book: 1, borrowed: 2, quantity: 1 }));
		assert_eq!(lib.find_book(1).unwrap().name, "Book 1");
	}

	#[test]
	fn update_user_rekeys_held_books() {
		let mut lib = lib_with(&[(1, 2)], &[1, 2]);
		lib.borrow(1, 1).unwrap();

		let err = lib
			.update_user(1, UserUpdate { name: "x".into(), identifier: 2, is_admin: false })
			.unwrap_err();
		assert!(matches!(err, CatalogError::DuplicateIdentifier { kind: RecordKind::User, id: 2 }));

		lib.update_user(1, UserUpdate { name: "ann".into(), identifier: 7, is_admin: true }).unwrap();
		let ids: Vec<u32> = lib.users().map(|u| u.identifier).collect();
		assert_eq!(ids, vec![7, 2]);
		assert!(lib.find_book(1).unwrap().readers.contains(&7));
		assert!(lib.find_user(7).unwrap().is_admin);
		lib.check_invariants().unwrap();
	}

	#[test]
	fn check_invariants_spots_one_sided_loan() {
		let mut lib = lib_with(&[(1, 2)], &[1]);
		lib.books.get_mut(&1).unwrap().readers.insert(1);
		assert!(matches!(lib.check_invariants(), Err(CatalogError::Inconsistent(_))));
	}
}
