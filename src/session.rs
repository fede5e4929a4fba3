//! Login context and the permission rules that depend on it.
//!
//! A [`Session`] is passed explicitly to whatever needs to know who is acting.
//!
use tracing::{info, warn};

use crate::catalog::{Library, UserInfo, UserUpdate};
use crate::error::{CatalogError, CatalogResult, RecordKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    /// `None` when nobody is logged in (bootstrap/admin-only session).
    pub user_id: Option<u32>,
    pub is_admin: bool,
}

impl Session {
    /// Session used before any user exists: full rights, no identity.
    pub fn guest_admin() -> Self {
        Self { user_id: None, is_admin: true }
    }

    /// Nobody logged in and no rights; shown behind the login prompt.
    pub fn signed_out() -> Self {
        Self { user_id: None, is_admin: false }
    }

    pub fn is_signed_out(&self) -> bool {
        self.user_id.is_none() && !self.is_admin
    }

    pub fn for_user(user: &UserInfo) -> Self {
        Self {
            user_id: Some(user.identifier),
            is_admin: user.is_admin,
        }
    }

    pub fn login(library: &Library, name: &str, password: &str) -> CatalogResult<Self> {
        match library.login(name, password) {
            Some(user) => {
                info!(user = user.identifier, admin = user.is_admin, "login");
                Ok(Self::for_user(user))
            }
            None => {
                warn!(user_name = name, "login rejected");
                Err(CatalogError::LoginFailed)
            }
        }
    }

    pub fn require_admin(&self, action: &str) -> CatalogResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(CatalogError::Forbidden(format!("only administrators can {}", action)))
        }
    }

    /// The logged-in user's id, for self-service borrow and return.
    pub fn borrower(&self) -> CatalogResult<u32> {
        self.user_id
            .ok_or_else(|| CatalogError::Forbidden("log in as a user to borrow or return books".to_string()))
    }

    pub fn can_edit_user(&self, target: u32) -> bool {
        self.is_admin || self.user_id == Some(target)
    }

    /// Borrowing or returning on behalf of `user_id`.
    pub fn check_acting_for(&self, user_id: u32) -> CatalogResult<()> {
        if self.can_edit_user(user_id) {
            Ok(())
        } else {
            Err(CatalogError::Forbidden("only administrators can act for other users".to_string()))
        }
    }

    /// Non-admins may only rename themselves.
    pub fn check_user_update(&self, library: &Library, target: u32, update: &UserUpdate) -> CatalogResult<()> {
        if self.is_admin {
            return Ok(());
        }
        if self.user_id != Some(target) {
            return Err(CatalogError::Forbidden("you can only edit your own account".to_string()));
        }
        let current = library
            .find_user(target)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id: target })?;
        if update.identifier != current.identifier || update.is_admin != current.is_admin {
            return Err(CatalogError::Forbidden(
                "only administrators can change ids or admin rights".to_string(),
            ));
        }
        Ok(())
    }

    pub fn check_delete(&self, kind: RecordKind, id: u32) -> CatalogResult<()> {
        self.require_admin("delete records")?;
        if kind == RecordKind::User && self.user_id == Some(id) {
            return Err(CatalogError::Forbidden("cannot delete the logged-in user".to_string()));
        }
        Ok(())
    }

    /// Change a password. Non-admins must prove the old one.
    pub fn change_password(
        &self,
        library: &mut Library,
        target: u32,
        old_password: &str,
        new_password: &str,
    ) -> CatalogResult<()> {
        if !self.can_edit_user(target) {
            return Err(CatalogError::Forbidden("you can only change your own password".to_string()));
        }
        let user = library
            .find_user(target)
            .ok_or(CatalogError::NotFound { kind: RecordKind::User, id: target })?;
        if !self.is_admin && user.password != old_password {
            return Err(CatalogError::Forbidden(
                "wrong old password; ask an administrator to reset it".to_string(),
            ));
        }
        library.set_password(target, new_password)
    }

    /// Follow an edit of the logged-in user's own record.
    pub fn track_user_update(&mut self, old_id: u32, update: &UserUpdate) {
        if self.user_id == Some(old_id) {
            self.user_id = Some(update.identifier);
            self.is_admin = update.is_admin;
        }
    }

    pub fn describe(&self, library: &Library) -> String {
        match self.user_id.and_then(|id| library.find_user(id)) {
            Some(u) if self.is_admin => format!("{} (admin)", u.name),
            Some(u) => u.name.clone(),
            None if self.is_admin => "guest (admin)".to_string(),
            None => "not logged in".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::UserInfo;

	fn lib() -> Library {
		let mut lib = Library::new();
		lib.add_user(UserInfo::new("root", 0, "toor", true)).unwrap();
		lib.add_user(UserInfo::new("reader", 1, "pw", false)).unwrap();
		lib.add_user(UserInfo::new("other", 2, "pw2", false)).unwrap();
		lib
	}

	#[test]
	fn login_builds_session_or_fails_closed() {
		let lib = lib();
		let s = Session::login(&lib, "reader", "pw").unwrap();
		assert_eq!(s, Session { user_id: Some(1), is_admin: false });
		assert!(matches!(Session::login(&lib, "reader", "nope"), Err(CatalogError::LoginFailed)));
	}

	#[test]
	fn non_admin_password_change_needs_old_password() {
		let mut lib = lib();
		let s = Session::login(&lib, "reader", "pw").unwrap();
		assert!(matches!(s.change_password(&mut lib, 1, "bad", "new"), Err(CatalogError::Forbidden(_))));
		s.change_password(&mut lib, 1, "pw", "new").unwrap();
		assert_eq!(lib.find_user(1).unwrap().password, "new");
		assert!(matches!(s.change_password(&mut lib, 2, "pw2", "x"), Err(CatalogError::Forbidden(_))));

		let admin = Session::login(&lib, "root", "toor").unwrap();
		admin.change_password(&mut lib, 2, "", "reset").unwrap();
		assert_eq!(lib.find_user(2).unwrap().password, "reset");
	}

	#[test]
	fn non_admin_may_only_rename_self() {
		let lib = lib();
		let s = Session::login(&lib, "reader", "pw").unwrap();
		let rename = UserUpdate { name: "Reader".into(), identifier: 1, is_admin: false };
		s.check_user_update(&lib, 1, &rename).unwrap();

		let promote = UserUpdate { is_admin: true, ..rename.clone() };
		assert!(s.check_user_update(&lib, 1, &promote).is_err());
		let rekey = UserUpdate { identifier: 9, ..rename.clone() };
		assert!(s.check_user_update(&lib, 1, &rekey).is_err());
		assert!(s.check_user_update(&lib, 2, &rename).is_err());
	}

	#[test]
	fn guest_admin_cannot_borrow_for_itself() {
		let s = Session::guest_admin();
		assert!(s.borrower().is_err());
		s.check_acting_for(1).unwrap();
		s.require_admin("add books").unwrap();
	}

	#[test]
	fn admin_cannot_delete_itself() {
		let lib = lib();
		let admin = Session::login(&lib, "root", "toor").unwrap();
		assert!(admin.check_delete(RecordKind::User, 0).is_err());
		admin.check_delete(RecordKind::User, 1).unwrap();
		let reader = Session::login(&lib, "reader", "pw").unwrap();
		assert!(reader.check_delete(RecordKind::Book, 1).is_err());
	}

	#[test]
	fn session_follows_own_rekey() {
		let mut s = Session { user_id: Some(1), is_admin: true };
		s.track_user_update(1, &UserUpdate { name: "x".into(), identifier: 5, is_admin: false });
		assert_eq!(s, Session { user_id: Some(5), is_admin: false });
	}
}
