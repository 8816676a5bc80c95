//! Resolution of the user and group recorded in written headers


/// A resolved user or group
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Account {
	/// The numeric UID or GID
	pub id: u64,
	/// The account name; empty if the account has none
	pub name: String
}


/// Resolves users and groups by name or by numeric id
pub trait IdentityLookup {
	/// Looks up a user by name
	fn user_by_name(&self, name: &str) -> Option<Account>;
	/// Looks up a user by UID
	fn user_by_id(&self, uid: u64) -> Option<Account>;
	/// Looks up a group by name
	fn group_by_name(&self, name: &str) -> Option<Account>;
	/// Looks up a group by GID
	fn group_by_id(&self, gid: u64) -> Option<Account>;
}


/// A lookup that records ids only
///
/// Every id resolves to itself with an empty name and names never resolve, which makes the written
/// archives independent of the machine's account database.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericIdentity;
impl IdentityLookup for NumericIdentity {
	fn user_by_name(&self, _name: &str) -> Option<Account> {
		None
	}
	fn user_by_id(&self, uid: u64) -> Option<Account> {
		Some(Account{ id: uid, name: String::new() })
	}
	fn group_by_name(&self, _name: &str) -> Option<Account> {
		None
	}
	fn group_by_id(&self, gid: u64) -> Option<Account> {
		Some(Account{ id: gid, name: String::new() })
	}
}


#[cfg(unix)]
pub use self::system::SystemIdentity;

#[cfg(unix)]
mod system {
	use super::{ Account, IdentityLookup };
	use libc::{ c_char, c_int, group, passwd };
	use std::{ ffi::{ CStr, CString }, mem::MaybeUninit, ptr };

	/// The initial scratch space for the reentrant database calls
	const SCRATCH_LEN: usize = 1024;
	/// The scratch space limit when the database keeps reporting `ERANGE`
	const SCRATCH_MAX: usize = 1024 * 1024;


	/// A lookup backed by the system's passwd and group databases
	#[derive(Debug, Default, Clone, Copy)]
	pub struct SystemIdentity;
	impl IdentityLookup for SystemIdentity {
		fn user_by_name(&self, name: &str) -> Option<Account> {
			let name = CString::new(name).ok()?;
			lookup(
				|pwd, buf, len, result| unsafe { libc::getpwnam_r(name.as_ptr(), pwd, buf, len, result) },
				user_account
			)
		}
		fn user_by_id(&self, uid: u64) -> Option<Account> {
			let uid = libc::uid_t::try_from(uid).ok()?;
			lookup(
				|pwd, buf, len, result| unsafe { libc::getpwuid_r(uid, pwd, buf, len, result) },
				user_account
			)
		}
		fn group_by_name(&self, name: &str) -> Option<Account> {
			let name = CString::new(name).ok()?;
			lookup(
				|grp, buf, len, result| unsafe { libc::getgrnam_r(name.as_ptr(), grp, buf, len, result) },
				group_account
			)
		}
		fn group_by_id(&self, gid: u64) -> Option<Account> {
			let gid = libc::gid_t::try_from(gid).ok()?;
			lookup(
				|grp, buf, len, result| unsafe { libc::getgrgid_r(gid, grp, buf, len, result) },
				group_account
			)
		}
	}


	/// Runs a reentrant database query, growing the scratch space on `ERANGE`
	fn lookup<T>(
		query: impl Fn(*mut T, *mut c_char, usize, *mut *mut T) -> c_int,
		account: impl Fn(&T) -> Account
	) -> Option<Account> {
		let mut scratch: Vec<c_char> = vec![0; SCRATCH_LEN];
		loop {
			let mut record = MaybeUninit::<T>::uninit();
			let mut result: *mut T = ptr::null_mut();
			match query(record.as_mut_ptr(), scratch.as_mut_ptr(), scratch.len(), ptr::addr_of_mut!(result)) {
				libc::ERANGE if scratch.len() < SCRATCH_MAX => {
					let len = scratch.len() * 2;
					scratch.resize(len, 0);
				},
				// SAFETY: a non-null result means the query initialized `record`, whose strings point
				// into `scratch`, which is still alive
				0 if !result.is_null() => return Some(account(unsafe { record.assume_init_ref() })),
				_ => return None
			}
		}
	}

	fn user_account(pwd: &passwd) -> Account {
		// SAFETY: `pw_name` is a NUL-terminated string owned by the scratch space
		let name = unsafe { CStr::from_ptr(pwd.pw_name) };
		Account{ id: u64::from(pwd.pw_uid), name: name.to_string_lossy().into_owned() }
	}
	fn group_account(grp: &group) -> Account {
		// SAFETY: `gr_name` is a NUL-terminated string owned by the scratch space
		let name = unsafe { CStr::from_ptr(grp.gr_name) };
		Account{ id: u64::from(grp.gr_gid), name: name.to_string_lossy().into_owned() }
	}
}
