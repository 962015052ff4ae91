//! User directory contract consumed by identification and password stages.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, id::UserRef, store::StoreFuture};

/// Directory view of one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectoryUser {
	/// Opaque reference used across the engine.
	pub reference: UserRef,
	/// Unique username.
	pub username: String,
	/// Email address, if known.
	pub email: Option<String>,
	/// Phone number for SMS authenticators, if known.
	pub phone: Option<String>,
	/// Inactive users fail identification and verification.
	pub active: bool,
}

/// Lookup and credential verification backend.
///
/// Implementations may talk to LDAP, SQL, or an external IdP; stages await
/// them as one atomic unit per call.
pub trait Directory
where
	Self: Send + Sync,
{
	/// Finds a user by any of the requested matching fields.
	fn find_user<'a>(
		&'a self,
		fields: &'a [String],
		identifier: &'a str,
	) -> StoreFuture<'a, Option<DirectoryUser>>;

	/// Fetches a user by reference.
	fn lookup<'a>(&'a self, user: &'a UserRef) -> StoreFuture<'a, Option<DirectoryUser>>;

	/// Verifies a password; inactive or unknown users always fail.
	fn verify_password<'a>(
		&'a self,
		user: &'a UserRef,
		password: &'a str,
	) -> StoreFuture<'a, bool>;
}

#[derive(Clone, Debug)]
struct StoredUser {
	user: DirectoryUser,
	password_hash: [u8; 32],
}

type UserMap = Arc<RwLock<HashMap<UserRef, StoredUser>>>;

/// In-memory [`Directory`] for local development and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryDirectory(UserMap);
impl MemoryDirectory {
	/// Adds a user; the reference is derived from the username.
	pub fn add_user(
		&self,
		username: impl Into<String>,
		email: Option<&str>,
		phone: Option<&str>,
		password: &str,
	) -> Result<UserRef, crate::id::IdentifierError> {
		let username = username.into();
		let reference = UserRef::new(&username)?;
		let user = DirectoryUser {
			reference: reference.clone(),
			username,
			email: email.map(str::to_owned),
			phone: phone.map(str::to_owned),
			active: true,
		};

		self.0
			.write()
			.insert(reference.clone(), StoredUser { user, password_hash: hash_password(password) });

		Ok(reference)
	}

	/// Deactivates a user; subsequent identification and verification fail.
	pub fn deactivate(&self, user: &UserRef) {
		if let Some(stored) = self.0.write().get_mut(user) {
			stored.user.active = false;
		}
	}

	fn find_now(map: UserMap, fields: Vec<String>, identifier: String) -> Option<DirectoryUser> {
		let guard = map.read();

		guard
			.values()
			.find(|stored| {
				stored.user.active
					&& fields.iter().any(|field| match field.as_str() {
						"username" => stored.user.username == identifier,
						"email" => stored.user.email.as_deref() == Some(identifier.as_str()),
						_ => false,
					})
			})
			.map(|stored| stored.user.clone())
	}

	fn verify_now(map: UserMap, user: UserRef, password: String) -> bool {
		let guard = map.read();

		match guard.get(&user) {
			Some(stored) if stored.user.active =>
				stored.password_hash == hash_password(&password),
			_ => false,
		}
	}
}
impl Directory for MemoryDirectory {
	fn find_user<'a>(
		&'a self,
		fields: &'a [String],
		identifier: &'a str,
	) -> StoreFuture<'a, Option<DirectoryUser>> {
		let map = self.0.clone();
		let fields = fields.to_vec();
		let identifier = identifier.to_owned();

		Box::pin(async move { Ok(Self::find_now(map, fields, identifier)) })
	}

	fn lookup<'a>(&'a self, user: &'a UserRef) -> StoreFuture<'a, Option<DirectoryUser>> {
		let map = self.0.clone();
		let user = user.to_owned();

		Box::pin(async move { Ok(map.read().get(&user).map(|stored| stored.user.clone())) })
	}

	fn verify_password<'a>(
		&'a self,
		user: &'a UserRef,
		password: &'a str,
	) -> StoreFuture<'a, bool> {
		let map = self.0.clone();
		let user = user.to_owned();
		let password = password.to_owned();

		Box::pin(async move { Ok(Self::verify_now(map, user, password)) })
	}
}

/// Directory that knows no users; every lookup misses.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyDirectory;
impl Directory for EmptyDirectory {
	fn find_user<'a>(
		&'a self,
		_: &'a [String],
		_: &'a str,
	) -> StoreFuture<'a, Option<DirectoryUser>> {
		Box::pin(async { Ok(None) })
	}

	fn lookup<'a>(&'a self, _: &'a UserRef) -> StoreFuture<'a, Option<DirectoryUser>> {
		Box::pin(async { Ok(None) })
	}

	fn verify_password<'a>(&'a self, _: &'a UserRef, _: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async { Ok(false) })
	}
}

fn hash_password(password: &str) -> [u8; 32] {
	let mut hasher = Sha256::new();

	hasher.update(password.as_bytes());

	hasher.finalize().into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn memory_directory_finds_by_username_and_email() {
		let directory = MemoryDirectory::default();

		directory
			.add_user("alice", Some("alice@example.com"), None, "hunter2")
			.expect("Fixture user should be valid.");

		let by_username = directory
			.find_user(&["username".into()], "alice")
			.await
			.expect("Lookup should not fail.");

		assert!(by_username.is_some());

		let by_email = directory
			.find_user(&["email".into()], "alice@example.com")
			.await
			.expect("Lookup should not fail.");

		assert!(by_email.is_some());

		let miss = directory
			.find_user(&["username".into()], "alice@example.com")
			.await
			.expect("Lookup should not fail.");

		assert!(miss.is_none(), "Email identifiers must not match the username field.");
	}

	#[tokio::test]
	async fn password_verification_respects_deactivation() {
		let directory = MemoryDirectory::default();
		let alice = directory
			.add_user("alice", None, None, "hunter2")
			.expect("Fixture user should be valid.");

		assert!(
			directory.verify_password(&alice, "hunter2").await.expect("Verify should not fail.")
		);
		assert!(
			!directory.verify_password(&alice, "wrong").await.expect("Verify should not fail.")
		);

		directory.deactivate(&alice);

		assert!(
			!directory.verify_password(&alice, "hunter2").await.expect("Verify should not fail."),
			"Inactive users must fail verification."
		);
	}
}
