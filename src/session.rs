use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// How long a session stays valid after logging in.
pub const SESSION_TTL_DAYS: i64 = 30;

pub fn expires_at(created_at: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
	created_at + chrono::Duration::days(SESSION_TTL_DAYS)
}

/// Creates an httpOnly session cookie that expires together with the session.
pub fn create_cookie(session_id: Uuid, secure: bool) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(secure)
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.max_age(cookie::time::Duration::days(SESSION_TTL_DAYS))
		.path("/")
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie(secure: bool) -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.secure(secure)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

#[cfg(test)]
mod test {
	#[test]
	fn test_create_cookie() {
		let id = uuid::Uuid::new_v4();
		let cookie = super::create_cookie(id, true);

		assert_eq!(cookie.name(), super::COOKIE_NAME);
		assert_eq!(cookie.value(), id.to_string());
		assert_eq!(cookie.http_only(), Some(true));
		assert_eq!(cookie.secure(), Some(true));
	}

	#[test]
	fn test_clear_cookie() {
		let cookie = super::clear_cookie(false);

		assert_eq!(cookie.value(), "");
		assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
	}
}
