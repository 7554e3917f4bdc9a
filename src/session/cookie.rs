use async_trait::async_trait;
use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{Session, SessionError, SessionStore};

type HmacSha256 = Hmac<Sha256>;

pub const MIN_KEY_LEN: usize = 32;
/// Ten years.
pub const MAX_AGE_CAP_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Serialize, Deserialize)]
struct Payload {
    exp: i64,
    values: Map<String, Value>,
}

/// Keeps the whole session in the cookie: `base64(json).base64(hmac)`.
///
/// The MAC covers the cookie name and the payload, so a value cannot be
/// replayed under another session name. Expiry is enforced both through
/// `Max-Age` and an `exp` stamp inside the signed payload.
pub struct CookieStore {
    key: Vec<u8>,
    max_age_secs: i64,
    secure: bool,
}

impl CookieStore {
    pub fn new(key: &[u8], max_age_secs: u64, secure: bool) -> Result<Self, SessionError> {
        if key.len() < MIN_KEY_LEN {
            return Err(SessionError::WeakKey { min: MIN_KEY_LEN });
        }
        let invalid = SessionError::InvalidMaxAge {
            got: max_age_secs,
            max: MAX_AGE_CAP_SECS,
        };
        if max_age_secs == 0 || max_age_secs > MAX_AGE_CAP_SECS {
            return Err(invalid);
        }
        let max_age_secs = i64::try_from(max_age_secs).map_err(|_| invalid)?;
        Ok(Self {
            key: key.to_vec(),
            max_age_secs,
            secure,
        })
    }

    fn mac(&self, name: &str, payload: &str) -> Result<HmacSha256, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    fn encode(&self, session: &Session, now: i64) -> Result<String, SessionError> {
        let payload = Payload {
            exp: now
                .checked_add(self.max_age_secs)
                .ok_or(SessionError::ExpiryOverflow)?,
            values: session.values().clone(),
        };
        let payload = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&payload)?);
        let tag = self.mac(session.name(), &payload)?.finalize().into_bytes();
        Ok(format!("{payload}.{}", Base64UrlUnpadded::encode_string(&tag)))
    }

    /// `None` for anything that is not a live value signed with our key.
    fn decode(&self, name: &str, value: &str, now: i64) -> Option<Map<String, Value>> {
        let (payload, tag) = value.split_once('.')?;
        let tag = Base64UrlUnpadded::decode_vec(tag).ok()?;
        self.mac(name, payload).ok()?.verify_slice(&tag).ok()?;

        let raw = Base64UrlUnpadded::decode_vec(payload).ok()?;
        let payload: Payload = serde_json::from_slice(&raw).ok()?;
        if payload.exp <= now {
            debug!(session = name, "session cookie expired");
            return None;
        }
        Some(payload.values)
    }

    fn cookie_header(&self, name: &str, value: &str) -> Result<HeaderValue, SessionError> {
        let mut cookie = format!(
            "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
}

#[async_trait]
impl SessionStore for CookieStore {
    async fn get(&self, headers: &HeaderMap, name: &str) -> Result<Session, SessionError> {
        let Some(value) = extract_cookie(headers, name) else {
            return Ok(Session::new(name));
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        match self.decode(name, value, now) {
            Some(values) => Ok(Session::with_values(name, values)),
            None => {
                warn!(session = name, "discarding invalid session cookie");
                Ok(Session::new(name))
            }
        }
    }

    async fn save(&self, response_headers: &mut HeaderMap, session: &Session) -> Result<(), SessionError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let value = self.encode(session, now)?;
        response_headers.append(SET_COOKIE, self.cookie_header(session.name(), &value)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SESSION_NAME, USER_ID_KEY};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn store() -> CookieStore {
        CookieStore::new(KEY, 3600, false).unwrap()
    }

    /// Turns a `Set-Cookie` response into the `Cookie` header a browser would send back.
    fn echo_cookie(response: &HeaderMap) -> HeaderMap {
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(pair).unwrap());
        headers
    }

    async fn saved_session(store: &CookieStore) -> HeaderMap {
        let mut session = Session::new(SESSION_NAME);
        session.insert(USER_ID_KEY, 1).unwrap();
        let mut response = HeaderMap::new();
        store.save(&mut response, &session).await.unwrap();
        response
    }

    #[test]
    fn rejects_short_key() {
        assert!(matches!(
            CookieStore::new(b"short", 60, false),
            Err(SessionError::WeakKey { min: MIN_KEY_LEN })
        ));
    }

    #[test]
    fn rejects_out_of_range_max_age() {
        for max_age in [0, MAX_AGE_CAP_SECS + 1, i64::MAX as u64, u64::MAX] {
            assert!(
                matches!(
                    CookieStore::new(KEY, max_age, false),
                    Err(SessionError::InvalidMaxAge { got, max: MAX_AGE_CAP_SECS }) if got == max_age
                ),
                "{max_age}"
            );
        }
        assert!(CookieStore::new(KEY, MAX_AGE_CAP_SECS, false).is_ok());
    }

    #[test]
    fn longest_max_age_still_outlives_now() {
        let store = CookieStore::new(KEY, MAX_AGE_CAP_SECS, false).unwrap();
        let value = store.encode(&Session::new(SESSION_NAME), 1_000).unwrap();
        assert!(store.decode(SESSION_NAME, &value, 1_001).is_some());
    }

    #[test]
    fn expiry_overflow_is_an_error() {
        let err = store().encode(&Session::new(SESSION_NAME), i64::MAX - 10).unwrap_err();
        assert!(matches!(err, SessionError::ExpiryOverflow));
    }

    #[tokio::test]
    async fn missing_cookie_gives_empty_session() {
        let session = store().get(&HeaderMap::new(), SESSION_NAME).await.unwrap();
        assert_eq!(session.name(), SESSION_NAME);
        assert!(session.values().is_empty());
    }

    #[tokio::test]
    async fn saved_values_come_back() {
        let store = store();
        let response = saved_session(&store).await;

        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with("ebweb="));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=3600"));
        assert!(!set_cookie.contains("Secure"));

        let session = store.get(&echo_cookie(&response), SESSION_NAME).await.unwrap();
        assert_eq!(session.get::<i32>(USER_ID_KEY), Some(1));
    }

    #[tokio::test]
    async fn finds_cookie_among_others() {
        let store = store();
        let response = saved_session(&store).await;
        let pair = echo_cookie(&response);
        let pair = pair.get(COOKIE).unwrap().to_str().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {pair}; lang=en")).unwrap(),
        );
        let session = store.get(&headers, SESSION_NAME).await.unwrap();
        assert_eq!(session.get::<i32>(USER_ID_KEY), Some(1));
    }

    #[tokio::test]
    async fn secure_flag() {
        let store = CookieStore::new(KEY, 60, true).unwrap();
        let response = saved_session(&store).await;
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.ends_with("; Secure"));
    }

    #[tokio::test]
    async fn tampered_payload_is_discarded() {
        let store = store();
        let response = saved_session(&store).await;
        let headers = echo_cookie(&response);
        let cookie = headers.get(COOKIE).unwrap().to_str().unwrap();
        let (_, signed) = cookie.split_once('=').unwrap();
        let (_, tag) = signed.split_once('.').unwrap();

        let forged = Payload {
            exp: i64::MAX,
            values: serde_json::json!({"user_id": 2}).as_object().unwrap().clone(),
        };
        let forged = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&forged).unwrap());

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{SESSION_NAME}={forged}.{tag}")).unwrap(),
        );
        let session = store.get(&headers, SESSION_NAME).await.unwrap();
        assert!(session.values().is_empty());
    }

    #[tokio::test]
    async fn other_key_is_discarded() {
        let response = saved_session(&store()).await;
        let other = CookieStore::new(b"fedcba9876543210fedcba9876543210", 3600, false).unwrap();
        let session = other.get(&echo_cookie(&response), SESSION_NAME).await.unwrap();
        assert!(session.values().is_empty());
    }

    #[tokio::test]
    async fn garbage_is_discarded() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("ebweb=not-a-session"));
        let session = store().get(&headers, SESSION_NAME).await.unwrap();
        assert!(session.values().is_empty());
    }

    #[test]
    fn expired_payload_is_discarded() {
        let store = store();
        let mut session = Session::new(SESSION_NAME);
        session.insert(USER_ID_KEY, 1).unwrap();
        let value = store.encode(&session, 1_000).unwrap();

        assert!(store.decode(SESSION_NAME, &value, 1_000 + 3599).is_some());
        assert!(store.decode(SESSION_NAME, &value, 1_000 + 3600).is_none());
    }

    #[test]
    fn signature_is_bound_to_cookie_name() {
        let store = store();
        let value = store.encode(&Session::new(SESSION_NAME), 0).unwrap();
        assert!(store.decode(SESSION_NAME, &value, 1).is_some());
        assert!(store.decode("other", &value, 1).is_none());
    }
}
