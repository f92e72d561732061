use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cookie::{Cookie, SameSite};
use parking_lot::Mutex;

use rum_common::{KeyValueStorage, StorageError};

/// A medium in which session state is persisted.
///
/// All tabs of an origin share the medium. Writes to a single key are atomic, but there is no
/// locking across keys or tabs: the last write wins.
pub trait SessionPersistence: Send + Sync {
    /// Reads the raw value stored under `key`.
    fn read(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    ///
    /// Mediums that support expiry drop the value after `max_age`.
    fn write(&self, key: &str, value: &str, max_age: Duration) -> Result<(), StorageError>;

    /// Deletes the value stored under `key`.
    fn remove(&self, key: &str);
}

/// Access to the cookies of the current document, with the semantics of `document.cookie`.
///
/// Reading returns all cookies visible to the document as `name=value` pairs separated by
/// `"; "`. Writing takes a single `Set-Cookie` style string and creates, replaces or, if its
/// `Max-Age` is zero, deletes one cookie.
pub trait DocumentCookie: Send + Sync {
    /// Returns the cookie string of the document.
    fn get(&self) -> String;

    /// Sets a single cookie.
    fn set(&self, cookie: &str);
}

/// Persists session state in a first-party cookie.
///
/// With a cookie domain, the session is shared across subdomains.
pub struct CookiePersistence {
    document: Arc<dyn DocumentCookie>,
    domain: Option<String>,
}

impl CookiePersistence {
    /// Creates a cookie persistence, optionally scoped to `domain`.
    pub fn new(document: Arc<dyn DocumentCookie>, domain: Option<String>) -> Self {
        Self { document, domain }
    }

    fn cookie<'a>(&self, key: &'a str, value: &'a str, max_age: Duration) -> Cookie<'a> {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);

        let mut builder = Cookie::build((key, value))
            .path("/")
            .same_site(SameSite::Strict)
            .max_age(cookie::time::Duration::seconds(max_age));

        if let Some(ref domain) = self.domain {
            builder = builder.domain(domain.clone());
        }

        builder.build()
    }
}

impl fmt::Debug for CookiePersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookiePersistence")
            .field("domain", &self.domain)
            .finish()
    }
}

impl SessionPersistence for CookiePersistence {
    fn read(&self, key: &str) -> Option<String> {
        let cookies = self.document.get();

        Cookie::split_parse(cookies.as_str())
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == key)
            .map(|cookie| cookie.value().to_owned())
    }

    fn write(&self, key: &str, value: &str, max_age: Duration) -> Result<(), StorageError> {
        self.document
            .set(&self.cookie(key, value, max_age).to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.document
            .set(&self.cookie(key, "", Duration::ZERO).to_string());
    }
}

/// Persists session state in the origin's local storage.
///
/// Local storage has no expiry, the persisted record carries its own expiration time.
#[derive(Debug)]
pub struct LocalStoragePersistence<S> {
    storage: S,
}

impl<S: KeyValueStorage> LocalStoragePersistence<S> {
    /// Creates a persistence backed by `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

impl<S: KeyValueStorage> SessionPersistence for LocalStoragePersistence<S> {
    fn read(&self, key: &str) -> Option<String> {
        self.storage.get_item(key)
    }

    fn write(&self, key: &str, value: &str, _max_age: Duration) -> Result<(), StorageError> {
        self.storage.set_item(key, value)
    }

    fn remove(&self, key: &str) {
        self.storage.remove_item(key)
    }
}

/// An in-memory [`DocumentCookie`].
///
/// Clones share their cookies, which makes it usable to simulate several tabs. Cookie
/// attributes other than `Max-Age` are accepted and ignored.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentCookie {
    jar: Arc<Mutex<cookie::CookieJar>>,
}

impl MemoryDocumentCookie {
    /// Creates an empty cookie store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentCookie for MemoryDocumentCookie {
    fn get(&self) -> String {
        let jar = self.jar.lock();
        let pairs: Vec<_> = jar
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect();
        pairs.join("; ")
    }

    fn set(&self, cookie: &str) {
        let cookie = match Cookie::parse(cookie.to_owned()) {
            Ok(cookie) => cookie,
            Err(error) => {
                rum_log::debug!("ignoring malformed cookie: {error}");
                return;
            }
        };

        let mut jar = self.jar.lock();
        match cookie.max_age() {
            Some(max_age) if max_age <= cookie::time::Duration::ZERO => {
                jar.remove(Cookie::from(cookie.name().to_owned()))
            }
            _ => jar.add(cookie),
        }
    }
}

#[cfg(test)]
mod tests {
    use rum_common::MemoryStorage;

    use super::*;

    #[test]
    fn test_cookie_attributes() {
        let document = Arc::new(MemoryDocumentCookie::new());
        let persistence = CookiePersistence::new(document, Some("example.com".to_owned()));

        let cookie = persistence
            .cookie("_rum_sid", "value", Duration::from_secs(60))
            .to_string();

        assert!(cookie.starts_with("_rum_sid=value"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Domain=example.com"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Max-Age=60"));
    }

    #[test]
    fn test_cookie_roundtrip() {
        let document = Arc::new(MemoryDocumentCookie::new());
        document.set("unrelated=1; Path=/");

        let persistence = CookiePersistence::new(document.clone(), None);
        persistence
            .write("_rum_sid", "%7B%7D", Duration::from_secs(60))
            .unwrap();

        assert_eq!(persistence.read("_rum_sid").as_deref(), Some("%7B%7D"));
        assert_eq!(persistence.read("missing"), None);

        persistence.remove("_rum_sid");
        assert_eq!(persistence.read("_rum_sid"), None);
        assert_eq!(document.get(), "unrelated=1");
    }

    #[test]
    fn test_local_storage() {
        let storage = MemoryStorage::new();
        let persistence = LocalStoragePersistence::new(storage.clone());

        persistence.write("k", "v", Duration::ZERO).unwrap();
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));

        persistence.remove("k");
        assert_eq!(persistence.read("k"), None);
    }
}
