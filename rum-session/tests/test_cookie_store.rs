use std::sync::Arc;
use std::time::Duration;

use rum_common::{ManualClock, SessionId, UnixMillis};
use rum_session::{
    CookiePersistence, DocumentCookie, MemoryDocumentCookie, SESSION_STORAGE_KEY, Session,
    SessionPersistence, SessionStore, SessionStoreConfig,
};

fn store(document: &MemoryDocumentCookie, clock: &ManualClock) -> SessionStore {
    SessionStore::new(
        Arc::new(CookiePersistence::new(Arc::new(document.clone()), None)),
        Arc::new(clock.clone()),
        SessionStoreConfig::default(),
    )
}

#[test]
fn test_session_persisted_in_cookie() {
    rum_test::setup();

    let document = MemoryDocumentCookie::new();
    let clock = ManualClock::new(UnixMillis::from_millis(1_000));
    let session = store(&document, &clock).start_or_renew_session(false);

    let cookies = document.get();
    assert!(cookies.starts_with(&format!("{SESSION_STORAGE_KEY}=%7B%22id%22")));

    let persistence = CookiePersistence::new(Arc::new(document.clone()), None);
    let raw = persistence.read(SESSION_STORAGE_KEY).unwrap();
    assert_eq!(Session::decode(&raw).unwrap(), session);
}

#[test]
fn test_existing_cookie_is_used() {
    let document = MemoryDocumentCookie::new();
    let clock = ManualClock::new(UnixMillis::from_millis(5_000));

    let low = Session {
        id: SessionId::parse(&"0".repeat(32)).unwrap(),
        start_time: UnixMillis::from_millis(4_000),
        expires_at: UnixMillis::from_millis(4_000) + Duration::from_secs(900),
    };
    document.set(&format!(
        "{SESSION_STORAGE_KEY}={}; Path=/; Max-Age=10",
        low.encode()
    ));

    let store = store(&document, &clock);
    assert_eq!(store.start_or_renew_session(false), low);
}

#[test]
fn test_last_write_wins_across_tabs() {
    let document = MemoryDocumentCookie::new();
    let clock = ManualClock::new(UnixMillis::from_millis(1_000));

    let first_tab = store(&document, &clock);
    let second_tab = store(&document, &clock);

    let first = first_tab.start_or_renew_session(false);
    let forced = second_tab.force_new_session();
    assert_ne!(first.id, forced.id);

    // The first tab observes the session written by the second one.
    assert_eq!(first_tab.get_current_session(), Some(forced));
}
