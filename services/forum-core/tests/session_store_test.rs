use std::sync::Arc;

use chrono::Duration;
use forum_common::{Clock, ManualClock, UserId};
use forum_core::application::SessionStore;
use forum_core::config::SessionPolicy;
use forum_core::domain::repositories::{SessionRepository, UserRepository};
use forum_core::domain::{Email, NewUser, Session, SessionContext, SessionKind, SessionSubject, Username};
use forum_core::infrastructure::persistence::{MemorySessionRepository, MemoryUserRepository};
use forum_errors::AppError;
use tokio_test::assert_ok;

struct Fixture {
    clock: Arc<ManualClock>,
    sessions: Arc<MemorySessionRepository>,
    users: Arc<MemoryUserRepository>,
    store: SessionStore,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::starting_now());
    let users = Arc::new(MemoryUserRepository::new());
    let sessions = Arc::new(MemorySessionRepository::new(users.clone()));
    let store = SessionStore::new(
        sessions.clone(),
        users.clone(),
        clock.clone(),
        SessionPolicy::default(),
    );
    Fixture {
        clock,
        sessions,
        users,
        store,
    }
}

async fn create_user(users: &MemoryUserRepository, name: &str) -> UserId {
    let user = NewUser {
        username: Username::new(name).unwrap(),
        email: Email::new(format!("{}@example.com", name)).unwrap(),
        password_hash: "hash".to_string(),
        created_at: chrono::Utc::now(),
    };
    users.insert(&user).await.unwrap().id
}

#[tokio::test]
async fn test_guest_session_expires_after_24_hours() {
    let f = fixture();
    let issued = f.store.create_guest().await.unwrap();

    assert_eq!(issued.kind, SessionKind::Guest);
    assert_eq!(issued.expires_at, f.clock.now() + Duration::hours(24));
    assert_eq!(
        f.store.validate(issued.token.as_str()).await.unwrap(),
        Some(SessionContext::Guest)
    );
}

#[tokio::test]
async fn test_authenticated_session_resolves_user() {
    let f = fixture();
    let user_id = create_user(&f.users, "alice").await;

    let issued = f
        .store
        .create_authenticated(user_id, Duration::hours(24))
        .await
        .unwrap();

    let context = f.store.validate(issued.token.as_str()).await.unwrap().unwrap();
    assert_eq!(context.kind(), SessionKind::Authenticated);
    assert_eq!(context.user().map(|u| u.id), Some(user_id));
}

#[tokio::test]
async fn test_second_login_invalidates_first_token() {
    let f = fixture();
    let user_id = create_user(&f.users, "alice").await;
    let guest = f.store.create_guest().await.unwrap();

    let first = f.store.create_authenticated_default(user_id).await.unwrap();
    let second = f.store.create_authenticated_default(user_id).await.unwrap();

    assert_ne!(first.token, second.token);
    assert!(f.store.validate(first.token.as_str()).await.unwrap().is_none());
    assert!(f.store.validate(second.token.as_str()).await.unwrap().is_some());
    // 游客会话不受单会话规则影响
    assert!(f.store.validate(guest.token.as_str()).await.unwrap().is_some());

    let counts = f.store.active_count().await.unwrap();
    assert_eq!(counts.authenticated, 1);
    assert_eq!(counts.guest, 1);
}

#[tokio::test]
async fn test_concurrent_logins_leave_one_session() {
    let f = fixture();
    let user_id = create_user(&f.users, "alice").await;
    let store = Arc::new(f.store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.create_authenticated_default(user_id).await })
        })
        .collect();

    let tokens: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().token)
        .collect();

    let mut valid = 0;
    for token in &tokens {
        if store.validate(token.as_str()).await.unwrap().is_some() {
            valid += 1;
        }
    }
    assert_eq!(valid, 1);
    assert_eq!(f.sessions.len().await, 1);
}

#[tokio::test]
async fn test_expired_session_is_invalid() {
    let f = fixture();
    let issued = f.store.create_guest().await.unwrap();

    f.clock.advance(Duration::hours(24));
    assert!(f.store.validate(issued.token.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_validate_unknown_token_is_not_an_error() {
    let f = fixture();
    let result = assert_ok!(f.store.validate("no-such-token").await);
    assert!(result.is_none());
}

#[tokio::test]
async fn test_session_for_deleted_user_is_invalid() {
    let f = fixture();
    let user_id = create_user(&f.users, "leaving").await;
    let issued = f.store.create_authenticated_default(user_id).await.unwrap();
    assert!(f.store.validate(issued.token.as_str()).await.unwrap().is_some());

    assert!(f.users.remove(user_id).await);
    assert!(f.store.validate(issued.token.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_authenticated_session_for_unknown_user_is_rejected() {
    let f = fixture();
    let err = f
        .store
        .create_authenticated_default(UserId(404))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert!(f.sessions.is_empty().await);
}

#[tokio::test]
async fn test_sweep_removes_only_expired_sessions() {
    let f = fixture();
    let now = f.clock.now();

    f.sessions
        .insert(&Session::new(
            "expired".to_string(),
            SessionSubject::Guest,
            now - Duration::hours(1),
            Duration::hours(1) - Duration::seconds(1),
        ))
        .await
        .unwrap();
    f.sessions
        .insert(&Session::new(
            "live".to_string(),
            SessionSubject::Guest,
            now,
            Duration::hours(1),
        ))
        .await
        .unwrap();

    assert_eq!(f.store.sweep().await.unwrap(), 1);
    assert!(f.sessions.find_by_token_hash("expired").await.unwrap().is_none());
    assert!(f.sessions.find_by_token_hash("live").await.unwrap().is_some());
    assert_eq!(f.store.sweep().await.unwrap(), 0);
}

#[tokio::test]
async fn test_revoke_is_idempotent() {
    let f = fixture();
    let issued = f.store.create_guest().await.unwrap();

    assert_ok!(f.store.revoke(issued.token.as_str()).await);
    assert_ok!(f.store.revoke(issued.token.as_str()).await);
    assert!(f.store.validate(issued.token.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_touch_updates_activity_and_duration() {
    let f = fixture();
    let issued = f.store.create_guest().await.unwrap();

    f.clock.advance(Duration::minutes(10));
    f.store.touch(issued.token.as_str()).await;

    let duration = f
        .store
        .session_duration(issued.token.as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(duration, Duration::minutes(10));
    // expiry does not move with activity
    f.clock.advance(Duration::hours(24));
    assert!(f.store.validate(issued.token.as_str()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_active_count_uses_recency_window() {
    let f = fixture();
    f.store.create_guest().await.unwrap();
    let recent = f.store.create_guest().await.unwrap();

    f.clock.advance(Duration::minutes(10));
    f.store.touch(recent.token.as_str()).await;

    let counts = f.store.active_count().await.unwrap();
    assert_eq!(counts.guest, 1);
    assert_eq!(counts.authenticated, 0);
    assert_eq!(counts.total(), 1);
}

#[tokio::test]
async fn test_active_count_skips_recently_active_but_expired_sessions() {
    let f = fixture();
    let now = f.clock.now();
    let mut lapsed = Session::new(
        "lapsed".to_string(),
        SessionSubject::Guest,
        now - Duration::hours(24),
        Duration::hours(24) - Duration::minutes(1),
    );
    lapsed.last_activity_at = now - Duration::minutes(2);
    f.sessions.insert(&lapsed).await.unwrap();

    let counts = f.store.active_count().await.unwrap();
    assert_eq!(counts.total(), 0);
}

#[tokio::test]
async fn test_authenticate_request_flow() {
    let f = fixture();

    let first = f.store.authenticate_request(None).await;
    assert_eq!(first.context, SessionContext::Guest);
    let issued = first.issued.expect("guest session issued");

    let second = f.store.authenticate_request(Some(issued.token.as_str())).await;
    assert_eq!(second.context, SessionContext::Guest);
    assert!(second.issued.is_none());
    assert!(!second.clear_token);

    let stale = f.store.authenticate_request(Some("stale-token")).await;
    assert_eq!(stale.context, SessionContext::Guest);
    assert!(stale.issued.is_none());
    assert!(stale.clear_token);
}
