mod common;

use common::{harness, FakeBackend, FakeCatalog};
use mitsuke_api::backend::AuthError;
use mitsuke_api::traits::{CredentialProvider, ProfilePatch, RegistrationFields, UserId};
use mitsuke_runtime::RuntimeError;

#[tokio::test]
async fn test_login_starts_session() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());

    let user = h.runtime.login("rin", "secret").await.unwrap();

    assert_eq!(user.user_id, UserId(7));
    assert_eq!(h.runtime.current_user(), Some(user));
    assert_eq!(h.runtime.session().credential().as_deref(), Some("jwt-7"));
}

#[tokio::test]
async fn test_bad_credentials_leave_session_empty() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());

    let err = h.runtime.login("rin", "wrong").await.unwrap_err();

    assert!(matches!(err, RuntimeError::Auth(AuthError::InvalidCredentials(_))));
    assert_eq!(h.runtime.current_user(), None);
}

#[tokio::test]
async fn test_unverified_login_is_distinct() {
    let backend = FakeBackend::new();
    backend.set_unverified();
    let h = harness(FakeCatalog::new(), backend);

    let err = h.runtime.login("rin", "secret").await.unwrap_err();

    assert!(matches!(err, RuntimeError::Auth(AuthError::Unverified(_))));
    assert_eq!(h.runtime.current_user(), None);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    h.runtime.login("rin", "secret").await.unwrap();

    h.runtime.logout().unwrap();

    assert_eq!(h.runtime.current_user(), None);
    assert_eq!(h.runtime.session().credential(), None);
}

#[tokio::test]
async fn test_register_requires_fields() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    let mut fields = RegistrationFields {
        username: "rin".into(),
        email: String::new(),
        first_name: "Rin".into(),
        last_name: "Shima".into(),
        password: "secret".into(),
    };
    assert!(matches!(
        h.runtime.register(&fields).await,
        Err(RuntimeError::Validation(_))
    ));

    fields.email = "rin@example.com".into();
    let user = h.runtime.register(&fields).await.unwrap();
    assert_eq!(user.username, "rin");
    // Registration does not sign in.
    assert_eq!(h.runtime.current_user(), None);
}

#[tokio::test]
async fn test_reset_password_checks() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());

    let missing = h.runtime.reset_password(None, "a", "a").await.unwrap_err();
    assert!(matches!(missing, RuntimeError::Auth(AuthError::InvalidToken)));

    let mismatch = h
        .runtime
        .reset_password(Some("good"), "hunter2", "hunter3")
        .await
        .unwrap_err();
    assert!(matches!(mismatch, RuntimeError::Validation(ref m) if m == "Passwords do not match."));

    let expired = h
        .runtime
        .reset_password(Some("expired"), "hunter2", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(expired, RuntimeError::Auth(AuthError::ExpiredToken)));

    let used = h
        .runtime
        .reset_password(Some("used"), "hunter2", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(used, RuntimeError::Auth(AuthError::UsedToken)));

    let ok = h
        .runtime
        .reset_password(Some("good"), "hunter2", "hunter2")
        .await
        .unwrap();
    assert_eq!(ok, "Password reset.");
}

#[tokio::test]
async fn test_verify_and_resend() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());

    assert_eq!(h.runtime.verify_account("good").await.unwrap(), "Account verified.");
    assert!(matches!(
        h.runtime.verify_account("").await,
        Err(RuntimeError::Auth(AuthError::InvalidToken))
    ));
    assert!(matches!(
        h.runtime.resend_verification(UserId(7)).await,
        Err(RuntimeError::Auth(AuthError::RateLimited))
    ));
}

#[tokio::test]
async fn test_profile_requires_login() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    assert!(matches!(h.runtime.profile().await, Err(RuntimeError::NotLoggedIn)));

    h.runtime.login("rin", "secret").await.unwrap();
    let profile = h.runtime.profile().await.unwrap();
    assert_eq!(profile.first_name, "Rin");
}

#[tokio::test]
async fn test_update_profile_refreshes_session_user() {
    let h = harness(FakeCatalog::new(), FakeBackend::new());
    h.runtime.login("rin", "secret").await.unwrap();

    let updated = h
        .runtime
        .update_profile(ProfilePatch {
            username: "rin.shima".into(),
            email: "rin@camp.example".into(),
            first_name: "Rin".into(),
            last_name: "Shima".into(),
            password: Some(String::new()),
        })
        .await
        .unwrap();

    assert_eq!(updated.username, "rin.shima");
    assert_eq!(h.runtime.current_user(), Some(updated));
    assert_eq!(h.runtime.session().credential().as_deref(), Some("jwt-7"));
}
