//! End-to-end runs of the login state machine through the relay facade

use chrono::Utc;

use std::sync::Arc;

use login_relay::{
    BroadcastNotifier, ConfigError, LoginError, LoginOutcome, LoginRelay, RelayConfig, LoginState, NotificationOutcome, OperationKind, OperationPayload,
    OperationToken, PendingOperation, QueueStatus, Rejection, RetryOutcome, UserId,
};

use crate::harness::{test_config, MapSessions, ScriptedQueue, TestEnvironment};

#[tokio::test]
async fn test_immediate_password_success_notifies_without_caching() {
    let env = TestEnvironment::new();
    let user = UserId::from("alice#0001");
    env.sessions.log_in(&user, "alice");
    env.queue.then_complete(LoginOutcome::succeeded());

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::password_login("alice", "pw"), None)
        .await;

    assert_eq!(
        state,
        LoginState::Succeeded {
            username: "alice".to_string()
        }
    );
    assert!(env.relay.cache().is_empty());
    assert_eq!(env.queue.polls.load(std::sync::atomic::Ordering::SeqCst), 0);

    let notifications = env.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, user);
    assert_eq!(
        notifications[0].outcome,
        NotificationOutcome::LoggedIn {
            kind: OperationKind::PasswordLogin,
            username: "alice".to_string()
        }
    );
}

#[tokio::test]
async fn test_backend_error_caches_operation_with_fresh_token() {
    let env = TestEnvironment::new();
    let user = UserId::from("bob#0002");
    env.queue.then_complete(LoginOutcome::errored("timeout"));

    let state = env
        .relay
        .submit_and_track(
            &user,
            OperationPayload::password_login("bob", "hunter2"),
            None,
        )
        .await;

    let token = match &state {
        LoginState::FailedRetryable { token, error } => {
            assert_eq!(*error, LoginError::backend("timeout"));
            *token
        }
        other => panic!("expected retryable failure, got {:?}", other),
    };
    assert!(token.value() < test_config().token_space);

    assert_eq!(env.relay.cache().len(), 1);
    let cached = env.relay.cache().lookup(token).unwrap();
    assert_eq!(cached.kind(), OperationKind::PasswordLogin);
    assert_eq!(cached.user_id, user);
    assert_eq!(
        cached.payload,
        OperationPayload::password_login("bob", "hunter2")
    );

    let notifications = env.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].retry_token(), Some(token));
    match &notifications[0].outcome {
        NotificationOutcome::RetryableFailure { kind, message, .. } => {
            assert_eq!(*kind, OperationKind::PasswordLogin);
            assert!(message.contains("timeout"));
        }
        other => panic!("unexpected notification {:?}", other),
    }
}

#[tokio::test]
async fn test_queued_submission_waits_for_processing() {
    let env = TestEnvironment::new();
    let user = UserId::from("carol#0003");
    env.sessions.log_in(&user, "carol");
    env.queue
        .then_queue(77)
        .then_status(QueueStatus::Pending)
        .then_status(QueueStatus::Pending)
        .then_status(QueueStatus::Pending)
        .then_status(QueueStatus::Processed(LoginOutcome::succeeded()));

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::password_login("carol", "pw"), None)
        .await;

    assert!(matches!(state, LoginState::Succeeded { .. }));
    assert_eq!(env.queue.polls.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert_eq!(*env.queue.polled_tokens.lock().unwrap(), vec![77; 4]);

    let notifications = env.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert!(matches!(
        notifications[0].outcome,
        NotificationOutcome::LoggedIn { .. }
    ));
}

#[tokio::test]
async fn test_retry_after_sweep_reports_expired() {
    let env = TestEnvironment::new();
    let user = UserId::from("dave#0004");
    let token = OperationToken::new(4242);
    env.relay.cache().insert(PendingOperation::stamped(
        token,
        user.clone(),
        OperationPayload::password_login("dave", "pw"),
        Utc::now() - chrono::Duration::minutes(10),
    ));

    // Configured timeout is five minutes
    assert_eq!(env.relay.sweep_now(), 1);

    let outcome = env.relay.retry(&user, token).await;

    assert_eq!(outcome, RetryOutcome::Expired);
    assert_eq!(env.queue.submission_count(), 0);
    let notifications = env.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0].outcome,
        NotificationOutcome::RetryExpired { token }
    );
}

#[tokio::test]
async fn test_second_factor_rejection_is_terminal() {
    let env = TestEnvironment::new();
    let user = UserId::from("erin#0005");
    let unrelated = PendingOperation::new(
        OperationToken::new(1),
        UserId::from("someone-else"),
        OperationPayload::second_factor("999999"),
    );
    env.relay.cache().insert(unrelated.clone());
    env.queue.then_complete(LoginOutcome::rejected(None));

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::second_factor("123456"), None)
        .await;

    assert_eq!(
        state,
        LoginState::FailedTerminal {
            rejection: Rejection::InvalidCode
        }
    );
    assert_eq!(env.relay.cache().len(), 1);
    assert_eq!(env.relay.cache().lookup(unrelated.token), Some(unrelated));

    let notifications = env.notifications().await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].retry_token(), None);
    assert_eq!(
        notifications[0].outcome,
        NotificationOutcome::Rejected {
            kind: OperationKind::SecondFactor,
            rejection: Rejection::InvalidCode
        }
    );
}

#[tokio::test]
async fn test_backend_rejection_reason_is_passed_through() {
    let env = TestEnvironment::new();
    let user = UserId::from("frank#0006");
    let rejection = Rejection::MfaRequired {
        method: "email".to_string(),
        destination: Some("f***@example.com".to_string()),
    };
    env.queue
        .then_complete(LoginOutcome::rejected(Some(rejection.clone())));

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::password_login("frank", "pw"), None)
        .await;

    assert_eq!(state, LoginState::FailedTerminal { rejection });
    assert!(env.relay.cache().is_empty());
}

#[tokio::test]
async fn test_success_without_session_is_retryable() {
    let env = TestEnvironment::new();
    let user = UserId::from("grace#0007");
    env.queue.then_complete(LoginOutcome::succeeded());

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::password_login("grace", "pw"), None)
        .await;

    match state {
        LoginState::FailedRetryable { token, error } => {
            assert_eq!(
                error,
                LoginError::SessionUnresolved {
                    user_id: user.clone()
                }
            );
            assert!(env.relay.cache().contains(token));
        }
        other => panic!("expected retryable failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submission_error_is_retryable() {
    let env = TestEnvironment::new();
    let user = UserId::from("heidi#0008");
    env.queue.then_fail("queue unavailable");

    let state = env
        .relay
        .submit_and_track(&user, OperationPayload::second_factor("424242"), None)
        .await;

    match state {
        LoginState::FailedRetryable { token, error } => {
            assert!(matches!(
                error,
                LoginError::SubmissionFailed {
                    kind: OperationKind::SecondFactor,
                    ..
                }
            ));
            assert_eq!(
                env.relay.cache().lookup(token).unwrap().payload,
                OperationPayload::second_factor("424242")
            );
        }
        other => panic!("expected retryable failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_zero_sweep_interval_is_rejected_at_construction() {
    let config = RelayConfig {
        sweep_interval_secs: 0,
        ..test_config()
    };

    let result = LoginRelay::new(
        &config,
        Arc::new(ScriptedQueue::new()),
        Arc::new(MapSessions::default()),
        Arc::new(BroadcastNotifier::default()),
    );

    match result {
        Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "sweep_interval_secs"),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("relay accepted a zero sweep interval"),
    }
}
