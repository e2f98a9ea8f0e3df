//! Retry dispatch through cached tokens

use std::time::Duration;

use login_relay::{
    LoginOutcome, LoginState, NotificationOutcome, OperationPayload, OperationToken, QueueStatus,
    Rejection, RetryOutcome, UserId,
};

use crate::harness::TestEnvironment;

async fn fail_once(
    env: &TestEnvironment,
    user: &UserId,
    payload: OperationPayload,
) -> OperationToken {
    env.queue.then_complete(LoginOutcome::errored("timeout"));
    env.relay
        .submit_and_track(user, payload, None)
        .await
        .retry_token()
        .expect("first attempt should be retryable")
}

#[tokio::test]
async fn test_repeated_failures_reuse_the_same_token() {
    let env = TestEnvironment::new();
    let user = UserId::from("ivan#0009");
    env.queue.always_complete(LoginOutcome::errored("timeout"));

    let token = env
        .relay
        .submit_and_track(&user, OperationPayload::password_login("ivan", "pw"), None)
        .await
        .retry_token()
        .unwrap();
    let mut last_failure = env.relay.cache().lookup(token).unwrap().created_at;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(2)).await;
        match env.relay.retry(&user, token).await {
            RetryOutcome::Dispatched(LoginState::FailedRetryable { token: again, .. }) => {
                assert_eq!(again, token)
            }
            other => panic!("unexpected retry outcome {:?}", other),
        }

        assert_eq!(env.relay.cache().len(), 1);
        let refreshed = env.relay.cache().lookup(token).unwrap().created_at;
        assert!(refreshed > last_failure);
        last_failure = refreshed;
    }

    // Every attempt re-submitted the stored credentials
    let submissions = env.queue.password_submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 4);
    assert!(submissions
        .iter()
        .all(|(id, username, password)| id == &user && username == "ivan" && password == "pw"));

    let offered: Vec<_> = env
        .notifications()
        .await
        .iter()
        .filter_map(|n| n.retry_token())
        .collect();
    assert_eq!(offered, vec![token; 4]);
}

#[tokio::test]
async fn test_successful_password_retry_removes_entry() {
    let env = TestEnvironment::new();
    let user = UserId::from("judy#0010");
    let token = fail_once(&env, &user, OperationPayload::password_login("judy", "pw")).await;

    env.sessions.log_in(&user, "judy");
    env.queue.then_complete(LoginOutcome::succeeded());

    let outcome = env.relay.retry(&user, token).await;

    assert_eq!(
        outcome,
        RetryOutcome::Dispatched(LoginState::Succeeded {
            username: "judy".to_string()
        })
    );
    assert!(!env.relay.cache().contains(token));
}

#[tokio::test]
async fn test_successful_second_factor_retry_removes_entry() {
    let env = TestEnvironment::new();
    let user = UserId::from("mallory#0011");
    let token = fail_once(&env, &user, OperationPayload::second_factor("314159")).await;

    env.sessions.log_in(&user, "mallory");
    env.queue
        .then_queue(5)
        .then_status(QueueStatus::Processed(LoginOutcome::succeeded()));

    let outcome = env.relay.retry(&user, token).await;

    assert!(matches!(
        outcome,
        RetryOutcome::Dispatched(LoginState::Succeeded { .. })
    ));
    assert!(env.relay.cache().is_empty());
    let codes = env.queue.code_submissions.lock().unwrap().clone();
    assert_eq!(codes.len(), 2);
    assert!(codes.iter().all(|(_, code)| code == "314159"));
}

#[tokio::test]
async fn test_retry_by_another_user_is_refused() {
    let env = TestEnvironment::new();
    let owner = UserId::from("niaj#0012");
    let intruder = UserId::from("oscar#0013");
    let token = fail_once(&env, &owner, OperationPayload::password_login("niaj", "pw")).await;

    let outcome = env.relay.retry(&intruder, token).await;

    assert_eq!(outcome, RetryOutcome::NotOwned);
    assert!(env.relay.cache().contains(token));
    assert_eq!(env.queue.submission_count(), 1);

    let last = env.notifications().await.pop().unwrap();
    assert_eq!(last.user_id, intruder);
    assert_eq!(last.outcome, NotificationOutcome::RetryNotOwned { token });
}

#[tokio::test]
async fn test_rejection_on_retry_leaves_entry_for_the_sweep() {
    let env = TestEnvironment::new();
    let user = UserId::from("peggy#0014");
    let token = fail_once(&env, &user, OperationPayload::password_login("peggy", "pw")).await;

    env.queue.then_complete(LoginOutcome::rejected(None));

    let outcome = env.relay.retry(&user, token).await;

    assert_eq!(
        outcome,
        RetryOutcome::Dispatched(LoginState::FailedTerminal {
            rejection: Rejection::InvalidCredentials
        })
    );
    assert!(env.relay.cache().contains(token));
}

#[tokio::test]
async fn test_unknown_token_is_expired() {
    let env = TestEnvironment::new();
    let user = UserId::from("rupert#0015");

    let outcome = env.relay.retry(&user, OperationToken::new(31337)).await;

    assert_eq!(outcome, RetryOutcome::Expired);
    assert_eq!(env.queue.submission_count(), 0);
}

#[tokio::test]
async fn test_sweeper_lifecycle() {
    let env = TestEnvironment::new();

    env.relay.start_sweeper().await.unwrap();
    assert!(env.relay.start_sweeper().await.is_err());
    env.relay.shutdown().await.unwrap();

    // Shutting down twice is harmless
    env.relay.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_retry_leaves_reassigned_token_to_its_new_owner() {
    let env = TestEnvironment::new();
    let retrying = UserId::from("judy#0010");
    let newcomer = UserId::from("mallory#0011");

    // The retry's own entry was swept and the token went to another user's failure
    let token = fail_once(&env, &newcomer, OperationPayload::second_factor("222222")).await;
    let theirs = env.relay.cache().lookup(token).unwrap();

    env.queue.then_complete(LoginOutcome::errored("timeout"));
    let state = env
        .relay
        .submit_and_track(
            &retrying,
            OperationPayload::password_login("judy", "pw"),
            Some(token),
        )
        .await;

    let new_token = state.retry_token().unwrap();
    assert_ne!(new_token, token);
    assert_eq!(env.relay.cache().lookup(token), Some(theirs.clone()));
    assert_eq!(env.relay.cache().lookup(new_token).unwrap().user_id, retrying);

    // A later success for the retrying user doesn't evict the other entry either
    env.sessions.log_in(&retrying, "judy");
    env.queue.then_complete(LoginOutcome::succeeded());
    let state = env
        .relay
        .submit_and_track(
            &retrying,
            OperationPayload::password_login("judy", "pw"),
            Some(token),
        )
        .await;

    assert!(matches!(state, LoginState::Succeeded { .. }));
    assert_eq!(env.relay.cache().lookup(token), Some(theirs));
}
