//! Registration, activation, and login across the domain services.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mockable::Clock;
use rstest::rstest;
use social_backend::domain::ports::{
    AccountActivation, AccountRegistration, LoginService, MailSender,
};
use social_backend::domain::{
    ActivationService, CompensationPolicy, DefaultRequestValidator, ErrorCode, InvitationTokens,
    LoginCredentials, PasswordLoginService, PlaintextToken, RegistrationRequest,
    RegistrationService, RegistrationSettings, TokenDigest,
};
use social_backend::test_support::{
    FailingMailSender, InMemoryAccountRepository, MutableClock, PlainPasswordHasher,
    RecordingMailSender,
};
use zeroize::Zeroizing;

const TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct World<M: MailSender> {
    clock: Arc<MutableClock>,
    accounts: Arc<InMemoryAccountRepository>,
    mailer: Arc<M>,
    registration: RegistrationService<InMemoryAccountRepository, M, PlainPasswordHasher>,
    activation: ActivationService<InMemoryAccountRepository>,
    login: PasswordLoginService<InMemoryAccountRepository, PlainPasswordHasher>,
}

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn world<M: MailSender>(mailer: M, compensation: CompensationPolicy) -> World<M> {
    let clock = Arc::new(MutableClock::new(start()));
    let accounts = Arc::new(InMemoryAccountRepository::default());
    let mailer = Arc::new(mailer);
    let hasher = Arc::new(PlainPasswordHasher);
    let tokens = InvitationTokens::new(clock.clone() as Arc<dyn Clock>, TTL);
    let registration = RegistrationService::new(
        accounts.clone(),
        mailer.clone(),
        hasher.clone(),
        Arc::new(DefaultRequestValidator),
        tokens.clone(),
        RegistrationSettings::new("https://social.test/").with_compensation(compensation),
    );
    World {
        activation: ActivationService::new(accounts.clone(), tokens),
        login: PasswordLoginService::new(accounts.clone(), hasher),
        clock,
        accounts,
        mailer,
        registration,
    }
}

fn request(username: &str, email: &str) -> RegistrationRequest {
    RegistrationRequest {
        username: username.to_owned(),
        email: email.to_owned(),
        password: Zeroizing::new("correct horse".to_owned()),
    }
}

fn credentials(username: &str) -> LoginCredentials {
    LoginCredentials::try_from_parts(username, "correct horse").expect("credentials")
}

fn token_from_link(mailer: &RecordingMailSender) -> PlaintextToken {
    let sent = mailer.sent();
    let message = sent.last().expect("invitation sent");
    let url = message
        .variables
        .get("activation_url")
        .expect("activation url");
    let (_, token) = url.rsplit_once("/activate/").expect("token segment");
    PlaintextToken::new(token)
}

#[rstest]
#[tokio::test]
async fn mailed_link_activates_account_and_unlocks_login() {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());

    let registration = world
        .registration
        .register(request("alice", "alice@example.com"))
        .await
        .expect("registered");
    assert!(!registration.user.is_activated());

    let login_before = world
        .login
        .authenticate(&credentials("alice"))
        .await
        .expect_err("inactive");
    assert_eq!(login_before.code(), ErrorCode::Forbidden);

    let token = token_from_link(&world.mailer);
    assert_eq!(token.as_str(), registration.token.as_str());
    world.activation.activate(&token).await.expect("activated");

    let user_id = world
        .login
        .authenticate(&credentials("alice"))
        .await
        .expect("login after activation");
    assert_eq!(user_id, registration.user.id());
    assert_eq!(world.accounts.invitation_count(), 0);
}

#[rstest]
#[tokio::test]
async fn tokens_are_single_use() {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());
    let registration = world
        .registration
        .register(request("bob", "bob@example.com"))
        .await
        .expect("registered");

    world
        .activation
        .activate(&registration.token)
        .await
        .expect("first redemption");
    let err = world
        .activation
        .activate(&registration.token)
        .await
        .expect_err("second redemption");

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn expired_invitations_are_gone() {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());
    let registration = world
        .registration
        .register(request("carol", "carol@example.com"))
        .await
        .expect("registered");

    world.clock.advance_seconds(24 * 60 * 60 + 1);
    let err = world
        .activation
        .activate(&registration.token)
        .await
        .expect_err("expired");

    assert_eq!(err.code(), ErrorCode::Gone);
    let user = world.accounts.user_by_username("carol").expect("user kept");
    assert!(!user.is_activated());
}

#[rstest]
#[tokio::test]
async fn invitation_is_valid_at_the_exact_expiry_instant() {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());
    let registration = world
        .registration
        .register(request("dave", "dave@example.com"))
        .await
        .expect("registered");

    world.clock.advance_seconds(24 * 60 * 60);

    world
        .activation
        .activate(&registration.token)
        .await
        .expect("still valid at expiry");
}

#[rstest]
#[case(CompensationPolicy::InvitationOnly, 1)]
#[case(CompensationPolicy::InvitationAndUser, 0)]
#[tokio::test]
async fn mail_failure_compensates_per_policy(
    #[case] policy: CompensationPolicy,
    #[case] accounts_left: usize,
) {
    let world = world(FailingMailSender, policy);

    let err = world
        .registration
        .register(request("erin", "erin@example.com"))
        .await
        .expect_err("mail failure");

    assert_eq!(err.code(), ErrorCode::BadGateway);
    assert_eq!(world.accounts.invitation_count(), 0);
    assert_eq!(world.accounts.account_count(), accounts_left);
}

#[rstest]
#[tokio::test]
async fn compensated_username_can_register_again() {
    let failing = world(FailingMailSender, CompensationPolicy::InvitationAndUser);
    failing
        .registration
        .register(request("frank", "frank@example.com"))
        .await
        .expect_err("mail failure");

    let retry = failing
        .registration
        .register(request("frank", "frank@example.com"))
        .await
        .expect_err("mail still failing");

    assert_eq!(retry.code(), ErrorCode::BadGateway);
    assert_eq!(failing.accounts.account_count(), 0);
}

#[rstest]
#[case(request("alice", "other@example.com"), "username_taken")]
#[case(request("alicia", "alice@example.com"), "email_taken")]
#[tokio::test]
async fn duplicates_are_conflicts(#[case] duplicate: RegistrationRequest, #[case] code: &str) {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());
    world
        .registration
        .register(request("alice", "alice@example.com"))
        .await
        .expect("first registration");

    let err = world
        .registration
        .register(duplicate)
        .await
        .expect_err("duplicate");

    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(err.details().expect("details")["code"], code);
    assert_eq!(world.mailer.sent().len(), 1);
}

#[rstest]
#[tokio::test]
async fn unknown_token_is_not_found() {
    let world = world(RecordingMailSender::default(), CompensationPolicy::default());
    let token = PlaintextToken::new("not-a-real-token");

    let err = world.activation.activate(&token).await.expect_err("unknown");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(!world.accounts.has_invitation(&TokenDigest::of(&token)));
}
