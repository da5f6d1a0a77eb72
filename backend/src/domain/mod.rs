//! Domain entities, services, and ports.
//!
//! Two consistency mechanisms live here: optimistic concurrency for post
//! updates ([`PostMutationCoordinator`]) and the registration saga with its
//! activation state machine ([`RegistrationService`], [`ActivationService`]).
//! Both depend only on the traits in [`ports`].

pub mod activation;
pub mod auth;
pub mod error;
pub mod login;
pub mod ports;
pub mod post;
pub mod post_mutation;
pub mod post_service;
pub mod registration;
pub mod token;
pub mod trace_id;
pub mod user;
pub mod validation;

pub use self::activation::ActivationService;
pub use self::auth::{LoginCredentials, LoginValidationError};
pub use self::error::{Error, ErrorCode, ErrorValidationError, TRACE_ID_HEADER};
pub use self::login::PasswordLoginService;
pub use self::post::{MutationRejected, Post, PostDraft, PostId, RejectionKind, Version};
pub use self::post_mutation::{MAX_UPDATE_ATTEMPTS, PostMutationCoordinator};
pub use self::post_service::PostService;
pub use self::registration::{
    ActivationLinkToken, CompensationPolicy, RegistrationService, RegistrationSettings,
};
pub use self::token::{
    DEFAULT_INVITATION_TTL, InvitationTokens, IssuedToken, PlaintextToken, TokenDigest,
    TokenDigestLengthError, TokenValidity,
};
pub use self::trace_id::TraceId;
pub use self::user::{NewAccount, User, UserId};
pub use self::validation::{
    DefaultRequestValidator, FieldViolation, NewPostRequest, PostPatch, RegistrationRequest,
    RequestValidator,
};
