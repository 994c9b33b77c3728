//! Chat widget engine for the LocalSphere portal.
//!
//! Provides the canned intent responder, the guest identity provider, the
//! per-session transcript view, markdown link markup, and the session
//! controller that ties them to a live [`localsphere_storage::MessageStore`].

pub mod controller;
pub mod error;
pub mod identity;
pub mod markup;
pub mod responder;
pub mod transcript;

pub use controller::{
    ControllerState, ControllerView, SessionController, SessionSettings, SkipReason, SubmitOutcome,
};
pub use error::ChatError;
pub use identity::{generate_token, IdentityProvider, LocalIdentityProvider, User};
pub use markup::{parse_markup, Segment};
pub use responder::{Intent, IntentResponder, Reply, Responder};
pub use transcript::{welcome_message, welcome_text, Transcript};
