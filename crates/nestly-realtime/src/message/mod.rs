//! Wire message types, channel identifiers, framing, and validation.

pub mod channel;
pub mod serializer;
pub mod types;
pub mod validator;

pub use channel::Channel;
pub use serializer::RawFrame;
pub use types::{
    ChatMessageEnvelope, ClientEvent, NotificationEnvelope, RegistrationPayload, ServerEvent,
};
