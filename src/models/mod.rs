pub mod conversation;
pub mod message;
pub mod participant;
pub mod read_marker;

pub use conversation::{Conversation, ConversationKind};
pub use message::Message;
pub use participant::{Participant, Role};
pub use read_marker::ReadMarker;
