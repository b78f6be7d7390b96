pub mod conversation;
pub mod message;

pub use conversation::{Conversation, SessionCollection};
pub use message::{Message, Role};
