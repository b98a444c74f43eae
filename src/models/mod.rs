pub mod contact;
pub mod identity;

pub use contact::{Contact, LinkPrecedence, NewContact};
pub use identity::{ConsolidatedContact, IdentifyRequest, ValidationError};
