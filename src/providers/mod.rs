//! External collaborator integrations: text generation, address
//! verification, and SMTP delivery backends.

pub mod llm;
pub mod transport;
pub mod verify;
