//! SMTP dispatch backends.

pub mod lettre;
pub mod traits;

pub use self::lettre::LettreBackend;
pub use traits::{DispatchError, DispatchResult, MailBackend};
