//! Tether Session Management
//!
//! - A Session binds one authenticated caller origin to the tabs it may
//!   touch and the target origins it has been granted for its lifetime
//! - Sessions are process state only; a host restart forgets them
//! - A tab belongs to at most one session, and unknown tabs are never owned

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{Session, TabId};

pub type Result<T> = std::result::Result<T, SessionError>;
