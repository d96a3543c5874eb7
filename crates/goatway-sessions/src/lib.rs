pub mod error;
pub mod store;
pub mod types;

pub use error::SessionError;
pub use store::{spawn_sweeper, SessionStore};
pub use types::Session;
