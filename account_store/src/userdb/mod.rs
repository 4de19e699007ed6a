mod config;
mod errors;
mod store;
mod types;

pub use errors::AccountError;
pub use store::UserAccountStore;
pub use types::{Preferences, Session, User};
