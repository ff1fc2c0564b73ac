//! Domain operations. Handlers and background jobs call into these; they talk
//! to the database through `crate::db` and push realtime events through the
//! bus, never through a socket directly.

pub mod chat;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod reviews;
