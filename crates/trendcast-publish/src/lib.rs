//! Publishing posts to social platforms.
//!
//! A [`PlatformSender`] talks to one platform. The [`Publisher`] sends a
//! scheduled post through the matching sender and records the outcome in
//! the repository, one send per attempt.

pub mod error;
pub mod publisher;
pub mod senders;

pub use error::PublishError;
pub use publisher::{PublishOutcome, Publisher};
pub use senders::{configured_senders, FacebookSender, PlatformSender, SendOutcome, TwitterSender};
