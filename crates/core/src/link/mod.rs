//! Link validation for incoming download requests.
//!
//! Classifies free text from a requester as an accepted score link, a link
//! refused by policy, or something that is not a score link at all.

mod config;
mod validator;

pub use config::LinkPolicyConfig;
pub use validator::{LinkValidator, LinkVerdict};
