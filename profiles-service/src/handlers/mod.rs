//! HTTP handlers for the profiles service.

pub mod oauth;
pub mod ping;
pub mod profiles;
pub mod webhook;

pub use ping::ping;
