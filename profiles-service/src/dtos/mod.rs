pub mod oauth;
pub mod profile;
