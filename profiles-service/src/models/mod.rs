pub mod client;
pub mod date;
pub mod orcid_token;
pub mod profile;

pub use client::{Client, Clients};
pub use date::{InvalidDate, PartialDate};
pub use orcid_token::OrcidToken;
pub use profile::{Address, Affiliation, EmailAddress, Name, Profile};
