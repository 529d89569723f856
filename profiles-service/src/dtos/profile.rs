use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Affiliation, Profile};

pub const PROFILE_LIST_CONTENT_TYPE: &str = "application/vnd.elife.profile-list+json;version=1";
pub const PROFILE_CONTENT_TYPE: &str = "application/vnd.elife.profile+json;version=1";

/// Raw list parameters; validated by the handler so bad values become
/// problem responses instead of extractor rejections.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileListQuery {
    pub page: Option<String>,
    #[serde(rename = "per-page")]
    pub per_page: Option<String>,
    pub order: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NameResponse {
    pub preferred: String,
    pub index: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSnippet {
    pub id: String,
    pub name: NameResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileListResponse {
    pub total: i64,
    pub items: Vec<ProfileSnippet>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressComponents {
    pub locality: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub area: Vec<String>,
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressResponse {
    pub formatted: Vec<String>,
    pub components: AddressComponents,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AffiliationResponse {
    pub name: Vec<String>,
    pub address: AddressResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub name: NameResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    #[serde(rename = "emailAddresses")]
    pub email_addresses: Vec<String>,
    pub affiliations: Vec<AffiliationResponse>,
}

impl From<&Profile> for ProfileSnippet {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id.clone(),
            name: NameResponse {
                preferred: profile.name.preferred.clone(),
                index: profile.name.index.clone(),
            },
            orcid: profile.orcid.clone(),
        }
    }
}

impl From<&Affiliation> for AffiliationResponse {
    fn from(affiliation: &Affiliation) -> Self {
        let address = &affiliation.address;
        let name = affiliation
            .department
            .iter()
            .chain(std::iter::once(&affiliation.organisation))
            .cloned()
            .collect();
        let formatted = std::iter::once(&address.city)
            .chain(address.region.iter())
            .chain(std::iter::once(&address.country))
            .cloned()
            .collect();

        Self {
            name,
            address: AddressResponse {
                formatted,
                components: AddressComponents {
                    locality: vec![address.city.clone()],
                    area: address.region.iter().cloned().collect(),
                    country: address.country.clone(),
                },
            },
        }
    }
}

impl ProfileResponse {
    /// Public view: restricted details and past or future affiliations are
    /// left out.
    pub fn new(profile: &Profile, today: NaiveDate) -> Self {
        let snippet = ProfileSnippet::from(profile);

        Self {
            id: snippet.id,
            name: snippet.name,
            orcid: snippet.orcid,
            email_addresses: profile
                .get_email_addresses(false)
                .into_iter()
                .map(|address| address.email.clone())
                .collect(),
            affiliations: profile
                .get_current_affiliations(false, today)
                .into_iter()
                .map(AffiliationResponse::from)
                .collect(),
        }
    }
}
