use super::date::PartialDate;
use crate::services::error::ServiceError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub preferred: String,
    pub index: String,
}

impl Name {
    /// A name whose index form is guessed from the preferred form.
    pub fn new(preferred: impl Into<String>) -> Self {
        let preferred = preferred.into();
        let index = guess_index_name(&preferred);
        Self { preferred, index }
    }

    pub fn with_index(preferred: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            preferred: preferred.into(),
            index: index.into(),
        }
    }
}

/// Treats the first word as the given name and the rest as the family name:
/// `"foo bar baz"` becomes `"bar baz, foo"`.
pub fn guess_index_name(name: &str) -> String {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((given, family)) => format!("{}, {}", family.trim_start(), given),
        None => name.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub city: String,
    pub region: Option<String>,
    /// ISO 3166-1 alpha-2, upper case.
    pub country: String,
}

impl Address {
    pub fn new(city: impl Into<String>, region: Option<String>, country: &str) -> Self {
        Self {
            city: city.into(),
            region,
            country: country.to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affiliation {
    /// The provider's put-code for the employment.
    pub id: String,
    pub department: Option<String>,
    pub organisation: String,
    pub address: Address,
    pub starts: Option<PartialDate>,
    pub ends: Option<PartialDate>,
    pub restricted: bool,
    pub position: usize,
}

impl Affiliation {
    pub fn new(
        id: impl Into<String>,
        organisation: impl Into<String>,
        address: Address,
        starts: Option<PartialDate>,
    ) -> Self {
        Self {
            id: id.into(),
            department: None,
            organisation: organisation.into(),
            address,
            starts,
            ends: None,
            restricted: false,
            position: 0,
        }
    }

    pub fn is_current(&self, today: NaiveDate) -> bool {
        let started = self
            .starts
            .map_or(true, |starts| starts.lowest_possible() <= today);
        let ongoing = self
            .ends
            .map_or(true, |ends| ends.highest_possible() >= today);

        started && ongoing
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub email: String,
    pub restricted: bool,
    /// 0 is the primary address.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub name: Name,
    pub orcid: Option<String>,
    pub affiliations: Vec<Affiliation>,
    pub email_addresses: Vec<EmailAddress>,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: Name, orcid: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            orcid,
            affiliations: Vec::new(),
            email_addresses: Vec::new(),
        }
    }

    /// Insert at `position`, clamped to the end of the list. An existing
    /// affiliation with the same id is replaced.
    pub fn add_affiliation(&mut self, affiliation: Affiliation, position: usize) {
        self.affiliations.retain(|existing| existing.id != affiliation.id);
        let position = position.min(self.affiliations.len());
        self.affiliations.insert(position, affiliation);
        reorder(&mut self.affiliations, |affiliation, position| {
            affiliation.position = position
        });
    }

    pub fn get_affiliation(&self, id: &str) -> Result<&Affiliation, ServiceError> {
        self.affiliations
            .iter()
            .find(|affiliation| affiliation.id == id)
            .ok_or_else(|| ServiceError::AffiliationNotFound(id.to_string()))
    }

    pub fn remove_affiliation(&mut self, id: &str) {
        self.affiliations.retain(|affiliation| affiliation.id != id);
        reorder(&mut self.affiliations, |affiliation, position| {
            affiliation.position = position
        });
    }

    pub fn get_affiliations(&self, include_restricted: bool) -> Vec<&Affiliation> {
        self.affiliations
            .iter()
            .filter(|affiliation| include_restricted || !affiliation.restricted)
            .collect()
    }

    pub fn get_current_affiliations(
        &self,
        include_restricted: bool,
        today: NaiveDate,
    ) -> Vec<&Affiliation> {
        self.get_affiliations(include_restricted)
            .into_iter()
            .filter(|affiliation| affiliation.is_current(today))
            .collect()
    }

    /// Add or update an address. A primary address moves to position 0.
    pub fn add_email_address(&mut self, email: &str, primary: bool, restricted: bool) {
        match self
            .email_addresses
            .iter()
            .position(|existing| existing.email == email)
        {
            Some(index) => {
                let mut existing = self.email_addresses.remove(index);
                existing.restricted = restricted;
                let target = if primary { 0 } else { index };
                self.email_addresses.insert(target, existing);
            }
            None => {
                let address = EmailAddress {
                    email: email.to_string(),
                    restricted,
                    position: 0,
                };
                if primary {
                    self.email_addresses.insert(0, address);
                } else {
                    self.email_addresses.push(address);
                }
            }
        }

        reorder(&mut self.email_addresses, |address, position| {
            address.position = position
        });
    }

    pub fn remove_email_address(&mut self, email: &str) {
        self.email_addresses.retain(|address| address.email != email);
        reorder(&mut self.email_addresses, |address, position| {
            address.position = position
        });
    }

    /// Replace every address, keeping the given order.
    pub fn set_email_addresses(&mut self, addresses: Vec<EmailAddress>) {
        self.email_addresses = addresses;
        reorder(&mut self.email_addresses, |address, position| {
            address.position = position
        });
    }

    pub fn get_email_addresses(&self, include_restricted: bool) -> Vec<&EmailAddress> {
        self.email_addresses
            .iter()
            .filter(|address| include_restricted || !address.restricted)
            .collect()
    }

    pub fn primary_email_address(&self) -> Option<&EmailAddress> {
        self.email_addresses.first()
    }
}

fn reorder<T>(items: &mut [T], mut set_position: impl FnMut(&mut T, usize)) {
    for (position, item) in items.iter_mut().enumerate() {
        set_position(item, position);
    }
}
