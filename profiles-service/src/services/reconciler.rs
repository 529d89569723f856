//! Merges an ORCID record into a profile.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::error::ServiceError;
use super::record::{
    parse_emails, parse_employments, parse_name, Employment, RecordEmail, RecordName,
};
use crate::models::{Affiliation, EmailAddress, Name, Profile};
use crate::repositories::ProfileRepository;

#[derive(Clone)]
pub struct ProfileReconciler {
    profiles: Arc<dyn ProfileRepository>,
}

impl ProfileReconciler {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { profiles }
    }

    /// Bring `profile` in line with `record`. Sections that cannot be parsed
    /// are logged and left untouched; the caller persists the result.
    pub async fn reconcile(&self, profile: &mut Profile, record: &Value) {
        match parse_name(record) {
            Ok(name) => update_name(profile, name),
            Err(err) => tracing::warn!(profile_id = %profile.id, error = %err, "Skipping ORCID name"),
        }

        match parse_employments(record) {
            Ok(employments) => update_affiliations(profile, &employments),
            Err(err) => {
                tracing::warn!(profile_id = %profile.id, error = %err, "Skipping ORCID employments")
            }
        }

        match parse_emails(record) {
            Ok(emails) => {
                let emails = self.owned_by(profile, emails).await;
                update_email_addresses(profile, &emails);
            }
            Err(err) => tracing::warn!(profile_id = %profile.id, error = %err, "Skipping ORCID emails"),
        }
    }

    /// Verified addresses that no other profile holds.
    async fn owned_by(&self, profile: &Profile, emails: Vec<RecordEmail>) -> Vec<RecordEmail> {
        let mut kept = Vec::with_capacity(emails.len());

        for email in emails.into_iter().filter(|email| email.verified) {
            match self
                .profiles
                .get_by_email_address(std::slice::from_ref(&email.email))
                .await
            {
                Ok(other) if other.id != profile.id => {
                    tracing::warn!(
                        profile_id = %profile.id,
                        other_profile_id = %other.id,
                        email = %email.email,
                        "Email address belongs to another profile, skipping"
                    );
                }
                Ok(_) | Err(ServiceError::ProfileNotFound(_)) => kept.push(email),
                Err(err) => {
                    tracing::warn!(
                        profile_id = %profile.id,
                        error = %err,
                        "Unable to check email address ownership"
                    );
                    kept.push(email);
                }
            }
        }

        kept
    }
}

pub fn update_name(profile: &mut Profile, name: Option<RecordName>) {
    let Some(name) = name else {
        return;
    };

    profile.name = match (name.given_names, name.family_name) {
        (Some(given), Some(family)) => Name::with_index(
            format!("{} {}", given, family),
            format!("{}, {}", family, given),
        ),
        (Some(only), None) | (None, Some(only)) => Name::with_index(only.clone(), only),
        (None, None) => return,
    };
}

pub fn update_affiliations(profile: &mut Profile, employments: &[Employment]) {
    for (index, employment) in employments.iter().enumerate() {
        let mut affiliation = profile
            .get_affiliation(&employment.put_code)
            .cloned()
            .unwrap_or_else(|_| {
                Affiliation::new(
                    employment.put_code.clone(),
                    employment.organisation.clone(),
                    employment.address.clone(),
                    employment.starts,
                )
            });

        affiliation.department = employment.department.clone();
        affiliation.organisation = employment.organisation.clone();
        affiliation.address = employment.address.clone();
        affiliation.starts = employment.starts;
        affiliation.ends = employment.ends;
        affiliation.restricted = employment.restricted;

        profile.add_affiliation(affiliation, index);
    }

    let seen: HashSet<&str> = employments
        .iter()
        .map(|employment| employment.put_code.as_str())
        .collect();
    let stale: Vec<String> = profile
        .affiliations
        .iter()
        .filter(|affiliation| !seen.contains(affiliation.id.as_str()))
        .map(|affiliation| affiliation.id.clone())
        .collect();

    for id in stale {
        profile.remove_affiliation(&id);
    }
}

/// `emails` must already be limited to addresses this profile may hold.
pub fn update_email_addresses(profile: &mut Profile, emails: &[RecordEmail]) {
    let primary = emails.iter().filter(|email| email.primary);
    let rest = emails.iter().filter(|email| !email.primary);

    let mut seen = HashSet::new();
    let addresses = primary
        .chain(rest)
        .filter(|email| seen.insert(email.email.as_str()))
        .map(|email| EmailAddress {
            email: email.email.clone(),
            restricted: email.restricted,
            position: 0,
        })
        .collect();

    profile.set_email_addresses(addresses);
}
