//! Typed views over the sections of an ORCID record that profiles consume.
//!
//! Each section is parsed on its own so a malformed section never prevents
//! the others from being used. Missing sections read as empty.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Address, PartialDate};

const PUBLIC: &str = "PUBLIC";

#[derive(Debug, Error)]
#[error("malformed {section} section: {source}")]
pub struct RecordShapeError {
    pub section: &'static str,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordName {
    pub given_names: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employment {
    pub put_code: String,
    pub department: Option<String>,
    pub organisation: String,
    pub address: Address,
    pub starts: Option<PartialDate>,
    pub ends: Option<PartialDate>,
    pub restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
    pub restricted: bool,
}

#[derive(Deserialize)]
struct Wrapped<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawName {
    given_names: Option<Wrapped<Option<String>>>,
    family_name: Option<Wrapped<Option<String>>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PutCode {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawEmployment {
    put_code: PutCode,
    department_name: Option<String>,
    organization: RawOrganization,
    start_date: Option<RawDate>,
    end_date: Option<RawDate>,
    visibility: Option<String>,
}

#[derive(Deserialize)]
struct RawOrganization {
    name: String,
    address: RawAddress,
}

#[derive(Deserialize)]
struct RawAddress {
    city: String,
    region: Option<String>,
    country: String,
}

#[derive(Deserialize)]
struct RawDate {
    year: Option<Wrapped<String>>,
    month: Option<Wrapped<String>>,
    day: Option<Wrapped<String>>,
}

#[derive(Deserialize)]
struct RawEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
    visibility: Option<String>,
}

fn section<'a>(record: &'a Value, pointer: &str) -> Option<&'a Value> {
    record.pointer(pointer).filter(|value| !value.is_null())
}

/// Only the exact `PUBLIC` visibility is unrestricted.
fn is_restricted(visibility: Option<&str>) -> bool {
    visibility != Some(PUBLIC)
}

/// ISO 3166-1 alpha-2, in either case.
fn is_country_code(country: &str) -> bool {
    country.len() == 2 && country.bytes().all(|byte| byte.is_ascii_alphabetic())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_name(record: &Value) -> Result<Option<RecordName>, RecordShapeError> {
    let Some(name) = section(record, "/person/name") else {
        return Ok(None);
    };

    let raw = RawName::deserialize(name).map_err(|source| RecordShapeError {
        section: "name",
        source,
    })?;

    Ok(Some(RecordName {
        given_names: non_blank(raw.given_names.and_then(|wrapped| wrapped.value)),
        family_name: non_blank(raw.family_name.and_then(|wrapped| wrapped.value)),
    }))
}

pub fn parse_employments(record: &Value) -> Result<Vec<Employment>, RecordShapeError> {
    let Some(summaries) = section(
        record,
        "/activities-summary/employments/employment-summary",
    ) else {
        return Ok(Vec::new());
    };

    let raw = Vec::<RawEmployment>::deserialize(summaries).map_err(|source| {
        RecordShapeError {
            section: "employments",
            source,
        }
    })?;

    Ok(raw
        .into_iter()
        .filter_map(|employment| {
            let put_code = match employment.put_code {
                PutCode::Number(code) => code.to_string(),
                PutCode::Text(code) => code,
            };
            let address = employment.organization.address;
            let country = address.country.trim();
            if !is_country_code(country) {
                tracing::warn!(put_code = %put_code, country = %country, "Ignoring employment with invalid country code");
                return None;
            }

            let starts = parse_date(employment.start_date, &put_code, "start");
            let ends = parse_date(employment.end_date, &put_code, "end");

            Some(Employment {
                department: non_blank(employment.department_name),
                organisation: employment.organization.name,
                address: Address::new(address.city, non_blank(address.region), country),
                starts,
                ends,
                restricted: is_restricted(employment.visibility.as_deref()),
                put_code,
            })
        })
        .collect())
}

pub fn parse_emails(record: &Value) -> Result<Vec<RecordEmail>, RecordShapeError> {
    let Some(emails) = section(record, "/person/emails/email") else {
        return Ok(Vec::new());
    };

    let raw = Vec::<RawEmail>::deserialize(emails).map_err(|source| RecordShapeError {
        section: "emails",
        source,
    })?;

    Ok(raw
        .into_iter()
        .map(|email| RecordEmail {
            restricted: is_restricted(email.visibility.as_deref()),
            email: email.email,
            primary: email.primary,
            verified: email.verified,
        })
        .collect())
}

/// An unparseable or impossible date is treated as absent.
fn parse_date(raw: Option<RawDate>, put_code: &str, which: &str) -> Option<PartialDate> {
    let raw = raw?;
    let year = raw.year?.value;

    let parsed = (|| {
        let year = year.trim().parse::<i32>().ok()?;
        let month = match raw.month {
            Some(month) => Some(month.value.trim().parse::<u32>().ok()?),
            None => None,
        };
        let day = match raw.day {
            Some(day) => Some(day.value.trim().parse::<u32>().ok()?),
            None => None,
        };
        Some(PartialDate::new(year, month, day))
    })();

    match parsed {
        Some(Ok(date)) => Some(date),
        Some(Err(err)) => {
            tracing::debug!(put_code = %put_code, date = which, error = %err, "Ignoring invalid employment date");
            None
        }
        None => {
            tracing::debug!(put_code = %put_code, date = which, "Ignoring unparseable employment date");
            None
        }
    }
}
