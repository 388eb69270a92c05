//! Loaders for the reference-data seed files (countries and control-list
//! entries). Reference data itself lives with an external collaborator;
//! only the CSV edge is owned here, for the demo seed and for sanity
//! checks on rule matching values.

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::flags::{FlagLevel, FlaggingRule};

/// Country codes and control-list ratings known to the service.
#[derive(Debug, Default, Clone)]
pub struct RefDataSet {
    countries: BTreeMap<String, String>,
    control_list_entries: BTreeMap<String, String>,
}

impl RefDataSet {
    pub fn from_readers<C: Read, E: Read>(
        countries: C,
        control_list_entries: E,
    ) -> Result<Self, csv::Error> {
        Ok(Self {
            countries: parse_countries(countries)?,
            control_list_entries: parse_control_list_entries(control_list_entries)?,
        })
    }

    pub fn is_known_country(&self, code: &str) -> bool {
        self.countries.contains_key(code)
    }

    pub fn is_known_rating(&self, rating: &str) -> bool {
        self.control_list_entries.contains_key(rating)
    }

    pub fn country_name(&self, code: &str) -> Option<&str> {
        self.countries.get(code).map(String::as_str)
    }

    /// Matching values on a rule that resolve against nothing in the
    /// reference data. Case-level values are free references, so only
    /// good- and destination-level rules are checked.
    pub fn unknown_matching_values(&self, rule: &FlaggingRule) -> Vec<String> {
        let known: Box<dyn Fn(&str) -> bool> = match rule.level {
            FlagLevel::Good => Box::new(|value| self.is_known_rating(value)),
            FlagLevel::Destination => Box::new(|value| self.is_known_country(value)),
            FlagLevel::Case | FlagLevel::Organisation => return Vec::new(),
        };

        rule.matching_values
            .iter()
            .filter(|value| !known(value))
            .cloned()
            .collect()
    }
}

fn parse_countries<R: Read>(reader: R) -> Result<BTreeMap<String, String>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut countries = BTreeMap::new();

    for record in csv_reader.deserialize::<CountryRow>() {
        let row = record?;
        countries.insert(row.code, row.name);
    }

    Ok(countries)
}

fn parse_control_list_entries<R: Read>(reader: R) -> Result<BTreeMap<String, String>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = BTreeMap::new();

    for record in csv_reader.deserialize::<ControlListEntryRow>() {
        let row = record?;
        let text = row.text.unwrap_or_default();
        entries.insert(row.rating, text);
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct CountryRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ControlListEntryRow {
    #[serde(rename = "Rating")]
    rating: String,
    #[serde(rename = "Text", default, deserialize_with = "empty_string_as_none")]
    text: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
