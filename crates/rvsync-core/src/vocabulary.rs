//! In-memory lookup tables built from the registry's controlled vocabularies.
//!
//! The registry client returns every vocabulary in a generic projected form
//! (`key → {output field → value}`); [`VocabularyIndex::from_projections`]
//! turns the three projections into typed tables. Lookups never fail: an
//! unknown key yields an empty entry, which callers treat as "unknown".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::normalize::{normalize_port_name, ParsedName};

/// A vocabulary projected by key, as returned by the registry client.
pub type Projection = HashMap<String, HashMap<String, String>>;

/// Describes how to fetch and project one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VocabularySpec {
    /// Value of the `type` query parameter.
    pub vocab_type: &'static str,
    /// Source field whose value keys the projection.
    pub key_field: &'static str,
    /// `(output field, source field)` pairs to keep.
    pub fields: &'static [(&'static str, &'static str)],
}

pub const PORT_VOCABULARY: VocabularySpec = VocabularySpec {
    vocab_type: "port",
    key_field: "name",
    fields: &[
        ("latitude", "latitude"),
        ("longitude", "longitude"),
        ("r2r_id", "id"),
        ("country_id3", "country_id3"),
    ],
};

pub const PERSON_VOCABULARY: VocabularySpec = VocabularySpec {
    vocab_type: "person",
    key_field: "name",
    fields: &[("org_shortname", "organization"), ("r2r_id", "id")],
};

pub const ORGANIZATION_VOCABULARY: VocabularySpec = VocabularySpec {
    vocab_type: "organization",
    key_field: "acronym",
    fields: &[("name", "name"), ("r2r_id", "id")],
};

/// Port vocabulary entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub latitude: String,
    pub longitude: String,
    pub r2r_id: String,
    pub country_id3: String,
}

/// Person vocabulary entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub org_shortname: String,
    pub r2r_id: String,
}

/// Organization vocabulary entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationEntry {
    pub name: String,
    pub r2r_id: String,
}

static EMPTY_PORT: PortEntry = PortEntry {
    latitude: String::new(),
    longitude: String::new(),
    r2r_id: String::new(),
    country_id3: String::new(),
};

static EMPTY_PERSON: PersonEntry = PersonEntry {
    org_shortname: String::new(),
    r2r_id: String::new(),
};

static EMPTY_ORGANIZATION: OrganizationEntry = OrganizationEntry {
    name: String::new(),
    r2r_id: String::new(),
};

/// Typed lookup tables for ports, persons and organizations.
#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    ports: HashMap<String, PortEntry>,
    persons: HashMap<String, PersonEntry>,
    organizations: HashMap<String, OrganizationEntry>,
}

fn field(fields: &HashMap<String, String>, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

impl VocabularyIndex {
    /// Build the index from the three projected vocabularies.
    pub fn from_projections(ports: Projection, persons: Projection, orgs: Projection) -> Self {
        let ports = ports
            .into_iter()
            .map(|(key, f)| {
                let entry = PortEntry {
                    latitude: field(&f, "latitude"),
                    longitude: field(&f, "longitude"),
                    r2r_id: field(&f, "r2r_id"),
                    country_id3: field(&f, "country_id3"),
                };
                (key, entry)
            })
            .collect();
        let persons = persons
            .into_iter()
            .map(|(key, f)| {
                let entry = PersonEntry {
                    org_shortname: field(&f, "org_shortname"),
                    r2r_id: field(&f, "r2r_id"),
                };
                (key, entry)
            })
            .collect();
        let organizations = orgs
            .into_iter()
            .map(|(key, f)| {
                let entry = OrganizationEntry {
                    name: field(&f, "name"),
                    r2r_id: field(&f, "r2r_id"),
                };
                (key, entry)
            })
            .collect();

        Self {
            ports,
            persons,
            organizations,
        }
    }

    pub fn with_port(mut self, name: impl Into<String>, entry: PortEntry) -> Self {
        self.ports.insert(name.into(), entry);
        self
    }

    pub fn with_person(mut self, name: impl Into<String>, entry: PersonEntry) -> Self {
        self.persons.insert(name.into(), entry);
        self
    }

    pub fn with_organization(mut self, acronym: impl Into<String>, entry: OrganizationEntry) -> Self {
        self.organizations.insert(acronym.into(), entry);
        self
    }

    pub fn port(&self, name: &str) -> &PortEntry {
        self.ports.get(name).unwrap_or(&EMPTY_PORT)
    }

    pub fn person(&self, name: &str) -> &PersonEntry {
        self.persons.get(name).unwrap_or(&EMPTY_PERSON)
    }

    pub fn organization(&self, acronym: &str) -> &OrganizationEntry {
        self.organizations.get(acronym).unwrap_or(&EMPTY_ORGANIZATION)
    }

    /// Person entry for a parsed name: original spelling first, then the
    /// normalized key.
    pub fn person_for(&self, name: &ParsedName) -> &PersonEntry {
        self.persons
            .get(&name.original)
            .or_else(|| self.persons.get(&name.normalized))
            .unwrap_or(&EMPTY_PERSON)
    }

    /// Organization of a person, via the person's organization short name.
    pub fn organization_for(&self, person: &PersonEntry) -> &OrganizationEntry {
        if person.org_shortname.is_empty() {
            return &EMPTY_ORGANIZATION;
        }
        self.organization(&person.org_shortname)
    }

    /// Country-qualified display name for an upstream port name.
    pub fn normalize_port(&self, port_name: &str) -> String {
        let code = &self.port(port_name).country_id3;
        normalize_port_name(port_name, Some(code))
    }

    /// Entry counts as `(ports, persons, organizations)`.
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.ports.len(), self.persons.len(), self.organizations.len())
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.persons.is_empty() && self.organizations.is_empty()
    }
}
