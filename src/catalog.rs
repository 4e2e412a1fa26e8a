//! Option tables for the enumerated fields of each content category.
//!
//! Validation, list filters and the `options` block of listings all read
//! from these tables.

use serde::Serialize;
use utoipa::ToSchema;

pub type OptionSet = &'static [(&'static str, &'static str)];

#[derive(Debug, Clone, Copy)]
pub struct CategorySchema {
    pub categories: OptionSet,
    pub statuses: OptionSet,
    pub types: OptionSet,
}

pub const NEWS: CategorySchema = CategorySchema {
    categories: &[
        ("announcement", "Announcement"),
        ("event", "Event"),
        ("advisory", "Advisory"),
        ("press_release", "Press Release"),
        ("update", "Update"),
    ],
    statuses: &[],
    types: &[],
};

pub const BIDS_AWARDS: CategorySchema = CategorySchema {
    categories: &[
        ("goods", "Goods"),
        ("infrastructure", "Infrastructure"),
        ("consulting_services", "Consulting Services"),
    ],
    statuses: &[
        ("draft", "Draft"),
        ("published", "Published"),
        ("opened", "Opened"),
        ("evaluated", "Evaluated"),
        ("awarded", "Awarded"),
    ],
    types: &[],
};

pub const TOURISM_PACKAGES: CategorySchema = CategorySchema {
    categories: &[
        ("heritage", "Heritage"),
        ("nature", "Nature"),
        ("adventure", "Adventure"),
        ("culinary", "Culinary"),
        ("religious", "Religious"),
    ],
    statuses: &[],
    types: &[],
};

pub const AWARDS_RECOGNITIONS: CategorySchema = CategorySchema {
    categories: &[
        ("international", "International"),
        ("national", "National"),
        ("regional", "Regional"),
        ("provincial", "Provincial"),
    ],
    statuses: &[],
    types: &[],
};

pub const FULL_DISCLOSURES: CategorySchema = CategorySchema {
    categories: &[],
    statuses: &[],
    types: &[
        ("budget", "Annual Budget"),
        ("procurement", "Procurement Plan"),
        ("financial_statement", "Financial Statement"),
        ("annual_report", "Annual Report"),
        ("other", "Other"),
    ],
};

pub const DISCLOSURE_QUARTERS: OptionSet = &[
    ("Q1", "First Quarter"),
    ("Q2", "Second Quarter"),
    ("Q3", "Third Quarter"),
    ("Q4", "Fourth Quarter"),
];

pub const ORDINANCE_RESOLUTIONS: CategorySchema = CategorySchema {
    categories: &[],
    statuses: &[
        ("active", "Active"),
        ("amended", "Amended"),
        ("repealed", "Repealed"),
        ("pending", "Pending"),
    ],
    types: &[("ordinance", "Ordinance"), ("resolution", "Resolution")],
};

pub const SB_MEMBERS: CategorySchema = CategorySchema {
    categories: &[
        ("vice_mayor", "Vice Mayor"),
        ("councilor", "Councilor"),
        ("sk_chairperson", "SK Federation President"),
        ("abc_president", "Liga ng mga Barangay President"),
        ("secretary", "SB Secretary"),
    ],
    statuses: &[],
    types: &[],
};

pub fn contains(set: OptionSet, value: &str) -> bool {
    set.iter().any(|(key, _)| *key == value)
}

pub fn label_of(set: OptionSet, value: &str) -> Option<&'static str> {
    set.iter().find(|(key, _)| *key == value).map(|(_, label)| *label)
}

/// Comma separated values, for validation messages.
pub fn describe(set: OptionSet) -> String {
    set.iter().map(|(key, _)| *key).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OptionItem {
    #[schema(value_type = String)]
    pub value: &'static str,
    #[schema(value_type = String)]
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub statuses: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<OptionItem>,
}

fn items(set: OptionSet) -> Vec<OptionItem> {
    set.iter()
        .map(|&(value, label)| OptionItem { value, label })
        .collect()
}

impl From<&CategorySchema> for CategoryOptions {
    fn from(schema: &CategorySchema) -> Self {
        Self {
            categories: items(schema.categories),
            statuses: items(schema.statuses),
            types: items(schema.types),
        }
    }
}
