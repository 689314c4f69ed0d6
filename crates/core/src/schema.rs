//! XNAT object model
//!
//! The repository schema is a fixed tree of entity types. Path segments,
//! hierarchy chains and remote objects are all tagged with an [`EntityType`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A repository entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    Subject,
    /// Imaging session
    Experiment,
    Scan,
    /// Image assessment container
    Assessor,
    Resource,
    InResource,
    OutResource,
    File,
}

/// Alternative spellings accepted in paths, mapped to the canonical type
const ALIASES: &[(&str, EntityType)] = &[
    ("session", EntityType::Experiment),
    ("reconstruction", EntityType::Scan),
    ("analysis", EntityType::Assessor),
    ("assessment", EntityType::Assessor),
];

/// Irregular plurals that do not follow the trailing `s` rule
const IRREGULAR_PLURALS: &[(&str, &str)] = &[("analyses", "analysis")];

impl EntityType {
    /// Every type, root to leaf
    pub const ALL: [EntityType; 9] = [
        EntityType::Project,
        EntityType::Subject,
        EntityType::Experiment,
        EntityType::Scan,
        EntityType::Assessor,
        EntityType::Resource,
        EntityType::InResource,
        EntityType::OutResource,
        EntityType::File,
    ];

    /// The canonical path name
    pub const fn name(self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::Subject => "subject",
            EntityType::Experiment => "experiment",
            EntityType::Scan => "scan",
            EntityType::Assessor => "assessor",
            EntityType::Resource => "resource",
            EntityType::InResource => "in_resource",
            EntityType::OutResource => "out_resource",
            EntityType::File => "file",
        }
    }

    /// Resolve a type name, alias or plural to the canonical type
    ///
    /// Returns `None` when the name is not in the vocabulary.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(t) = Self::singular_from_name(name) {
            return Some(t);
        }
        if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(p, _)| *p == name) {
            return Self::singular_from_name(singular);
        }
        name.strip_suffix('s').and_then(Self::singular_from_name)
    }

    fn singular_from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == name)
            .or_else(|| {
                ALIASES
                    .iter()
                    .find(|(alias, _)| *alias == name)
                    .map(|(_, t)| *t)
            })
    }

    /// Whether this is one of the resource types
    pub const fn is_resource(self) -> bool {
        matches!(
            self,
            EntityType::Resource | EntityType::InResource | EntityType::OutResource
        )
    }

    /// Whether this type holds resources directly below an experiment
    pub const fn is_container(self) -> bool {
        matches!(self, EntityType::Scan | EntityType::Assessor)
    }

    /// Whether a child of `child` type may be nested directly under `self`
    pub const fn can_contain(self, child: EntityType) -> bool {
        matches!(
            (self, child),
            (EntityType::Project, EntityType::Subject)
                | (EntityType::Subject, EntityType::Experiment)
                | (EntityType::Experiment, EntityType::Scan)
                | (EntityType::Experiment, EntityType::Assessor)
                | (EntityType::Experiment, EntityType::Resource)
                | (EntityType::Scan, EntityType::Resource)
                | (EntityType::Assessor, EntityType::Resource)
                | (EntityType::Assessor, EntityType::InResource)
                | (EntityType::Assessor, EntityType::OutResource)
                | (EntityType::Resource, EntityType::File)
                | (EntityType::InResource, EntityType::File)
                | (EntityType::OutResource, EntityType::File)
        )
    }

    /// Whether XNAT prefixes this type's label with its parent's label
    pub const fn has_hierarchical_label(self) -> bool {
        matches!(self, EntityType::Experiment | EntityType::Assessor)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the stored XNAT label for a name below a hierarchically labeled parent
///
/// A name that already carries the parent prefix is returned unchanged, so
/// `Breast003` + `Session01` and `Breast003` + `Breast003_Session01` both
/// yield `Breast003_Session01`.
pub fn hierarchical_label(parent_label: &str, name: &str) -> String {
    if parent_label.is_empty() || name.starts_with(&format!("{parent_label}_")) {
        name.to_string()
    } else {
        format!("{parent_label}_{name}")
    }
}

/// Strip the parent prefix from a stored label, leaving the path name
pub fn relative_name<'a>(parent_label: &str, label: &'a str) -> &'a str {
    if parent_label.is_empty() {
        return label;
    }
    label
        .strip_prefix(parent_label)
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(label)
}

/// Session modality, e.g. `MR` or `xnat:ctSessionData`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modality(String);

impl Modality {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The XNAT session data type for this modality
    ///
    /// `MR` becomes `xnat:mrSessionData`, `ctSessionData` becomes
    /// `xnat:ctSessionData`, and an `xnat:` value is taken as is.
    pub fn session_type(&self) -> String {
        let value = self.0.as_str();
        if value.starts_with("xnat:") {
            return value.to_string();
        }
        let mut stem = if value.chars().all(|c| !c.is_lowercase()) {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        if !stem.ends_with("SessionData") {
            stem.push_str("SessionData");
        }
        format!("xnat:{stem}")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Derive the scan data type that belongs to a session data type
///
/// `xnat:mrSessionData` gives `xnat:mrScanData`.
pub fn scan_type_for_session(session_type: &str) -> Option<String> {
    session_type
        .strip_suffix("SessionData")
        .map(|stem| format!("{stem}ScanData"))
}
