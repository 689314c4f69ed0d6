//! Upload hierarchy inference
//!
//! Turns an upload destination path into the literal chain of objects that
//! must exist before files can be stored, filling in the parts XNAT
//! convention allows to be omitted.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::{PathSegment, Tokenized, XnatPath};
use crate::schema::{EntityType, Modality};

/// How a trailing `/files` marker is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixMode {
    /// Downloads of containers and resources include their files without
    /// the marker; the marker is ignored on uploads
    #[default]
    Implicit,
    /// Only paths ending in `/files` select files; uploads reject the marker
    Explicit,
}

impl fmt::Display for SuffixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuffixMode::Implicit => f.write_str("implicit"),
            SuffixMode::Explicit => f.write_str("explicit"),
        }
    }
}

impl FromStr for SuffixMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "implicit" => Ok(SuffixMode::Implicit),
            "explicit" => Ok(SuffixMode::Explicit),
            other => Err(Error::InvalidArgument(format!(
                "unknown suffix mode '{other}', expected implicit or explicit"
            ))),
        }
    }
}

/// Literal object chain used for creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyChain {
    path: XnatPath,
    modality: Option<Modality>,
    date: Option<Date>,
}

impl HierarchyChain {
    /// Build a chain from a path without wildcards
    pub fn new(path: XnatPath) -> Result<Self> {
        if path.has_wildcard() {
            return Err(Error::InvalidArgument(format!(
                "cannot create objects from a wildcard path: {path}"
            )));
        }
        Ok(Self {
            path,
            modality: None,
            date: None,
        })
    }

    /// Set the session modality applied when the experiment is created
    pub fn with_modality(mut self, modality: Option<Modality>) -> Self {
        self.modality = modality;
        self
    }

    /// Set the session date applied when the experiment is created
    pub fn with_date(mut self, date: Option<Date>) -> Self {
        self.date = date;
        self
    }

    pub fn path(&self) -> &XnatPath {
        &self.path
    }

    pub fn segments(&self) -> &[PathSegment] {
        self.path.segments()
    }

    pub fn modality(&self) -> Option<&Modality> {
        self.modality.as_ref()
    }

    pub fn date(&self) -> Option<Date> {
        self.date
    }

    pub fn terminal_type(&self) -> EntityType {
        self.path.terminal_type()
    }
}

impl fmt::Display for HierarchyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.path.fmt(f)
    }
}

/// Inputs that steer upload inference beyond the destination path
#[derive(Debug, Clone, Default)]
pub struct InferOptions {
    pub modality: Option<Modality>,
    pub date: Option<Date>,
    pub suffix_mode: SuffixMode,
}

/// Where an upload lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Chain ending at the destination resource
    pub chain: HierarchyChain,
    /// Remote file name given in the destination, if any
    pub file_name: Option<String>,
}

/// Default scan resource name for a file, from its extension
///
/// `.nii` and `.nii.gz` give `NIFTI`, `.dcm` and `.dcm.gz` give `DICOM`.
pub fn infer_format(file_name: &str) -> Option<&'static str> {
    let lower = file_name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".gz").unwrap_or(&lower);
    if stem.ends_with(".nii") {
        Some("NIFTI")
    } else if stem.ends_with(".dcm") {
        Some("DICOM")
    } else {
        None
    }
}

fn infer_sources_format<P: AsRef<Path>>(sources: &[P]) -> Result<&'static str> {
    let mut format = None;
    for source in sources {
        let source = source.as_ref();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let Some(found) = infer_format(&name) else {
            return Err(Error::InvalidUploadTarget(format!(
                "cannot infer the scan resource from the file name {}",
                source.display()
            )));
        };
        match format {
            Some(previous) if previous != found => {
                return Err(Error::InvalidUploadTarget(format!(
                    "cannot infer a single scan resource from mixed {previous} and {found} files"
                )));
            }
            _ => format = Some(found),
        }
    }
    format.ok_or_else(|| {
        Error::InvalidUploadTarget("cannot infer the scan resource without source files".into())
    })
}

/// Infer the resource chain for an upload destination
///
/// `sources` are the local files about to be uploaded; their extensions
/// supply the scan resource name when the destination stops at a scan.
pub fn infer_upload_chain<P: AsRef<Path>>(
    dest: &Tokenized,
    sources: &[P],
    options: &InferOptions,
) -> Result<UploadTarget> {
    if dest.files_suffix && options.suffix_mode == SuffixMode::Explicit {
        return Err(Error::InvalidUploadTarget(format!(
            "{}: a files suffix is not accepted on an upload destination",
            dest.path
        )));
    }
    if dest.path.has_wildcard() {
        return Err(Error::InvalidUploadTarget(format!(
            "{}: upload destination cannot contain wildcards",
            dest.path
        )));
    }

    let mut segments = dest.path.segments().to_vec();
    let prefix: Vec<EntityType> = segments.iter().take(3).map(|s| s.entity).collect();
    if prefix != [EntityType::Project, EntityType::Subject, EntityType::Experiment] {
        return Err(Error::InvalidUploadTarget(format!(
            "{}: upload destination must name a project, subject and experiment",
            dest.path
        )));
    }

    let mut file_name = None;
    if let Some(last) = segments.last()
        && last.entity == EntityType::File
    {
        file_name = Some(last.matcher.as_str().to_string());
        segments.pop();
    }

    let Some(terminal) = segments.last().map(|s| s.entity) else {
        return Err(Error::InvalidUploadTarget(dest.path.to_string()));
    };
    match terminal {
        EntityType::Scan => {
            let format = infer_sources_format(sources)?;
            tracing::debug!(format, "Inferred scan resource from file extensions");
            segments.push(PathSegment::literal(EntityType::Resource, format));
        }
        EntityType::Experiment | EntityType::Assessor => {
            return Err(Error::InvalidUploadTarget(format!(
                "{}: upload destination is missing the resource",
                dest.path
            )));
        }
        EntityType::Resource => {
            let parent = segments.len().checked_sub(2).map(|i| segments[i].entity);
            if parent == Some(EntityType::Assessor)
                && let Some(last) = segments.last_mut()
            {
                last.entity = EntityType::OutResource;
            }
        }
        _ => {}
    }

    let chain = HierarchyChain::new(XnatPath::from_segments(segments)?)?
        .with_modality(options.modality.clone())
        .with_date(options.date);
    Ok(UploadTarget { chain, file_name })
}
