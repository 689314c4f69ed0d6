//! High-level XNAT operations
//!
//! [`Xnat`] combines path resolution, hierarchy inference and the
//! repository into the operations the command line exposes: listing,
//! find-or-create, download, upload and delete.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use jiff::civil::Date;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hierarchy::{infer_upload_chain, HierarchyChain, InferOptions, SuffixMode};
use crate::path::{Matcher, PathSegment, Tokenized, XnatPath};
use crate::resolver::{qualified_label, Resolver};
use crate::schema::{scan_type_for_session, EntityType, Modality};
use crate::traits::{Attributes, RemoteObject, Repository, ResolvedSet};

/// Local directory layout for downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// `<dest>/<file>`
    #[default]
    Flat,
    /// `<dest>/<project>/<subject>/<experiment>/[<type>/<container>/]<resource>/<file>`
    Hierarchical,
}

/// Options for downloads
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Overwrite existing local files
    pub force: bool,
    /// Leave existing local files untouched
    pub skip_existing: bool,
    pub layout: Layout,
}

/// Options for uploads
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Modality for a session that has to be created
    pub modality: Option<Modality>,
    /// Acquisition date for a session that has to be created
    pub date: Option<Date>,
    /// Replace existing remote files
    pub force: bool,
    /// Leave existing remote files untouched
    pub skip_existing: bool,
}

/// Outcome of a single file transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub remote: XnatPath,
    pub local: PathBuf,
    pub size_bytes: u64,
    /// The file already existed and was left as is
    pub skipped: bool,
}

pub type DownloadedFile = Transfer;
pub type UploadedFile = Transfer;

fn check_overwrite_flags(force: bool, skip_existing: bool) -> Result<()> {
    if force && skip_existing {
        return Err(Error::InvalidArgument(
            "force and skip-existing cannot be combined".into(),
        ));
    }
    Ok(())
}

/// XNAT facade over a repository
pub struct Xnat<R> {
    repo: R,
    suffix_mode: SuffixMode,
}

impl<R: Repository> Xnat<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            suffix_mode: SuffixMode::default(),
        }
    }

    pub fn with_suffix_mode(mut self, suffix_mode: SuffixMode) -> Self {
        self.suffix_mode = suffix_mode;
        self
    }

    pub fn suffix_mode(&self) -> SuffixMode {
        self.suffix_mode
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn resolver(&self) -> Resolver<'_, R> {
        Resolver::new(&self.repo)
    }

    /// All objects matching a path; empty when nothing matches
    pub async fn find(&self, path: &XnatPath) -> Result<ResolvedSet> {
        self.resolver().resolve(path).await
    }

    /// The object at a literal path, if it exists
    pub async fn find_one(&self, path: &XnatPath) -> Result<Option<RemoteObject>> {
        if path.has_wildcard() {
            return Err(Error::InvalidArgument(format!(
                "expected a path without wildcards: {path}"
            )));
        }
        Ok(self.find(path).await?.into_iter().next())
    }

    /// Union of the objects matched by each path
    ///
    /// A path ending in a files marker lists the files below it. Every path
    /// must match at least one object.
    pub async fn expand(&self, paths: &[Tokenized], sorted: bool) -> Result<ResolvedSet> {
        let mut result = ResolvedSet::new();
        for tokenized in paths {
            let path = if tokenized.files_suffix {
                files_below(&tokenized.path)?
            } else {
                tokenized.path.clone()
            };
            result = result.union(self.resolver().resolve_required(&path).await?);
        }
        Ok(if sorted { result.sorted() } else { result })
    }

    /// Resolve a chain, creating every missing level below the project
    pub async fn find_or_create(&self, chain: &HierarchyChain) -> Result<RemoteObject> {
        let mut parent: Option<RemoteObject> = None;
        let mut creating = false;
        for (depth, segment) in chain.segments().iter().enumerate() {
            // Chains hold literal segments only.
            let name = segment.matcher.as_str();
            let label = qualified_label(parent.as_ref(), segment.entity, name);
            let existing = if creating {
                None
            } else {
                self.repo
                    .get_child(parent.as_ref(), segment.entity, &label)
                    .await?
            };
            let object = match existing {
                Some(object) => object,
                None => {
                    if !creating {
                        check_creatable(chain, depth)?;
                    }
                    creating = true;
                    let attributes =
                        self.creation_attributes(chain, parent.as_ref(), segment.entity);
                    debug!(entity = %segment.entity, label = %label, "Creating XNAT object");
                    self.repo
                        .create(parent.as_ref(), segment.entity, &label, &attributes)
                        .await?
                }
            };
            parent = Some(object);
        }
        parent.ok_or_else(|| Error::InvalidArgument("empty hierarchy chain".into()))
    }

    /// Attributes for a new object; [`check_creatable`] has vetted the chain
    fn creation_attributes(
        &self,
        chain: &HierarchyChain,
        parent: Option<&RemoteObject>,
        entity: EntityType,
    ) -> Attributes {
        match entity {
            EntityType::Experiment => Attributes {
                xsi_type: chain.modality().map(Modality::session_type),
                date: chain.date(),
            },
            EntityType::Scan => Attributes {
                xsi_type: parent
                    .and_then(|p| p.xsi_type.as_deref())
                    .and_then(scan_type_for_session),
                date: None,
            },
            _ => Attributes::default(),
        }
    }

    /// The file objects selected by download sources
    pub async fn plan_download(&self, sources: &[Tokenized]) -> Result<ResolvedSet> {
        let mut files = ResolvedSet::new();
        for source in sources {
            let path = self.download_path(source)?;
            files = files.union(self.resolver().resolve_required(&path).await?);
        }
        Ok(files)
    }

    fn download_path(&self, source: &Tokenized) -> Result<XnatPath> {
        let path = &source.path;
        match path.terminal_type() {
            EntityType::Project | EntityType::Subject => Err(Error::InvalidArgument(format!(
                "{path}: cannot download a whole {}",
                path.terminal_type()
            ))),
            EntityType::File => Ok(path.clone()),
            _ if source.files_suffix || self.suffix_mode == SuffixMode::Implicit => {
                files_below(path)
            }
            _ => Err(Error::InvalidArgument(format!(
                "{path}: add a /files suffix to download the files"
            ))),
        }
    }

    /// Download every file selected by the sources into a local directory
    pub async fn download(
        &self,
        sources: &[Tokenized],
        dest: &Path,
        options: &DownloadOptions,
    ) -> Result<Vec<DownloadedFile>> {
        check_overwrite_flags(options.force, options.skip_existing)?;
        let files = self.plan_download(sources).await?;
        self.download_files(&files, dest, options, |_| {}).await
    }

    /// Download resolved file objects, reporting each finished transfer
    pub async fn download_files<F>(
        &self,
        files: &ResolvedSet,
        dest: &Path,
        options: &DownloadOptions,
        mut on_file: F,
    ) -> Result<Vec<DownloadedFile>>
    where
        F: FnMut(&DownloadedFile),
    {
        check_overwrite_flags(options.force, options.skip_existing)?;
        if tokio::fs::try_exists(dest).await? && !tokio::fs::metadata(dest).await?.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a directory",
                dest.display()
            )));
        }

        let targets = files
            .iter()
            .map(|file| local_target(dest, file, options.layout))
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::with_capacity(targets.len());
        for (file, target) in files.iter().zip(&targets) {
            if !seen.insert(target) {
                return Err(Error::Conflict(format!(
                    "{} is the local target of more than one file, including {}; \
                     download with the hierarchical layout",
                    target.display(),
                    file.path
                )));
            }
            if !options.force && !options.skip_existing && tokio::fs::try_exists(target).await? {
                return Err(Error::Conflict(format!("{} already exists", target.display())));
            }
        }

        let mut transfers = Vec::with_capacity(files.len());
        for (file, target) in files.iter().zip(targets) {
            let transfer = if tokio::fs::try_exists(&target).await? {
                if options.skip_existing {
                    warn!(target = %target.display(), "Skipping existing file");
                    Transfer {
                        remote: file.path.clone(),
                        size_bytes: tokio::fs::metadata(&target).await?.len(),
                        local: target,
                        skipped: true,
                    }
                } else if options.force {
                    self.fetch(file, target).await?
                } else {
                    return Err(Error::Conflict(format!(
                        "{} already exists",
                        target.display()
                    )));
                }
            } else {
                self.fetch(file, target).await?
            };
            on_file(&transfer);
            transfers.push(transfer);
        }
        Ok(transfers)
    }

    async fn fetch(&self, file: &RemoteObject, target: PathBuf) -> Result<Transfer> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(remote = %file.path, local = %target.display(), "Downloading file");
        let size_bytes = self.repo.download_file(file, &target).await?;
        Ok(Transfer {
            remote: file.path.clone(),
            local: target,
            size_bytes,
            skipped: false,
        })
    }

    /// Upload local files below a remote destination
    ///
    /// Missing subject, experiment, container and resource levels are
    /// created on the way.
    pub async fn upload(
        &self,
        dest: &Tokenized,
        sources: &[PathBuf],
        options: &UploadOptions,
    ) -> Result<Vec<UploadedFile>> {
        check_overwrite_flags(options.force, options.skip_existing)?;
        if sources.is_empty() {
            return Err(Error::InvalidArgument("no files to upload".into()));
        }
        for source in sources {
            if !matches!(tokio::fs::metadata(source).await, Ok(m) if m.is_file()) {
                return Err(Error::NotFound(source.display().to_string()));
            }
        }

        let infer_options = InferOptions {
            modality: options.modality.clone(),
            date: options.date,
            suffix_mode: self.suffix_mode,
        };
        let target = infer_upload_chain(dest, sources, &infer_options)?;
        if target.file_name.is_some() && sources.len() != 1 {
            return Err(Error::InvalidArgument(format!(
                "{}: a destination file name requires exactly one source file",
                dest.path
            )));
        }

        let resource = self.find_or_create(&target.chain).await?;
        let mut transfers = Vec::with_capacity(sources.len());
        for source in sources {
            let name = match &target.file_name {
                Some(name) => name.clone(),
                None => source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        Error::InvalidArgument(format!("{} has no file name", source.display()))
                    })?,
            };
            let existing = self
                .repo
                .get_child(Some(&resource), EntityType::File, &name)
                .await?;
            if let Some(existing) = existing {
                if options.skip_existing {
                    warn!(remote = %existing.path, "Skipping existing file");
                    transfers.push(Transfer {
                        size_bytes: existing.size_bytes.unwrap_or_default(),
                        remote: existing.path,
                        local: source.clone(),
                        skipped: true,
                    });
                    continue;
                }
                if !options.force {
                    return Err(Error::Conflict(format!("{} already exists", existing.path)));
                }
            }
            debug!(local = %source.display(), resource = %resource.path, name = %name, "Uploading file");
            let uploaded = self
                .repo
                .upload_file(&resource, &name, source, options.force)
                .await?;
            let size_bytes = match uploaded.size_bytes {
                Some(size) => size,
                None => tokio::fs::metadata(source).await?.len(),
            };
            transfers.push(Transfer {
                remote: uploaded.path,
                local: source.clone(),
                size_bytes,
                skipped: false,
            });
        }
        Ok(transfers)
    }

    /// The objects a delete of these paths would remove
    pub async fn plan_delete(&self, paths: &[Tokenized]) -> Result<ResolvedSet> {
        for tokenized in paths {
            if tokenized.files_suffix || tokenized.path.terminal_type() == EntityType::File {
                return Err(Error::UnsupportedOperation(format!(
                    "{}: individual files cannot be deleted, delete the resource instead",
                    tokenized.path
                )));
            }
        }
        let mut result = ResolvedSet::new();
        for tokenized in paths {
            result = result.union(self.resolver().resolve_required(&tokenized.path).await?);
        }
        // The server removes contents along with their parent.
        Ok(result.without_descendants())
    }

    /// Delete every object matched by the paths, returning what was removed
    pub async fn delete(&self, paths: &[Tokenized]) -> Result<ResolvedSet> {
        let targets = self.plan_delete(paths).await?;
        for object in &targets {
            debug!(path = %object.path, "Deleting XNAT object");
            self.repo.delete(object).await?;
        }
        Ok(targets)
    }

    /// End the repository session
    pub async fn close(&self) -> Result<()> {
        self.repo.close().await
    }
}

/// Fail before any write when the levels from `depth` down cannot all be created
fn check_creatable(chain: &HierarchyChain, depth: usize) -> Result<()> {
    let segments = chain.segments();
    let prefix_path = |end: usize| {
        XnatPath::from_segments(segments[..=end].to_vec())
            .map(|p| p.to_string())
            .unwrap_or_else(|_| chain.to_string())
    };
    for (index, segment) in segments.iter().enumerate().skip(depth) {
        match segment.entity {
            EntityType::Project => return Err(Error::ChildNotFound(prefix_path(index))),
            EntityType::Experiment if chain.modality().is_none() => {
                return Err(Error::SessionNotFound(format!(
                    "{}: a modality is required to create the session",
                    prefix_path(index)
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Extend a container or resource path to select its files
fn files_below(path: &XnatPath) -> Result<XnatPath> {
    let entity = path.terminal_type();
    if entity.is_resource() {
        path.join(PathSegment::new(EntityType::File, Matcher::any()))
    } else if entity == EntityType::Experiment || entity.is_container() {
        path.join(PathSegment::new(EntityType::Resource, Matcher::any()))?
            .join(PathSegment::new(EntityType::File, Matcher::any()))
    } else if entity == EntityType::File {
        Ok(path.clone())
    } else {
        Err(Error::InvalidArgument(format!(
            "{path}: a {entity} does not hold files directly"
        )))
    }
}

/// A remote name as a relative local path that stays below its parent
fn local_component(name: &str) -> Result<&Path> {
    let relative = Path::new(name);
    let mut components = relative.components().peekable();
    if components.peek().is_none() || components.any(|c| !matches!(c, Component::Normal(_))) {
        return Err(Error::InvalidArgument(format!(
            "refusing to write remote name {name:?}"
        )));
    }
    Ok(relative)
}

/// Local path for a downloaded file
fn local_target(dest: &Path, file: &RemoteObject, layout: Layout) -> Result<PathBuf> {
    let relative = local_component(&file.name)?;
    let mut target = dest.to_path_buf();
    if layout == Layout::Hierarchical {
        let segments = file.path.segments();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if segment.entity.is_container() {
                target.push(segment.entity.name());
            }
            target.push(local_component(segment.matcher.as_str())?);
        }
    }
    target.push(relative);
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::tokenize;
    use crate::testing::MemoryRepository;
    use tempfile::TempDir;

    fn fixture() -> Xnat<MemoryRepository> {
        let repo = MemoryRepository::new();
        repo.seed("/QIN/Breast003/Session01/scan/1/resource/NIFTI/file/volume001.nii.gz");
        repo.seed("/QIN/Breast003/Session01/scan/1/resource/DICOM/file/image1.dcm");
        repo.seed("/QIN/Breast003/Session02/scan/1/resource/DICOM/file/image1.dcm");
        repo.seed("/QIN/Breast003/Session01/assessor/pk/out_resource/params/file/k.csv");
        Xnat::new(repo)
    }

    fn paths(items: &[&str]) -> Vec<Tokenized> {
        items.iter().map(|p| tokenize(p).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_find_one_rejects_wildcards() {
        let xnat = fixture();
        let path: XnatPath = "/QIN/Breast*".parse().unwrap();
        assert!(matches!(
            xnat.find_one(&path).await,
            Err(Error::InvalidArgument(_))
        ));
        let path: XnatPath = "/QIN/Breast003".parse().unwrap();
        assert_eq!(xnat.find_one(&path).await.unwrap().unwrap().name, "Breast003");
    }

    #[tokio::test]
    async fn test_expand_unions_and_sorts() {
        let xnat = fixture();
        let found = xnat
            .expand(&paths(&["/QIN/Breast003/Session02", "/QIN/Breast003/Session*"]), true)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Session01", "Session02"]);
    }

    #[tokio::test]
    async fn test_expand_missing_path_fails() {
        let xnat = fixture();
        let err = xnat
            .expand(&paths(&["/QIN/Breast003/Session09"]), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChildNotFound(_)));
    }

    #[tokio::test]
    async fn test_expand_files_suffix_lists_files() {
        let xnat = fixture();
        let found = xnat
            .expand(&paths(&["/QIN/Breast003/Session01/scan/1/files"]), true)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["image1.dcm", "volume001.nii.gz"]);
    }

    #[tokio::test]
    async fn test_find_or_create_creates_subject_and_session() {
        let xnat = fixture();
        let path: XnatPath = "/QIN/Breast005/Session01".parse().unwrap();
        let chain = HierarchyChain::new(path)
            .unwrap()
            .with_modality(Some(Modality::new("MR")));
        let session = xnat.find_or_create(&chain).await.unwrap();
        assert_eq!(session.label, "Breast005_Session01");
        assert_eq!(session.xsi_type.as_deref(), Some("xnat:mrSessionData"));

        let created = xnat.repository().created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].0, EntityType::Subject);
        assert_eq!(created[0].2, Attributes::default());
        assert_eq!(created[1].0, EntityType::Experiment);
        assert_eq!(created[1].1, "Breast005_Session01");
        assert_eq!(created[1].2.xsi_type.as_deref(), Some("xnat:mrSessionData"));

        // Idempotent: the second call finds what the first created.
        let again = xnat.find_or_create(&chain).await.unwrap();
        assert_eq!(again.uri, session.uri);
        assert_eq!(xnat.repository().created().len(), 2);
    }

    #[tokio::test]
    async fn test_find_or_create_never_creates_project() {
        let xnat = fixture();
        let path: XnatPath = "/Sarcoma/Sarcoma001".parse().unwrap();
        let err = xnat
            .find_or_create(&HierarchyChain::new(path).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChildNotFound(p) if p == "/project/Sarcoma"));
        assert!(xnat.repository().created().is_empty());
    }

    #[tokio::test]
    async fn test_find_or_create_session_requires_modality() {
        let xnat = fixture();
        let path: XnatPath = "/QIN/Breast003/Session07/scan/1".parse().unwrap();
        let err = xnat
            .find_or_create(&HierarchyChain::new(path).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_find_or_create_without_modality_writes_nothing() {
        let xnat = fixture();
        let path: XnatPath = "/QIN/Breast009/Session01".parse().unwrap();
        let err = xnat
            .find_or_create(&HierarchyChain::new(path).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(p) if p.contains("Breast009")));
        assert!(xnat.repository().created().is_empty());
        assert!(!xnat.repository().calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn test_find_or_create_scan_type_follows_session() {
        let xnat = fixture();
        let path: XnatPath = "/QIN/Breast003/Session01/scan/4/resource/NIFTI".parse().unwrap();
        xnat.find_or_create(&HierarchyChain::new(path).unwrap())
            .await
            .unwrap();
        let created = xnat.repository().created();
        assert_eq!(created[0].0, EntityType::Scan);
        assert_eq!(created[0].2.xsi_type.as_deref(), Some("xnat:mrScanData"));
        assert_eq!(created[1].0, EntityType::Resource);
    }

    #[tokio::test]
    async fn test_download_implicit_files() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let downloaded = xnat
            .download(
                &paths(&["/QIN/Breast003/Session01/scan/1/resource/NIFTI"]),
                dir.path(),
                &DownloadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(downloaded.len(), 1);
        let local = dir.path().join("volume001.nii.gz");
        assert_eq!(downloaded[0].local, local);
        assert_eq!(std::fs::read(local).unwrap(), b"volume001.nii.gz");
    }

    #[tokio::test]
    async fn test_download_hierarchical_layout() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let options = DownloadOptions {
            layout: Layout::Hierarchical,
            ..Default::default()
        };
        let downloaded = xnat
            .download(&paths(&["/QIN/Breast003/Session0*/scan/1"]), dir.path(), &options)
            .await
            .unwrap();
        assert_eq!(downloaded.len(), 3);
        assert!(dir
            .path()
            .join("QIN/Breast003/Session02/scan/1/DICOM/image1.dcm")
            .is_file());
        assert!(dir
            .path()
            .join("QIN/Breast003/Session01/scan/1/NIFTI/volume001.nii.gz")
            .is_file());
    }

    #[tokio::test]
    async fn test_download_existing_target() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let local = dir.path().join("image1.dcm");
        std::fs::write(&local, b"local").unwrap();
        let sources = paths(&["/QIN/Breast003/Session01/scan/1/resource/DICOM"]);

        let err = xnat
            .download(&sources, dir.path(), &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let skip = DownloadOptions {
            skip_existing: true,
            ..Default::default()
        };
        let downloaded = xnat.download(&sources, dir.path(), &skip).await.unwrap();
        assert!(downloaded[0].skipped);
        assert_eq!(std::fs::read(&local).unwrap(), b"local");

        let force = DownloadOptions {
            force: true,
            ..Default::default()
        };
        xnat.download(&sources, dir.path(), &force).await.unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"image1.dcm");

        let both = DownloadOptions {
            force: true,
            skip_existing: true,
            ..Default::default()
        };
        let err = xnat.download(&sources, dir.path(), &both).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_download_flat_name_collision_writes_nothing() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let sources = paths(&["/QIN/Breast003/Session*/scan/1/resource/DICOM"]);
        let force = DownloadOptions {
            force: true,
            ..Default::default()
        };
        for options in [DownloadOptions::default(), force] {
            let err = xnat.download(&sources, dir.path(), &options).await.unwrap_err();
            assert!(matches!(err, Error::Conflict(ref m) if m.contains("image1.dcm")), "{err}");
            assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        }
        assert!(!xnat.repository().calls().iter().any(|c| c.starts_with("download")));
    }

    #[tokio::test]
    async fn test_download_existing_target_checked_before_writing() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        // The colliding file is the second one the scan lists.
        std::fs::write(dir.path().join("image1.dcm"), b"local").unwrap();
        let err = xnat
            .download(
                &paths(&["/QIN/Breast003/Session01/scan/1"]),
                dir.path(),
                &DownloadOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(!dir.path().join("volume001.nii.gz").exists());
    }

    #[tokio::test]
    async fn test_download_rejects_subject() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let err = xnat
            .download(&paths(&["/QIN/Breast003"]), dir.path(), &DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_download_explicit_suffix_mode() {
        let xnat = fixture().with_suffix_mode(SuffixMode::Explicit);
        let dir = TempDir::new().unwrap();
        let err = xnat
            .download(
                &paths(&["/QIN/Breast003/Session01/scan/1/resource/NIFTI"]),
                dir.path(),
                &DownloadOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let downloaded = xnat
            .download(
                &paths(&["/QIN/Breast003/Session01/scan/1/resource/NIFTI/files"]),
                dir.path(),
                &DownloadOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(downloaded.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_creates_hierarchy() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("volume002.nii.gz");
        std::fs::write(&source, b"nifti").unwrap();

        let options = UploadOptions {
            modality: Some(Modality::new("MR")),
            ..Default::default()
        };
        let dest = tokenize("/QIN/Breast003/Session03/scan/1").unwrap();
        let uploaded = xnat
            .upload(&dest, std::slice::from_ref(&source), &options)
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(
            uploaded[0].remote.to_string(),
            "/project/QIN/subject/Breast003/experiment/Session03/scan/1/resource/NIFTI/file/volume002.nii.gz"
        );
        assert_eq!(uploaded[0].size_bytes, 5);

        let entities: Vec<_> = xnat.repository().created().iter().map(|c| c.0).collect();
        assert_eq!(
            entities,
            [EntityType::Experiment, EntityType::Scan, EntityType::Resource]
        );
    }

    #[tokio::test]
    async fn test_upload_existing_remote_file() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("image1.dcm");
        std::fs::write(&source, b"new").unwrap();
        let dest = tokenize("/QIN/Breast003/Session01/scan/1/resource/DICOM").unwrap();
        let sources = vec![source];

        let err = xnat
            .upload(&dest, &sources, &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let skip = UploadOptions {
            skip_existing: true,
            ..Default::default()
        };
        let uploaded = xnat.upload(&dest, &sources, &skip).await.unwrap();
        assert!(uploaded[0].skipped);

        let force = UploadOptions {
            force: true,
            ..Default::default()
        };
        let uploaded = xnat.upload(&dest, &sources, &force).await.unwrap();
        assert!(!uploaded[0].skipped);
        assert_eq!(uploaded[0].size_bytes, 3);
    }

    #[tokio::test]
    async fn test_upload_named_target_requires_single_source() {
        let xnat = fixture();
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.nii");
        let b = dir.path().join("b.nii");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let dest = tokenize("/QIN/Breast003/Session01/scan/1/resource/NIFTI/file/x.nii").unwrap();
        let err = xnat
            .upload(&dest, &[a.clone(), b], &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let uploaded = xnat.upload(&dest, &[a], &UploadOptions::default()).await.unwrap();
        assert!(uploaded[0].remote.to_string().ends_with("/file/x.nii"));
    }

    #[tokio::test]
    async fn test_upload_missing_source() {
        let xnat = fixture();
        let dest = tokenize("/QIN/Breast003/Session01/scan/1").unwrap();
        let err = xnat
            .upload(&dest, &[PathBuf::from("/nonexistent/a.nii")], &UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(xnat.repository().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_file_rejected_without_remote_call() {
        let xnat = fixture();
        let err = xnat
            .delete(&paths(&[
                "/QIN/Breast003/Session01/scan/1/resource/NIFTI/file/volume001.nii.gz",
            ]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert!(xnat.repository().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_files_marker_rejected_without_remote_call() {
        let xnat = fixture();
        let err = xnat
            .delete(&paths(&["/QIN/Breast003/Session01/scan/1/resource/DICOM/files"]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
        assert!(xnat.repository().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_overlapping_paths_deletes_each_object_once() {
        let xnat = fixture();
        let deleted = xnat
            .delete(&paths(&[
                "/QIN/Breast003/Session0*",
                "/QIN/Breast003/Session01/scan/1",
            ]))
            .await
            .unwrap();
        let names: Vec<_> = deleted.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Session01", "Session02"]);
        let deletes: Vec<_> = xnat
            .repository()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("delete"))
            .collect();
        assert_eq!(deletes.len(), 2);
        assert!(deletes.iter().all(|c| !c.contains("/scans/")));
    }

    #[tokio::test]
    async fn test_delete_wildcard_resources() {
        let xnat = fixture();
        let deleted = xnat
            .delete(&paths(&["/QIN/Breast003/Session*/scan/1/resource/DICOM"]))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 2);
        let deletes = xnat
            .repository()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("delete"))
            .count();
        assert_eq!(deletes, 2);

        let remaining = xnat
            .find(&"/QIN/Breast003/Session*/scan/1/resource/*".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining.first().unwrap().name, "NIFTI");
    }

    #[tokio::test]
    async fn test_plan_delete_removes_nothing() {
        let xnat = fixture();
        let planned = xnat
            .plan_delete(&paths(&["/QIN/Breast003/Session01", "/QIN/Breast003/Session0*"]))
            .await
            .unwrap();
        assert_eq!(planned.len(), 2);
        assert!(
            !xnat
                .repository()
                .calls()
                .iter()
                .any(|c| c.starts_with("delete"))
        );
    }

    #[test]
    fn test_local_target_rejects_traversal() {
        let mut file =
            RemoteObject::child_of(None, EntityType::Project, "QIN", "QIN", "/data/projects/QIN")
                .unwrap();
        file.name = "../escape".to_string();
        assert!(local_target(Path::new("/tmp"), &file, Layout::Flat).is_err());
        file.name = String::new();
        assert!(local_target(Path::new("/tmp"), &file, Layout::Flat).is_err());
    }

    #[test]
    fn test_local_target_rejects_traversal_in_ancestors() {
        let mut file =
            RemoteObject::child_of(None, EntityType::Project, "QIN", "QIN", "/data/projects/QIN")
                .unwrap();
        file.name = "image1.dcm".to_string();
        file.path = XnatPath::from_segments(vec![
            PathSegment::literal(EntityType::Project, "QIN"),
            PathSegment::literal(EntityType::Subject, ".."),
            PathSegment::literal(EntityType::Experiment, "Session01"),
            PathSegment::literal(EntityType::Resource, "DICOM"),
            PathSegment::literal(EntityType::File, "image1.dcm"),
        ])
        .unwrap();
        let dest = Path::new("/tmp/qx");
        assert!(local_target(dest, &file, Layout::Hierarchical).is_err());
        assert_eq!(
            local_target(dest, &file, Layout::Flat).unwrap(),
            dest.join("image1.dcm")
        );
    }
}
