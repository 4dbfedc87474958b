//! Path resolution and virtual directory listings.
//!
//! Listings merge two sources: real directories at or below the requested
//! path, and pseudo-directories implied by the flat paths of visible
//! artifacts. A name that is both (say `/pub/debian` exists and artifacts
//! live under `pub/debian/`) shows up once.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::access;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::model::path::RequestPath;
use crate::model::{Artifact, Directory};
use crate::store::{BlobStore, MetadataStore};

/// Guesses a content type from the file extension.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// A terminal file in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// One breadcrumb step: segment name and its link relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crumb {
    pub name: String,
    pub link: String,
}

/// Contents of a directory-like path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Effective path, `/` for the root
    pub directory: String,
    /// Child names, sorted
    pub directories: Vec<String>,
    pub breadcrumb: Vec<Crumb>,
    /// Files sorted by name
    pub files: Vec<FileEntry>,
}

/// A file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub artifact: Artifact,
    /// Current blob length
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Listing(Listing),
    File(FileRef),
}

/// Output formats for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingFormat {
    #[default]
    Json,
    Toml,
    Text,
}

impl FromStr for ListingFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "text" => Ok(Self::Text),
            other => Err(Error::bad_request(format!(
                "unsupported listing format '{other}'"
            ))),
        }
    }
}

impl ListingFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Toml => "application/toml",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn render(self, listing: &Listing) -> Result<String> {
        match self {
            Self::Json => Ok(serde_json::to_string_pretty(listing)
                .context("Failed to render listing as JSON")?),
            Self::Toml => Ok(toml::to_string(listing).context("Failed to render listing as TOML")?),
            Self::Text => {
                let mut out = String::new();
                for dir in &listing.directories {
                    out.push_str(dir);
                    out.push_str("/\n");
                }
                for file in &listing.files {
                    out.push_str(&format!("{}\t{}\n", file.name, file.size));
                }
                Ok(out)
            },
        }
    }
}

/// Resolves request paths to listings or files.
#[derive(Clone)]
pub struct PathResolver {
    store: MetadataStore,
    blobs: Arc<dyn BlobStore>,
}

impl PathResolver {
    pub fn new(store: MetadataStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Parses `raw` and dispatches to [`Self::list`] or [`Self::file`].
    pub fn resolve(&self, raw: &str, identity: &Identity) -> Result<Resolved> {
        let path = RequestPath::parse(raw)?;
        if path.is_listing() {
            self.list(&path, identity).map(Resolved::Listing)
        } else {
            self.file(&path, identity).map(Resolved::File)
        }
    }

    /// Builds the listing of a directory-like path.
    ///
    /// # Errors
    ///
    /// `NotFound` when nothing visible lives at or below a non-root path.
    pub fn list(&self, path: &RequestPath, identity: &Identity) -> Result<Listing> {
        let dirname = path.directory_path();
        let mut children = BTreeSet::new();
        let mut in_real_directory = false;

        for directory in self.store.directories_at_or_under(&dirname)? {
            if !access::is_visible(&directory, identity) {
                continue;
            }
            if directory.path == dirname {
                in_real_directory = true;
                continue;
            }
            if let Some(child) = first_segment(&directory.path[dirname.len() + 1..]) {
                children.insert(child.to_string());
            }
        }

        let prefix = if path.is_root() {
            String::new()
        } else {
            format!("{}/", path.artifact_path())
        };

        let mut files = Vec::new();
        let mut owners = DirectoryCache::new(&self.store);
        for artifact in self.store.artifacts_with_prefix(&prefix)? {
            if !owners.is_visible(&artifact, identity)? {
                continue;
            }
            let relative = &artifact.path[prefix.len()..];
            match relative.split_once('/') {
                Some((pseudo, _)) => {
                    children.insert(pseudo.to_string());
                },
                None => match self.blobs.len(&artifact.path)? {
                    Some(size) => files.push(FileEntry {
                        name: relative.to_string(),
                        size,
                    }),
                    // Deleted between the metadata scan and now
                    None => tracing::debug!(path = %artifact.path, "Skipping artifact without blob"),
                },
            }
        }

        if children.is_empty() && files.is_empty() && !in_real_directory && !path.is_root() {
            return Err(Error::not_found(format!("{dirname}/")));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Listing {
            directory: if path.is_root() { "/".to_string() } else { dirname },
            directories: children.into_iter().collect(),
            breadcrumb: breadcrumb(path),
            files,
        })
    }

    /// Looks up a visible artifact by exact path.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown artifacts or vanished blobs, `Forbidden`
    /// when the owning directory is not visible.
    pub fn file(&self, path: &RequestPath, identity: &Identity) -> Result<FileRef> {
        let artifact = self.visible_artifact(&path.artifact_path(), identity)?;
        self.file_ref(artifact)
    }

    /// Pairs an artifact with its current blob size, without access checks.
    pub(crate) fn file_ref(&self, artifact: Artifact) -> Result<FileRef> {
        let size = self
            .blobs
            .len(&artifact.path)?
            .ok_or_else(|| Error::not_found(artifact.path.clone()))?;
        let content_type = content_type_for(artifact.name());
        Ok(FileRef {
            artifact,
            size,
            content_type,
        })
    }

    /// Artifact at `path` if `identity` may see it.
    pub(crate) fn visible_artifact(&self, path: &str, identity: &Identity) -> Result<Artifact> {
        let artifact = self
            .store
            .get_artifact(path)?
            .ok_or_else(|| Error::not_found(path.to_string()))?;
        let mut owners = DirectoryCache::new(&self.store);
        if !owners.is_visible(&artifact, identity)? {
            tracing::info!(target: "audit", path = %artifact.path, identity = %identity, "Read denied");
            return Err(Error::forbidden(format!("'{path}' is not visible")));
        }
        Ok(artifact)
    }
}

fn first_segment(remainder: &str) -> Option<&str> {
    remainder.split('/').next().filter(|s| !s.is_empty())
}

fn breadcrumb(path: &RequestPath) -> Vec<Crumb> {
    let mut link = String::new();
    path.segments()
        .iter()
        .map(|segment| {
            link.push_str(segment);
            link.push('/');
            Crumb {
                name: segment.clone(),
                link: link.clone(),
            }
        })
        .collect()
}

/// Memoizes owning-directory lookups during a single resolution.
struct DirectoryCache<'a> {
    store: &'a MetadataStore,
    seen: HashMap<String, Option<Directory>>,
}

impl<'a> DirectoryCache<'a> {
    fn new(store: &'a MetadataStore) -> Self {
        Self {
            store,
            seen: HashMap::new(),
        }
    }

    /// An artifact whose directory is gone is never visible.
    fn is_visible(&mut self, artifact: &Artifact, identity: &Identity) -> Result<bool> {
        if !self.seen.contains_key(&artifact.directory) {
            let directory = self.store.get_directory(&artifact.directory)?;
            self.seen.insert(artifact.directory.clone(), directory);
        }
        Ok(self
            .seen
            .get(&artifact.directory)
            .and_then(Option::as_ref)
            .is_some_and(|directory| access::is_visible(directory, identity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, Owner};
    use crate::store::MemoryBlobs;
    use chrono::Utc;
    use proptest::prelude::*;

    struct Fixture {
        store: MetadataStore,
        blobs: Arc<MemoryBlobs>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MetadataStore::memory(),
                blobs: Arc::new(MemoryBlobs::new()),
            }
        }

        fn dir(&self, directory: Directory) -> &Self {
            self.store.create_directory(&directory).unwrap();
            self
        }

        fn file(&self, path: &str, directory: &str, data: &[u8]) -> &Self {
            self.store
                .create_artifact(&Artifact {
                    path: path.to_string(),
                    directory: directory.to_string(),
                    is_permanent: true,
                    created_at: Utc::now(),
                })
                .unwrap();
            self.blobs.write(path, data).unwrap();
            self
        }

        fn resolver(&self) -> PathResolver {
            PathResolver::new(self.store.clone(), self.blobs.clone())
        }
    }

    fn debian() -> Fixture {
        let fx = Fixture::new();
        fx.dir(Directory::new("/pub").unwrap().public(true))
            .dir(
                Directory::new("/pub/debian")
                    .unwrap()
                    .public(true)
                    .with_owner(Owner::User("user1".into())),
            )
            .file("pub/debian/2015/01/debian-6.iso", "/pub/debian", b"debian-6.iso");
        fx
    }

    fn listing(resolver: &PathResolver, raw: &str, identity: &Identity) -> Listing {
        match resolver.resolve(raw, identity).unwrap() {
            Resolved::Listing(listing) => listing,
            Resolved::File(file) => panic!("expected a listing, got {file:?}"),
        }
    }

    #[test]
    fn test_pseudo_directories() {
        let fx = debian();
        let resolver = fx.resolver();
        let anon = Identity::Anonymous;

        let l = listing(&resolver, "pub/debian/", &anon);
        assert_eq!(l.directory, "/pub/debian");
        assert_eq!(l.directories, vec!["2015"]);
        assert!(l.files.is_empty());

        let l = listing(&resolver, "pub/debian/2015/01/", &anon);
        assert!(l.directories.is_empty());
        assert_eq!(
            l.files,
            vec![FileEntry {
                name: "debian-6.iso".into(),
                size: 12
            }]
        );
    }

    #[test]
    fn test_overlapping_directories_listed_once() {
        let fx = debian();
        fx.file("pub/debian/readme", "/pub/debian", b"x");
        let l = listing(&fx.resolver(), "pub/", &Identity::Anonymous);
        assert_eq!(l.directories, vec!["debian"]);
        assert!(l.files.is_empty());
    }

    #[test]
    fn test_root_always_listable() {
        let fx = Fixture::new();
        let l = listing(&fx.resolver(), "", &Identity::Anonymous);
        assert_eq!(l.directory, "/");
        assert!(l.directories.is_empty());
        assert!(l.breadcrumb.is_empty());

        let l = listing(&debian().resolver(), "/", &Identity::Anonymous);
        assert_eq!(l.directories, vec!["pub"]);
    }

    #[test]
    fn test_missing_or_hidden_is_not_found() {
        let fx = debian();
        fx.dir(Directory::new("/home/user1").unwrap().with_owner(Owner::User("user1".into())))
            .file("home/user1/secret.txt", "/home/user1", b"s");
        let resolver = fx.resolver();

        let err = resolver.resolve("nope/", &Identity::Anonymous).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = resolver.resolve("home/user1/", &Identity::Anonymous).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let user1 = Identity::user(Account::new("user1"));
        let l = listing(&resolver, "home/user1/", &user1);
        assert_eq!(l.files.len(), 1);

        // Empty but real and visible
        fx.dir(Directory::new("/empty").unwrap().public(true));
        assert!(listing(&resolver, "empty/", &Identity::Anonymous).files.is_empty());
    }

    #[test]
    fn test_segment_boundary() {
        let fx = Fixture::new();
        fx.dir(Directory::new("/pub").unwrap().public(true))
            .dir(Directory::new("/public").unwrap().public(true))
            .file("public/a.txt", "/public", b"a");
        let l = listing(&fx.resolver(), "pub/", &Identity::Anonymous);
        assert!(l.directories.is_empty());
        assert!(l.files.is_empty());
    }

    #[test]
    fn test_file_resolution() {
        let fx = debian();
        fx.dir(Directory::new("/home/user1").unwrap().with_owner(Owner::User("user1".into())))
            .file("home/user1/data.json", "/home/user1", b"{}")
            .file("pub/debian/index.json", "/pub/debian", b"[]");
        let resolver = fx.resolver();

        match resolver
            .resolve("pub/debian/2015/01/debian-6.iso", &Identity::Anonymous)
            .unwrap()
        {
            Resolved::File(file) => {
                assert_eq!(file.size, 12);
                assert_eq!(file.content_type, content_type_for("debian-6.iso"));
            },
            Resolved::Listing(_) => panic!("expected a file"),
        }

        match resolver
            .resolve("pub/debian/index.json", &Identity::Anonymous)
            .unwrap()
        {
            Resolved::File(file) => assert_eq!(file.content_type, "application/json"),
            Resolved::Listing(_) => panic!("expected a file"),
        }

        let err = resolver
            .resolve("home/user1/data.json", &Identity::Anonymous)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = resolver.resolve("pub/nothing", &Identity::Anonymous).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        // Blob vanished behind the metadata
        fx.blobs.delete("pub/debian/2015/01/debian-6.iso").unwrap();
        let err = resolver
            .resolve("pub/debian/2015/01/debian-6.iso", &Identity::Anonymous)
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_breadcrumb() {
        let l = listing(&debian().resolver(), "pub/debian/2015/", &Identity::Anonymous);
        let links: Vec<(&str, &str)> = l
            .breadcrumb
            .iter()
            .map(|c| (c.name.as_str(), c.link.as_str()))
            .collect();
        assert_eq!(
            links,
            vec![
                ("pub", "pub/"),
                ("debian", "pub/debian/"),
                ("2015", "pub/debian/2015/")
            ]
        );
    }

    #[test]
    fn test_formats() {
        let l = listing(&debian().resolver(), "pub/debian/2015/01/", &Identity::Anonymous);

        let json: serde_json::Value =
            serde_json::from_str(&ListingFormat::Json.render(&l).unwrap()).unwrap();
        assert_eq!(json["files"][0]["name"], "debian-6.iso");
        assert_eq!(json["files"][0]["size"], 12);

        let text = ListingFormat::Text.render(&l).unwrap();
        assert_eq!(text, "debian-6.iso\t12\n");

        let toml_out = ListingFormat::Toml.render(&l).unwrap();
        assert!(toml_out.contains("directory = \"/pub/debian/2015/01\""));

        assert!(matches!(
            "yaml".parse::<ListingFormat>(),
            Err(Error::BadRequest(_))
        ));
    }

    fn name_strategy() -> impl Strategy<Value = String> {
        "[a-cA-C0-9._-]{1,4}"
            .prop_filter("no dot segments", |s| s != "." && s != "..")
    }

    fn paths_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
        prop::collection::vec(prop::collection::vec(name_strategy(), 1..4), 0..20)
    }

    proptest! {
        #[test]
        fn listing_sorted_and_idempotent(paths in paths_strategy()) {
            let fx = Fixture::new();
            fx.dir(Directory::new("/pub").unwrap().public(true));
            for segments in &paths {
                let path = format!("pub/{}", segments.join("/"));
                if fx.store.get_artifact(&path).unwrap().is_none() {
                    fx.file(&path, "/pub", b"x");
                }
            }
            let resolver = fx.resolver();

            let first = listing(&resolver, "pub/", &Identity::Anonymous);
            let second = listing(&resolver, "pub/", &Identity::Anonymous);
            prop_assert_eq!(&first, &second);

            let mut dirs = first.directories.clone();
            dirs.sort();
            dirs.dedup();
            prop_assert_eq!(&dirs, &first.directories);

            let names: Vec<&String> = first.files.iter().map(|f| &f.name).collect();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(names, sorted);
        }
    }
}
