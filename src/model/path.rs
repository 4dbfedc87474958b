//! Path validation and normalization.
//!
//! Directory paths are stored absolute (`/pub/debian`), artifact paths
//! relative (`pub/debian/file.iso`). Request paths arrive from the dispatch
//! layer in either form; a trailing `/` marks a listing request.

use crate::error::{Error, Result};

/// Checks that a directory path is absolute, normalized and has no
/// trailing slash.
///
/// # Errors
///
/// Returns a validation error naming the offending path.
pub fn validate_directory_path(path: &str) -> Result<()> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(Error::validation(format!(
            "expecting an absolute path: '{path}'"
        )));
    };
    if rest.is_empty() {
        return Err(Error::validation("the root cannot be a directory"));
    }
    for segment in rest.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(Error::validation(format!(
                "expecting a normalized path without trailing slashes: '{path}'"
            )));
        }
    }
    Ok(())
}

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    segments: Vec<String>,
    is_listing: bool,
}

impl RequestPath {
    /// Parses and normalizes a request path.
    ///
    /// Empty and `.` segments are dropped. An empty path is the root
    /// listing.
    ///
    /// # Errors
    ///
    /// Returns a bad request error if a segment is `..`.
    pub fn parse(raw: &str) -> Result<Self> {
        let is_listing = raw.is_empty() || raw.ends_with('/');
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    return Err(Error::bad_request(format!(
                        "path cannot contain '..': {raw}"
                    )));
                },
                other => segments.push(other.to_string()),
            }
        }
        // "/" and "" both name the root listing
        let is_listing = is_listing || segments.is_empty();
        Ok(Self {
            segments,
            is_listing,
        })
    }

    /// True when the request asks for a directory listing.
    pub fn is_listing(&self) -> bool {
        self.is_listing
    }

    /// True for the root listing.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Absolute directory form: `/pub/debian`, or the empty string for root.
    pub fn directory_path(&self) -> String {
        self.segments
            .iter()
            .fold(String::new(), |acc, s| acc + "/" + s)
    }

    /// Relative artifact form: `pub/debian/file.iso`.
    pub fn artifact_path(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

/// Reduces an uploaded file name to a safe single path segment.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}
