//! This module provides a local cache for the free/busy information of other people
//!
//! Every person gets their own `<email>.ifb` file, holding a PUBLISH message with their VFREEBUSY.

use std::path::{Path, PathBuf};

use crate::config::FREEBUSY_FILE_EXTENSION;
use crate::error::CacheError;
use crate::freebusy::FreeBusy;
use crate::ical::{decode_free_busy, encode_free_busy};
use crate::itip::Method;
use crate::utils::new_uid;

/// A directory of cached free/busy files
#[derive(Clone, Debug, PartialEq)]
pub struct FreeBusyCache {
    folder: PathBuf,
}

impl FreeBusyCache {
    /// The folder does not need to exist yet, it is created on the first write
    pub fn new(folder: &Path) -> Self {
        Self { folder: PathBuf::from(folder) }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Get the path to the cache file of `email`
    pub fn file_for(&self, email: &str) -> PathBuf {
        let name = sanitize_filename::sanitize(email.trim().to_lowercase());
        self.folder.join(format!("{}.{}", name, FREEBUSY_FILE_EXTENSION))
    }

    /// Returns the cached free/busy information of `email`, or `None` when nothing was cached
    pub fn load(&self, email: &str) -> Result<Option<FreeBusy>, CacheError> {
        let path = self.file_for(email);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path, err)),
        };
        let free_busy = decode_free_busy(&content)?;
        Ok(Some(free_busy))
    }

    /// Stores the free/busy information of its owner.
    pub fn save(&self, free_busy: &FreeBusy) -> Result<PathBuf, CacheError> {
        self.save_as(&free_busy.owner, free_busy)
    }

    /// Stores free/busy information under the entry of `email`, whoever the data claims to belong to.
    ///
    /// The data is written to a temporary file first, so that an interrupted save leaves the previous entry untouched.
    pub fn save_as(&self, email: &str, free_busy: &FreeBusy) -> Result<PathBuf, CacheError> {
        std::fs::create_dir_all(&self.folder).map_err(|err| io_error(&self.folder, err))?;

        let path = self.file_for(email);
        let temp_path = self.folder.join(format!(".{}.tmp", new_uid()));
        let content = encode_free_busy(free_busy, Some(Method::Publish));

        std::fs::write(&temp_path, content).map_err(|err| io_error(&temp_path, err))?;
        if let Err(err) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(io_error(&path, err));
        }
        log::debug!("Cached free/busy of {} into {:?}", email, path);
        Ok(path)
    }

    /// Forgets the cached information of `email`. Returns whether there was some.
    pub fn remove(&self, email: &str) -> Result<bool, CacheError> {
        let path = self.file_for(email);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io { path: path.display().to_string(), source }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::freebusy::Period;

    #[test]
    fn file_names() {
        let cache = FreeBusyCache::new(Path::new("/tmp/fb"));
        assert_eq!(cache.file_for(" Bob@Example.com"), PathBuf::from("/tmp/fb/bob@example.com.ifb"));
        assert_eq!(cache.file_for("../../etc/passwd").parent(), Some(Path::new("/tmp/fb")));
    }

    #[test]
    fn save_and_load() {
        let folder = std::env::temp_dir().join(format!("rendezvous-cache-{}", new_uid())).join("freebusy");
        let cache = FreeBusyCache::new(&folder);
        assert_eq!(cache.load("bob@example.com").unwrap(), None);

        let at = |h: u32| Utc.ymd(2024, 3, 1).and_hms(h, 0, 0);
        let fb = FreeBusy::new("bob@example.com", at(0), at(23), vec![Period::new(at(10), at(11))]);
        let path = cache.save(&fb).unwrap();
        assert!(path.ends_with("bob@example.com.ifb"));
        assert_eq!(cache.load("BOB@example.com").unwrap(), Some(fb));

        assert!(cache.remove("bob@example.com").unwrap());
        assert!(cache.remove("bob@example.com").unwrap() == false);
        let _ = std::fs::remove_dir_all(folder.parent().unwrap());
    }
}
