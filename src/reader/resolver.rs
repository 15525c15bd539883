//! Resolution of external identifiers to input sources

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::errors::Result;

use super::input::{InputSource, ReadSource, StrSource};

/// Supplies the external subset and external parsed entities.
///
/// A source handed out by [`resolve_input`](Self::resolve_input) is given
/// back to [`release_input`](Self::release_input) once the reader has
/// consumed it, or when the reader is reset while still reading it.
pub trait XmlResolver {
    /// Opens the resource named by the identifiers. `Ok(None)` means the
    /// resource is unknown; the reader then carries on without it.
    fn resolve_input(
        &mut self,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<Box<dyn InputSource>>>;

    /// Takes back a source returned by `resolve_input`.
    fn release_input(&mut self, input: Box<dyn InputSource>) {
        drop(input);
    }
}

/// Resolves system identifiers as file paths relative to a base directory.
///
/// Identifiers that are absolute or climb out of the base directory with
/// `..` are not resolved.
#[derive(Clone, Debug)]
pub struct FileResolver {
    base: PathBuf,
}

impl FileResolver {
    /// Creates a resolver reading files below `base`.
    pub fn new<P: Into<PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }
}

impl XmlResolver for FileResolver {
    fn resolve_input(
        &mut self,
        _public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<Box<dyn InputSource>>> {
        let system_id = match system_id {
            Some(id) => id.strip_prefix("file://").unwrap_or(id),
            None => return Ok(None),
        };
        if !is_below(Path::new(system_id)) {
            debug!("{} is outside of {}, not resolved", system_id, self.base.display());
            return Ok(None);
        }
        let path = self.base.join(system_id);
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(ReadSource::new(BufReader::new(file))))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{} not found", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Whether `path` stays below the directory it is joined to.
fn is_below(path: &Path) -> bool {
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => depth -= 1,
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

/// Resolves system identifiers against a fixed set of in-memory documents.
#[derive(Clone, Debug, Default)]
pub struct MemoryResolver {
    documents: HashMap<String, String>,
}

impl MemoryResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `text` under `system_id`.
    pub fn with<S: Into<String>, T: Into<String>>(mut self, system_id: S, text: T) -> Self {
        self.documents.insert(system_id.into(), text.into());
        self
    }
}

impl XmlResolver for MemoryResolver {
    fn resolve_input(
        &mut self,
        _public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<Option<Box<dyn InputSource>>> {
        Ok(system_id
            .and_then(|id| self.documents.get(id))
            .map(|text| Box::new(StrSource::new(text.as_str())) as Box<dyn InputSource>))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory() {
        let mut resolver = MemoryResolver::new().with("a.dtd", "<!ELEMENT a ANY>");
        let mut source = resolver.resolve_input(None, Some("a.dtd")).unwrap().unwrap();
        assert_eq!(source.get(), Some('<'));
        resolver.release_input(source);
        assert!(resolver.resolve_input(None, Some("b.dtd")).unwrap().is_none());
        assert!(resolver.resolve_input(Some("-//A//B"), None).unwrap().is_none());
    }

    #[test]
    fn missing_file() {
        let mut resolver = FileResolver::new(env!("CARGO_MANIFEST_DIR"));
        assert!(resolver
            .resolve_input(None, Some("tests/documents/missing.dtd"))
            .unwrap()
            .is_none());
        assert!(resolver
            .resolve_input(None, Some("tests/documents/external.dtd"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn outside_base() {
        let base = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/documents");
        let mut resolver = FileResolver::new(base);
        assert!(resolver
            .resolve_input(None, Some("../../Cargo.toml"))
            .unwrap()
            .is_none());
        assert!(resolver
            .resolve_input(None, Some(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")))
            .unwrap()
            .is_none());
        assert!(resolver
            .resolve_input(None, Some("file:///etc/hostname"))
            .unwrap()
            .is_none());
        assert!(resolver
            .resolve_input(None, Some("./external.dtd"))
            .unwrap()
            .is_some());
    }
}
