//! Runtime loading of exporter libraries.

use std::path::{Path, PathBuf};

use handoff_core::ArrowArray;
use libloading::Library;
use tracing::debug;

/// Signature of an exporter symbol: `void (*)(struct ArrowArray*)`.
pub type ExportFn = unsafe extern "C" fn(array: *mut ArrowArray);

/// Errors raised while loading an exporter.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The shared library could not be found or loaded.
    #[error("Failed to load exporter library {}: {source}", .path.display())]
    LibraryNotFound {
        /// Requested library path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },

    /// The library does not export the requested symbol.
    #[error("Symbol `{symbol}` not found in {}: {source}", .path.display())]
    SymbolNotFound {
        /// Requested symbol.
        symbol: String,
        /// Library that was searched.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
}

/// A loaded exporter library.
///
/// Descriptors filled by the library reference its release callback, so
/// they must be released before the library is dropped.
#[derive(Debug)]
pub struct ExporterLibrary {
    library: Library,
    path: PathBuf,
}

impl ExporterLibrary {
    /// Load the shared library at `path`.
    ///
    /// Loading runs the library's initialization routines; only open
    /// libraries you trust.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::LibraryNotFound`] if the library cannot be loaded.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        // SAFETY: the caller vouches for the library's initializers.
        let library = unsafe { Library::new(&path) }.map_err(|source| LoadError::LibraryNotFound {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "loaded exporter library");
        Ok(Self { library, path })
    }

    /// Path the library was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the library exports `symbol`.
    #[must_use]
    pub fn has_symbol(&self, symbol: &str) -> bool {
        // SAFETY: only the address is looked up, nothing is called.
        unsafe { self.library.get::<*const ()>(symbol.as_bytes()).is_ok() }
    }

    /// Resolve `symbol` and let it fill `slot`.
    ///
    /// A populated `slot` is released first so its buffers are not leaked.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::SymbolNotFound`] if the symbol is missing; `slot`
    /// is untouched in that case.
    pub fn export_into(&self, symbol: &str, slot: &mut ArrowArray) -> Result<(), LoadError> {
        // SAFETY: exporter symbols have the `ExportFn` signature.
        let export = unsafe { self.library.get::<ExportFn>(symbol.as_bytes()) }.map_err(|source| {
            LoadError::SymbolNotFound {
                symbol: symbol.to_string(),
                path: self.path.clone(),
                source,
            }
        })?;
        slot.release_in_place();
        *slot = ArrowArray::empty();
        debug!(symbol, path = %self.path.display(), "calling exporter");
        // SAFETY: `slot` is a valid, writable descriptor for the duration of
        // the call and the library outlives the symbol.
        unsafe { export(slot) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_names_path() {
        let err = ExporterLibrary::open("/nonexistent/libarrow_exporter.so").unwrap_err();
        assert!(matches!(err, LoadError::LibraryNotFound { .. }));
        assert!(err.to_string().contains("/nonexistent/libarrow_exporter.so"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_missing_symbol_names_symbol() {
        let library = ExporterLibrary::open("libc.so.6").unwrap();
        assert!(library.has_symbol("malloc"));
        assert!(!library.has_symbol("export_int32_data"));

        let mut slot = ArrowArray::empty();
        let err = library.export_into("export_int32_data", &mut slot).unwrap_err();
        match &err {
            LoadError::SymbolNotFound { symbol, path, .. } => {
                assert_eq!(symbol, "export_int32_data");
                assert_eq!(path, Path::new("libc.so.6"));
            }
            LoadError::LibraryNotFound { .. } => panic!("unexpected error: {err}"),
        }
        assert!(err.to_string().contains("export_int32_data"));
        assert!(slot.is_empty_slot());
    }
}
