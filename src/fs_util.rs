use std::fs;
use std::io::Write;

use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::error::CatalogError;

/// Writes `bytes` to a temp file next to `path` and renames it into place.
pub fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> Result<(), CatalogError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|err| CatalogError::Filesystem(format!("create {parent}: {err}")))?;

    let mut file = NamedTempFile::new_in(parent)
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    file.write_all(bytes)
        .map_err(|err| CatalogError::Filesystem(format!("write {path}: {err}")))?;
    file.persist(path)
        .map_err(|err| CatalogError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let path = root.join("nested/out.csv");
        write_atomic(&path, b"a,b\n").unwrap();
        write_atomic(&path, b"c,d\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "c,d\n");
    }
}
