use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, ReadDir},
    io,
    path::Path,
};

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("{0} (from='{1}', to='{2}'): {3}")]
        FromToIO(Msg, PathBuf, PathBuf, #[source] io::Error),

        #[error("Cannot serialize to TOML (dest='{0}'): {1}")]
        SerializeToToml(PathBuf, #[source] toml::ser::Error),

        #[error("Cannot deserialize from TOML (src='{0}'): {1}")]
        DeserializeFromToml(PathBuf, #[source] toml::de::Error),
    }

    impl Error {
        /// Returns true if the underlying I/O error is `NotFound`.
        pub fn is_not_found(&self) -> bool {
            match self {
                Self::SingleIO(_, _, e) | Self::FromToIO(_, _, _, e) => {
                    e.kind() == io::ErrorKind::NotFound
                }
                _ => false,
            }
        }
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_with_mkdir<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    if let Some(dir) = filepath.as_ref().parent() {
        self::mkdir_all(dir)?;
    }
    self::write(filepath, contents)
}

#[must_use]
pub fn read(filepath: impl AsRef<Path>) -> Result<Vec<u8>> {
    fs::read(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

/// Like [`read`], but a missing file is `Ok(None)` instead of an error.
#[must_use]
pub fn read_if_exists(filepath: impl AsRef<Path>) -> Result<Option<Vec<u8>>> {
    match fs::read(&filepath) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::SingleIO(
            "Cannot read file",
            filepath.as_ref().to_owned(),
            e,
        )),
    }
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn remove_file(filepath: impl AsRef<Path>) -> Result<()> {
    fs::remove_file(&filepath)
        .map_err(|e| Error::SingleIO("Cannot remove file", filepath.as_ref().to_owned(), e))
}

/// Removes the file if present. Returns whether something was removed.
#[must_use]
pub fn remove_file_if_exists(filepath: impl AsRef<Path>) -> Result<bool> {
    match fs::remove_file(&filepath) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::SingleIO(
            "Cannot remove file",
            filepath.as_ref().to_owned(),
            e,
        )),
    }
}

#[must_use]
pub fn remove_dir_all(dir: impl AsRef<Path>) -> Result<()> {
    fs::remove_dir_all(&dir)
        .map_err(|e| Error::SingleIO("Cannot remove dir", dir.as_ref().to_owned(), e))
}

/// Removes `path` whether it is a file or a directory tree. Missing is fine.
#[must_use]
pub fn remove_all_if_exists(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => self::remove_dir_all(path),
        Ok(_) => self::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::SingleIO("Cannot stat path", path.to_owned(), e)),
    }
}

#[must_use]
pub fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<u64> {
    fs::copy(&from, &to).map_err(|e| {
        Error::FromToIO(
            "Cannot copy file",
            from.as_ref().to_owned(),
            to.as_ref().to_owned(),
            e,
        )
    })
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

#[must_use]
pub fn write_toml_with_mkdir<P, T>(filepath: P, data: &T) -> Result<()>
where
    P: AsRef<Path>,
    T: Serialize,
{
    let s = toml::to_string_pretty(data)
        .map_err(|e| Error::SerializeToToml(filepath.as_ref().to_owned(), e))?;
    write_with_mkdir(filepath, &s)
}

#[must_use]
pub fn read_toml_with_deserialize<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let filepath = filepath.as_ref();
    let s = self::read_to_string(filepath)?;
    toml::from_str(&s).map_err(|e| Error::DeserializeFromToml(filepath.to_owned(), e))
}

/// Whether `path` is a regular file with any execute bit set.
#[cfg(unix)]
pub fn is_executable_file(path: impl AsRef<Path>) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn read_if_exists_distinguishes_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");

        assert_eq!(read_if_exists(&path).unwrap(), None);
        write_with_mkdir(&path, "hello").unwrap();
        assert_eq!(read_if_exists(&path).unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn remove_helpers_tolerate_missing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        let tree = dir.path().join("tree");

        assert_eq!(remove_file_if_exists(&file).unwrap(), false);
        write(&file, "").unwrap();
        assert_eq!(remove_file_if_exists(&file).unwrap(), true);
        assert!(!file.exists());

        write_with_mkdir(tree.join("deep/leaf"), "x").unwrap();
        remove_all_if_exists(&tree).unwrap();
        assert!(!tree.exists());
        remove_all_if_exists(&tree).unwrap();
    }

    #[test]
    fn missing_file_error_is_not_found() {
        let err = read_to_string("/nonexistent/definitely/not/here").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn toml_roundtrip_through_disk() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Rec {
            name: String,
            limit: u64,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/rec.toml");
        let rec = Rec {
            name: "cpp".into(),
            limit: 2000,
        };
        write_toml_with_mkdir(&path, &rec).unwrap();
        let got: Rec = read_toml_with_deserialize(&path).unwrap();
        assert_eq!(got, rec);
    }

    #[cfg(unix)]
    #[test]
    fn executable_bit_is_detected() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gen.sh");
        write(&path, "#!/bin/sh\n").unwrap();
        assert!(!is_executable_file(&path));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(is_executable_file(&path));
        assert!(!is_executable_file(dir.path()));
    }
}
