//! Bottle extraction and library collection.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::InstallError;

/// Unpack a `.tar.gz` bundle into `dest`, creating it if needed.
pub fn extract_bundle(package: &str, archive: &Path, dest: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(dest).map_err(|e| InstallError::io(dest, e))?;
    let file = File::open(archive).map_err(|e| InstallError::io(archive, e))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.unpack(dest).map_err(|e| InstallError::Extract {
        package: package.to_string(),
        reason: e.to_string(),
    })?;
    debug!(package = %package, dest = %dest.display(), "Extracted bundle");
    Ok(())
}

/// Whether a file name looks like a shared library on any supported host.
pub fn is_shared_library_name(name: &str) -> bool {
    name.ends_with(".dylib") || name.ends_with(".dll") || name.ends_with(".so") || name.contains(".so.")
}

/// Every shared library below `root`, sorted.
pub fn collect_libraries(root: &Path) -> Result<Vec<PathBuf>, InstallError> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| InstallError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| InstallError::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| InstallError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if entry
                .file_name()
                .to_str()
                .is_some_and(is_shared_library_name)
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Copy each library into `lib_dir` under its bare file name.
///
/// Symlinked aliases are copied as regular files. Returns the copied paths.
pub fn flatten_libraries(libraries: &[PathBuf], lib_dir: &Path) -> Result<Vec<PathBuf>, InstallError> {
    fs::create_dir_all(lib_dir).map_err(|e| InstallError::io(lib_dir, e))?;
    let mut copied = Vec::with_capacity(libraries.len());
    for source in libraries {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = lib_dir.join(name);
        fs::copy(source, &target).map_err(|e| InstallError::io(source, e))?;
        copied.push(target);
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vl_extract_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn bottle(path: &Path, files: &[(&str, &[u8])]) {
        let gz = GzEncoder::new(File::create(path).unwrap(), Compression::fast());
        let mut builder = tar::Builder::new(gz);
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn extracts_and_flattens_libraries() {
        let dir = scratch("flatten");
        let archive = dir.join("mpv.tar.gz");
        bottle(
            &archive,
            &[
                ("mpv/0.38.0/lib/libmpv.2.dylib", b"macho"),
                ("mpv/0.38.0/lib/pkgconfig/mpv.pc", b"pc"),
                ("mpv/0.38.0/bin/mpv", b"exe"),
            ],
        );

        let out = dir.join("staging/mpv");
        extract_bundle("mpv", &archive, &out).unwrap();
        let libs = collect_libraries(&out).unwrap();
        assert_eq!(libs.len(), 1);
        assert!(libs[0].ends_with("lib/libmpv.2.dylib"));

        let lib_dir = dir.join("staging/lib");
        let copied = flatten_libraries(&libs, &lib_dir).unwrap();
        assert_eq!(copied, vec![lib_dir.join("libmpv.2.dylib")]);
        assert_eq!(fs::read(&copied[0]).unwrap(), b"macho");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_archive_is_extract_error() {
        let dir = scratch("garbage");
        let archive = dir.join("bad.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();
        let err = extract_bundle("bad", &archive, &dir.join("out")).unwrap_err();
        assert!(matches!(err, InstallError::Extract { .. }));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn library_names() {
        assert!(is_shared_library_name("libmpv.2.dylib"));
        assert!(is_shared_library_name("libmpv.so.2"));
        assert!(is_shared_library_name("libmpv.so"));
        assert!(is_shared_library_name("libmpv-2.dll"));
        assert!(!is_shared_library_name("mpv.pc"));
        assert!(!is_shared_library_name("libsomething.a"));
    }
}
