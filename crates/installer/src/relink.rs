//! Load-path rewriting for extracted libraries.
//!
//! Bottles reference their dependencies through the build-time prefix,
//! either as a templated placeholder (`@@HOMEBREW_PREFIX@@/opt/x/lib/..`)
//! or as a literal absolute path (`/opt/homebrew/opt/x/lib/..`). Both forms
//! are rewritten to point into the flat install directory.
//!
//! Planning is pure; the [`Relinker`] seam inspects and patches binaries.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::InstallError;

/// Templated prefixes written into bottles at build time.
pub const PLACEHOLDER_PREFIXES: &[&str] = &["@@HOMEBREW_PREFIX@@", "@@HOMEBREW_CELLAR@@"];

/// Literal prefixes of the default install locations.
pub const LITERAL_PREFIXES: &[&str] = &["/opt/homebrew", "/usr/local"];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryFormat {
    MachO,
    Elf,
}

/// Detect the object format from the first four bytes.
pub fn detect_format(path: &Path) -> Result<Option<BinaryFormat>, InstallError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).map_err(|e| InstallError::io(path, e))?;
    if file.read_exact(&mut magic).is_err() {
        return Ok(None);
    }
    Ok(format_from_magic(magic))
}

pub fn format_from_magic(magic: [u8; 4]) -> Option<BinaryFormat> {
    match u32::from_be_bytes(magic) {
        // thin 32/64 in both byte orders, and fat
        0xfeed_face | 0xfeed_facf | 0xcefa_edfe | 0xcffa_edfe | 0xcafe_babe => {
            Some(BinaryFormat::MachO)
        }
        0x7f45_4c46 => Some(BinaryFormat::Elf),
        _ => None,
    }
}

/// Whether a dependency path points into the build-time prefix.
pub fn references_build_prefix(dep: &str) -> bool {
    PLACEHOLDER_PREFIXES
        .iter()
        .chain(LITERAL_PREFIXES)
        .any(|prefix| dep.starts_with(prefix))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathChange {
    pub old: String,
    pub new: String,
}

/// Edits for one binary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelinkPlan {
    /// New install name (Mach-O only).
    pub id: Option<String>,
    pub changes: Vec<PathChange>,
    /// Search path to set (ELF only).
    pub rpath: Option<String>,
}

impl RelinkPlan {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.changes.is_empty() && self.rpath.is_none()
    }
}

/// Plan the rewrite of `file` so its prefixed dependencies resolve in `lib_dir`.
///
/// Matching dependencies are flattened to `lib_dir/<file name>`. Mach-O
/// libraries also get their own install name moved into `lib_dir`; ELF
/// libraries get `lib_dir` as their run path.
pub fn plan_relink(
    format: BinaryFormat,
    file: &Path,
    deps: &[String],
    lib_dir: &Path,
) -> RelinkPlan {
    let changes: Vec<PathChange> = deps
        .iter()
        .filter(|dep| references_build_prefix(dep))
        .filter_map(|dep| {
            let name = dep.rsplit('/').next().filter(|n| !n.is_empty())?;
            Some(PathChange {
                old: dep.clone(),
                new: lib_dir.join(name).to_string_lossy().into_owned(),
            })
        })
        .collect();

    let own_path = file
        .file_name()
        .map(|name| lib_dir.join(name).to_string_lossy().into_owned());

    match format {
        BinaryFormat::MachO => RelinkPlan {
            id: own_path,
            changes,
            rpath: None,
        },
        BinaryFormat::Elf => RelinkPlan {
            id: None,
            changes,
            rpath: Some(lib_dir.to_string_lossy().into_owned()),
        },
    }
}

/// Inspects and patches dependency paths of a binary.
pub trait Relinker: Send + Sync {
    fn format(&self) -> BinaryFormat;

    /// Dependency paths recorded in `file`.
    fn dependencies(&self, file: &Path) -> Result<Vec<String>, InstallError>;

    fn apply(&self, file: &Path, plan: &RelinkPlan) -> Result<(), InstallError>;
}

fn run_tool(tool: &str, args: &[String], file: &Path) -> Result<String, InstallError> {
    debug!(tool = %tool, file = %file.display(), "Running relink tool");
    let output = Command::new(tool)
        .args(args)
        .arg(file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| InstallError::Relink {
            path: file.to_path_buf(),
            reason: format!("{tool}: {e}"),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InstallError::Relink {
            path: file.to_path_buf(),
            reason: format!("{tool}: {}", stderr.trim()),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `otool` / `install_name_tool` on macOS. Patched binaries are re-signed
/// ad hoc, since editing load commands invalidates the signature.
#[derive(Debug, Default)]
pub struct InstallNameTool;

/// Parse `otool -L` output: a header line, then `\t<path> (compatibility ...)`.
pub fn parse_otool_output(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let line = line.trim();
            let path = line.split(" (").next()?.trim();
            (!path.is_empty()).then(|| path.to_string())
        })
        .collect()
}

impl Relinker for InstallNameTool {
    fn format(&self) -> BinaryFormat {
        BinaryFormat::MachO
    }

    fn dependencies(&self, file: &Path) -> Result<Vec<String>, InstallError> {
        let output = run_tool("otool", &["-L".to_string()], file)?;
        Ok(parse_otool_output(&output))
    }

    fn apply(&self, file: &Path, plan: &RelinkPlan) -> Result<(), InstallError> {
        let mut args = Vec::new();
        if let Some(id) = &plan.id {
            args.extend(["-id".to_string(), id.clone()]);
        }
        for change in &plan.changes {
            args.extend(["-change".to_string(), change.old.clone(), change.new.clone()]);
        }
        if args.is_empty() {
            return Ok(());
        }
        run_tool("install_name_tool", &args, file)?;
        run_tool(
            "codesign",
            &["--force".to_string(), "--sign".to_string(), "-".to_string()],
            file,
        )?;
        Ok(())
    }
}

/// `patchelf` on Linux.
#[derive(Debug, Default)]
pub struct Patchelf;

impl Relinker for Patchelf {
    fn format(&self) -> BinaryFormat {
        BinaryFormat::Elf
    }

    fn dependencies(&self, file: &Path) -> Result<Vec<String>, InstallError> {
        let output = run_tool("patchelf", &["--print-needed".to_string()], file)?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn apply(&self, file: &Path, plan: &RelinkPlan) -> Result<(), InstallError> {
        let mut args = Vec::new();
        for change in &plan.changes {
            args.extend([
                "--replace-needed".to_string(),
                change.old.clone(),
                change.new.clone(),
            ]);
        }
        if let Some(rpath) = &plan.rpath {
            args.extend(["--set-rpath".to_string(), rpath.clone()]);
        }
        if args.is_empty() {
            return Ok(());
        }
        run_tool("patchelf", &args, file).map(|_| ())
    }
}

/// The relinker for the running host.
pub fn platform_relinker() -> Box<dyn Relinker> {
    if cfg!(target_os = "macos") {
        Box::new(InstallNameTool)
    } else {
        Box::new(Patchelf)
    }
}

/// Relink every library in `staged` so it resolves its siblings in `lib_dir`.
///
/// Files the relinker's format does not match are skipped. Returns the
/// number of binaries patched.
pub fn relink_all(
    relinker: &dyn Relinker,
    staged: &[PathBuf],
    lib_dir: &Path,
) -> Result<usize, InstallError> {
    let mut patched = 0;
    for file in staged {
        if detect_format(file)? != Some(relinker.format()) {
            debug!(file = %file.display(), "Not a relinkable binary, skipping");
            continue;
        }
        let deps = relinker.dependencies(file)?;
        let plan = plan_relink(relinker.format(), file, &deps, lib_dir);
        if plan.is_empty() {
            continue;
        }
        relinker.apply(file, &plan)?;
        patched += 1;
    }
    info!(patched, total = staged.len(), "Relinked libraries");
    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lib_dir() -> PathBuf {
        PathBuf::from("/data/Vellum/native/arm64/lib")
    }

    #[test]
    fn rewrites_placeholders_and_literal_prefixes() {
        let deps = vec![
            "@@HOMEBREW_PREFIX@@/opt/ffmpeg/lib/libavcodec.61.dylib".to_string(),
            "@@HOMEBREW_CELLAR@@/libass/0.17.3/lib/libass.9.dylib".to_string(),
            "/opt/homebrew/opt/little-cms2/lib/liblcms2.2.dylib".to_string(),
            "/usr/local/opt/luajit/lib/libluajit-5.1.2.dylib".to_string(),
            "/usr/lib/libSystem.B.dylib".to_string(),
            "/System/Library/Frameworks/CoreVideo.framework/Versions/A/CoreVideo".to_string(),
        ];
        let plan = plan_relink(
            BinaryFormat::MachO,
            Path::new("/staging/lib/libmpv.2.dylib"),
            &deps,
            &lib_dir(),
        );

        assert_eq!(
            plan.id.as_deref(),
            Some("/data/Vellum/native/arm64/lib/libmpv.2.dylib")
        );
        let news: Vec<&str> = plan.changes.iter().map(|c| c.new.as_str()).collect();
        assert_eq!(
            news,
            vec![
                "/data/Vellum/native/arm64/lib/libavcodec.61.dylib",
                "/data/Vellum/native/arm64/lib/libass.9.dylib",
                "/data/Vellum/native/arm64/lib/liblcms2.2.dylib",
                "/data/Vellum/native/arm64/lib/libluajit-5.1.2.dylib",
            ]
        );
        assert_eq!(plan.rpath, None);
    }

    #[test]
    fn elf_gets_rpath_and_keeps_bare_sonames() {
        let deps = vec!["libavcodec.so.61".to_string(), "libc.so.6".to_string()];
        let plan = plan_relink(
            BinaryFormat::Elf,
            Path::new("/staging/lib/libmpv.so.2"),
            &deps,
            &lib_dir(),
        );
        assert!(plan.changes.is_empty());
        assert_eq!(plan.id, None);
        assert_eq!(plan.rpath.as_deref(), Some("/data/Vellum/native/arm64/lib"));
    }

    #[test]
    fn otool_output_parsing() {
        let output = "/tmp/libmpv.2.dylib:\n\
            \t@@HOMEBREW_PREFIX@@/opt/mpv/lib/libmpv.2.dylib (compatibility version 2.0.0, current version 2.3.0)\n\
            \t/usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1345.0.0)\n";
        assert_eq!(
            parse_otool_output(output),
            vec![
                "@@HOMEBREW_PREFIX@@/opt/mpv/lib/libmpv.2.dylib",
                "/usr/lib/libSystem.B.dylib",
            ]
        );
    }

    #[test]
    fn magic_detection() {
        assert_eq!(
            format_from_magic([0xcf, 0xfa, 0xed, 0xfe]),
            Some(BinaryFormat::MachO)
        );
        assert_eq!(
            format_from_magic([0xca, 0xfe, 0xba, 0xbe]),
            Some(BinaryFormat::MachO)
        );
        assert_eq!(format_from_magic(*b"\x7fELF"), Some(BinaryFormat::Elf));
        assert_eq!(format_from_magic(*b"PK\x03\x04"), None);
    }

    #[test]
    fn prefix_check() {
        assert!(references_build_prefix("@@HOMEBREW_PREFIX@@/lib/x.dylib"));
        assert!(references_build_prefix("/usr/local/lib/x.dylib"));
        assert!(!references_build_prefix("@rpath/x.dylib"));
        assert!(!references_build_prefix("/usr/lib/x.dylib"));
    }
}
