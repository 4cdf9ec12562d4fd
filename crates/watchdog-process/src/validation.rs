//! Executable validation.

use std::path::Path;
use watchdog_common::{ProcessError, ProcessResult};

/// Validate that a path names something the watchdog may launch.
///
/// The path must be absolute and point at an existing regular file. On
/// Unix the file must carry at least one execute bit; on Windows it must
/// have an `.exe` extension.
pub fn validate_executable(path: &Path) -> ProcessResult<()> {
    let display = path.display().to_string();

    if path.as_os_str().is_empty() {
        return Err(ProcessError::invalid_executable(display, "path cannot be empty"));
    }

    if !path.is_absolute() {
        return Err(ProcessError::invalid_executable(display, "path must be absolute"));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| ProcessError::invalid_executable(&display, format!("cannot access file: {}", e)))?;

    if !metadata.is_file() {
        return Err(ProcessError::invalid_executable(display, "not a regular file"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(ProcessError::invalid_executable(display, "missing execute permission"));
        }
    }

    #[cfg(windows)]
    {
        let is_exe = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("exe"))
            .unwrap_or(false);
        if !is_exe {
            return Err(ProcessError::invalid_executable(display, "only .exe files can be supervised"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_rejected() {
        let err = validate_executable(Path::new("")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = validate_executable(Path::new("bin/server")).unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_executable(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidExecutable { .. }));
    }

    #[test]
    fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_executable(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    #[cfg(unix)]
    fn test_execute_bit_required() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, "#!/bin/sh\n").unwrap();

        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(validate_executable(&file).is_err());

        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(validate_executable(&file).is_ok());
    }

    #[test]
    #[cfg(windows)]
    fn test_exe_extension_required() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool.bat");
        std::fs::write(&script, "@echo off\r\n").unwrap();
        assert!(validate_executable(&script).is_err());

        let exe = dir.path().join("Tool.EXE");
        std::fs::write(&exe, "MZ").unwrap();
        assert!(validate_executable(&exe).is_ok());
    }
}
