use crate::error::{Result, WeaveError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Reads the contents of a file at the given path
///
/// # Errors
///
/// - `WeaveError::NotFound` if the path doesn't exist or isn't a file.
/// - `WeaveError::Io` if there's an error reading the file.
pub fn read_file_contents(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(WeaveError::NotFound {
            path: path.to_path_buf(),
        });
    }

    fs::read_to_string(path).map_err(|e| not_found_or_io(e, path))
}

/// Returns the modification time of a file
///
/// # Errors
///
/// - `WeaveError::NotFound` if the path doesn't exist or isn't a file.
/// - `WeaveError::Io` if the platform can't report modification times.
pub fn modified_time(path: &Path) -> Result<SystemTime> {
    let metadata = fs::metadata(path).map_err(|e| not_found_or_io(e, path))?;
    if !metadata.is_file() {
        return Err(WeaveError::NotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(metadata.modified()?)
}

/// Normalizes an include reference into a relative cache key.
///
/// Leading slashes (either kind) and `./` segments are dropped so that
/// `a.txt`, `/a.txt` and `./a.txt` name the same file.
pub fn normalize_reference(reference: &str) -> PathBuf {
    let mut cleaned = reference.trim();
    loop {
        let next = cleaned
            .trim_start_matches('/')
            .trim_start_matches('\\')
            .trim_start_matches("./");
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    PathBuf::from(cleaned)
}

fn not_found_or_io(err: io::Error, path: &Path) -> WeaveError {
    if err.kind() == io::ErrorKind::NotFound {
        WeaveError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        WeaveError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_read_file_contents() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");

        fs::write(&file_path, "test content").unwrap();
        let result = read_file_contents(&file_path);
        assert_eq!(result.unwrap(), "test content");

        let non_existent = temp_dir.path().join("nonexistent.txt");
        let result = read_file_contents(&non_existent);
        assert!(matches!(result, Err(WeaveError::NotFound { .. })));

        // Directories are not readable templates
        let dir_path = temp_dir.path().join("dir");
        fs::create_dir(&dir_path).unwrap();
        let result = read_file_contents(&dir_path);
        assert!(matches!(result, Err(WeaveError::NotFound { .. })));
    }

    #[test]
    fn test_read_file_contents_unicode() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("unicode.txt");

        let content = "Hello 世界 🌍 Здравствуй";
        fs::write(&file_path, content).unwrap();
        assert_eq!(read_file_contents(&file_path).unwrap(), content);
    }

    #[test]
    fn test_modified_time() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("stamp.txt");
        fs::write(&file_path, "x").unwrap();

        let stamp = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        fs::File::options()
            .write(true)
            .open(&file_path)
            .unwrap()
            .set_modified(stamp)
            .unwrap();
        assert_eq!(modified_time(&file_path).unwrap(), stamp);

        let missing = temp_dir.path().join("missing.txt");
        assert!(matches!(
            modified_time(&missing),
            Err(WeaveError::NotFound { .. })
        ));
        assert!(matches!(
            modified_time(temp_dir.path()),
            Err(WeaveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_normalize_reference() {
        assert_eq!(normalize_reference("a.txt"), PathBuf::from("a.txt"));
        assert_eq!(normalize_reference("/a.txt"), PathBuf::from("a.txt"));
        assert_eq!(normalize_reference("./a.txt"), PathBuf::from("a.txt"));
        assert_eq!(normalize_reference("///a.txt"), PathBuf::from("a.txt"));
        assert_eq!(normalize_reference("/\\./a.txt"), PathBuf::from("a.txt"));
        assert_eq!(
            normalize_reference("partials/nav.html"),
            PathBuf::from("partials/nav.html")
        );
    }
}
