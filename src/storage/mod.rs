use std::path::Path;
use uuid::Uuid;

pub const CERTIFICATE_ID_LEN: usize = 8;

/// Eight upper-case hex characters taken from a fresh UUIDv4.
pub fn generate_certificate_id() -> String {
    Uuid::new_v4().simple().to_string()[..CERTIFICATE_ID_LEN].to_uppercase()
}

/// Creates the directory that will hold `file`, if it has one.
pub fn ensure_parent_dir(file: &Path) -> std::io::Result<()> {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_certificate_id_shape() {
        for _ in 0..200 {
            let id = generate_certificate_id();
            assert_eq!(id.len(), CERTIFICATE_ID_LEN);
            assert!(
                id.chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()),
                "{id} is not upper-case alphanumeric"
            );
        }
    }

    #[test]
    fn test_certificate_ids_differ() {
        let ids: HashSet<String> = (0..100).map(|_| generate_certificate_id()).collect();
        assert!(ids.len() > 95);
    }

    #[test]
    fn test_ensure_parent_dir_creates_nested_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a").join("b").join("certificates.csv");
        ensure_parent_dir(&file).unwrap();
        assert!(tmp.path().join("a").join("b").is_dir());
    }

    #[test]
    fn test_ensure_parent_dir_accepts_bare_file_name() {
        assert!(ensure_parent_dir(Path::new("certificates.csv")).is_ok());
    }
}
