#[cfg(test)]
mod tests {
    use crate::security::{EntryNameError, EntrySanitizer};

    #[test]
    fn test_valid_simple_entry() {
        assert_eq!(EntrySanitizer::sanitize("manifest.json").unwrap(), "manifest.json");
    }

    #[test]
    fn test_valid_nested_entry() {
        assert_eq!(EntrySanitizer::sanitize("units/3.bin").unwrap(), "units/3.bin");
    }

    #[test]
    fn test_current_dir_markers_are_dropped() {
        assert_eq!(EntrySanitizer::sanitize("./units/./0.bin").unwrap(), "units/0.bin");
    }

    #[test]
    fn test_hidden_entries_rejected_by_default() {
        let result = EntrySanitizer::sanitize("units/.0.bin");
        assert_eq!(result, Err(EntryNameError::Hidden("units/.0.bin".to_string())));
    }

    #[test]
    fn test_hidden_entries_allowed_when_enabled() {
        assert!(EntrySanitizer::sanitize_with_options(".meta/info", true).is_ok());
    }

    #[test]
    fn test_reject_parent_directory_traversal() {
        let result = EntrySanitizer::sanitize("../etc/passwd");
        assert!(result.unwrap_err().to_string().contains("Parent directory traversal"));
    }

    #[test]
    fn test_reject_parent_in_middle() {
        assert!(matches!(
            EntrySanitizer::sanitize("units/../../escape.bin"),
            Err(EntryNameError::ParentTraversal(_))
        ));
    }

    #[test]
    fn test_reject_absolute_entry() {
        assert!(matches!(
            EntrySanitizer::sanitize("/units/0.bin"),
            Err(EntryNameError::Absolute(_))
        ));
    }

    #[test]
    fn test_reject_backslash() {
        assert!(matches!(
            EntrySanitizer::sanitize("units\\..\\0.bin"),
            Err(EntryNameError::Backslash(_))
        ));
    }

    #[test]
    fn test_reject_empty() {
        assert_eq!(EntrySanitizer::sanitize(""), Err(EntryNameError::Empty));
        assert!(matches!(EntrySanitizer::sanitize("."), Err(EntryNameError::NoComponents(_))));
    }

    #[test]
    fn test_sanitize_in_directory() {
        assert_eq!(EntrySanitizer::sanitize_in("units/0.bin", "units").unwrap(), "units/0.bin");
        assert!(EntrySanitizer::sanitize_in("sources/0.src", "units").is_err());
        assert!(EntrySanitizer::sanitize_in("units/a/0.bin", "units").is_err());
        assert!(EntrySanitizer::sanitize_in("units/", "units").is_err());
    }
}
