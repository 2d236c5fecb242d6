//! Resource list file helpers

use std::io::Write;
use tempfile::NamedTempFile;

/// Write `lines` to a temporary resource list file.
///
/// The file is removed when the returned handle is dropped.
///
/// # Example
///
/// ```
/// use stack_sweep_test_utils::resource_list;
///
/// let file = resource_list(&["instances|vm-a|1111", "networks|net-a|2222"]);
/// let content = std::fs::read_to_string(file.path()).unwrap();
/// assert_eq!(content.lines().count(), 2);
/// ```
pub fn resource_list(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temporary resource list");
    for line in lines {
        writeln!(file, "{line}").expect("Failed to write resource list");
    }
    file.flush().expect("Failed to flush resource list");
    file
}
