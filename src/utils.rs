use std::path::Path;

use chrono::Local;

pub const SCREENSHOT_DIR: &str = "screenshots";
pub const RESPONSE_DIR: &str = "responses";
pub const REPORT_FILE: &str = "report.html";
pub const RESULTS_FILE: &str = "results.json";
pub const FORMAT_STRING: &str = "%Y-%m-%d %H:%M:%S";

pub fn screenshot_file_name(serial: usize) -> String {
    format!("screenshot-{}.png", serial)
}

pub fn response_file_name(serial: usize) -> String {
    format!("response-{}.txt", serial)
}

/// Turns a stored file path into a link relative to the report directory.
///
/// Only the file name survives, so the result is always `<subdir>/<file>`
/// with a forward slash no matter where the output root lives.
pub fn relative_ref(subdir: &str, stored: &Path) -> String {
    match stored.file_name() {
        Some(name) => format!("{}/{}", subdir, name.to_string_lossy()),
        None => String::new(),
    }
}

pub fn timestamp() -> String {
    Local::now().format(FORMAT_STRING).to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn file_names_follow_serial() {
        assert_eq!(screenshot_file_name(7), "screenshot-7.png");
        assert_eq!(response_file_name(12), "response-12.txt");
    }

    #[test]
    fn relative_ref_strips_output_root() {
        let abs = PathBuf::from("/var/tmp/audit/run-1/screenshots/screenshot-3.png");
        assert_eq!(relative_ref(SCREENSHOT_DIR, &abs), "screenshots/screenshot-3.png");

        let rel = PathBuf::from("../out/nested/responses/response-3.txt");
        assert_eq!(relative_ref(RESPONSE_DIR, &rel), "responses/response-3.txt");

        let bare = PathBuf::from("response-9.txt");
        assert_eq!(relative_ref(RESPONSE_DIR, &bare), "responses/response-9.txt");
    }

    #[test]
    fn relative_ref_of_root_is_empty() {
        assert_eq!(relative_ref(SCREENSHOT_DIR, Path::new("/")), "");
    }
}
