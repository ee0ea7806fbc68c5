use anyhow::Result;
use std::path::{Path, PathBuf};
use url::Url;

/// Last path segment of `url`, or a random `download_<uuid>` name when the
/// path ends in `/`.
pub fn get_filename_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    let name = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("download_{}", uuid::Uuid::new_v4()));
    Ok(name)
}

/// Replace everything but alphanumerics, `.`, `-` and `_` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect()
}

/// `<output>.state`, next to the output file.
pub fn default_state_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".state");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_url_path() {
        let name = get_filename_from_url("https://example.com/files/7-Zip%2024.exe?x=1").unwrap();
        assert_eq!(name, "7-Zip%2024.exe");
        assert_eq!(sanitize_filename(&name), "7-Zip_2024.exe");
    }

    #[test]
    fn test_filename_fallback_for_bare_host() {
        let name = get_filename_from_url("https://example.com/").unwrap();
        assert!(name.starts_with("download_"));
    }

    #[test]
    fn test_state_path_sits_next_to_output() {
        assert_eq!(
            default_state_path(Path::new("downloads/a.iso")),
            PathBuf::from("downloads/a.iso.state")
        );
    }
}
