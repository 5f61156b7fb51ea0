//! File naming helpers shared by the driver, fetcher, and transformers

use std::path::Path;

/// Destination file name for the job at `index`
///
/// # Examples
///
/// ```
/// use imgfetch::utils::job_file_name;
///
/// assert_eq!(job_file_name("image", 0, "jpeg"), "image_0.jpeg");
/// ```
#[must_use]
pub fn job_file_name(prefix: &str, index: usize, extension: &str) -> String {
    if extension.is_empty() {
        format!("{prefix}_{index}")
    } else {
        format!("{prefix}_{index}.{extension}")
    }
}

/// Name of the artifact derived from `source` for a size profile
///
/// The profile name is inserted between the stem and the extension, so
/// `image_0.jpeg` becomes `image_0_thumbnail.jpeg`.
///
/// # Examples
///
/// ```
/// use imgfetch::utils::derived_file_name;
/// use std::path::Path;
///
/// assert_eq!(
///     derived_file_name(Path::new("/tmp/image_2.jpeg"), "large"),
///     "image_2_large.jpeg"
/// );
/// ```
#[must_use]
pub fn derived_file_name(source: &Path, profile: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    match source.extension() {
        Some(ext) => format!("{}_{}.{}", stem, profile, ext.to_string_lossy()),
        None => format!("{stem}_{profile}"),
    }
}
