use std::path::Path;

/// Extensions inventoried when non-media files are not requested.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".tif", ".tiff", ".gif", ".mp4", ".mov", ".avi", ".wmv", ".mpg",
    ".cr2", ".mp3",
];

/// Extensions a `MediaProbe` is asked about.
pub const PROBED_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// Inclusion policy, consulted once per candidate file name (no path).
pub trait FileFilter: Sync {
    fn accept(&self, file_name: &str) -> bool;
}

impl<F> FileFilter for F
where
    F: Fn(&str) -> bool + Sync,
{
    fn accept(&self, file_name: &str) -> bool {
        self(file_name)
    }
}

/// Lowercased extension including the leading dot, or `None`.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// Default policy: skip dotfiles and the inventory file, keep media files.
#[derive(Debug, Clone)]
pub struct MediaFilter {
    inventory_file_name: String,
    also_non_image_files: bool,
}

impl MediaFilter {
    pub fn new(inventory_file_name: &str, also_non_image_files: bool) -> Self {
        Self {
            inventory_file_name: inventory_file_name.to_string(),
            also_non_image_files,
        }
    }
}

impl FileFilter for MediaFilter {
    fn accept(&self, file_name: &str) -> bool {
        if file_name.starts_with('.') || file_name == self.inventory_file_name {
            return false;
        }
        if self.also_non_image_files {
            return true;
        }
        match extension_of(file_name) {
            Some(ext) => MEDIA_EXTENSIONS.contains(&ext.as_str()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_filter() {
        let filter = MediaFilter::new("inventory.json", false);
        assert!(filter.accept("IMG_0001.JPG"));
        assert!(filter.accept("clip.mov"));
        assert!(!filter.accept("notes.txt"));
        assert!(!filter.accept(".hidden.jpg"));
        assert!(!filter.accept("inventory.json"));
        assert!(!filter.accept("README"));

        let everything = MediaFilter::new("inventory.json", true);
        assert!(everything.accept("notes.txt"));
        assert!(!everything.accept("inventory.json"));
    }

    #[test]
    fn test_closure_filter() {
        let only_png = |name: &str| name.ends_with(".png");
        assert!(only_png.accept("a.png"));
        assert!(!only_png.accept("a.jpg"));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("A.JPG").as_deref(), Some(".jpg"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension_of("Makefile"), None);
    }
}
