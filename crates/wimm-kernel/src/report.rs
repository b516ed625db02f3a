//! Parse the `key : value` listings the tools print.
//!
//! Both tools describe images as blocks of `Key : value` lines (dism pads
//! around the colon, wimlib aligns values in a column). Unknown keys, banner
//! lines and the trailing "operation completed" line are skipped, so a
//! listing from either tool yields the same records. Only the tools' text is
//! read here, never an image file.

use std::sync::LazyLock;

use regex::Regex;

use wimm_types::{ImageIndexInfo, MountedImage};

#[allow(clippy::expect_used)]
static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z /()-]*?)\s*:\s*(.*?)\s*$").expect("field pattern compiles")
});

/// Split a `Key : value` line; the key is lowercased.
fn field(line: &str) -> Option<(String, &str)> {
    let caps = FIELD_LINE.captures(line)?;
    let key = caps.get(1)?.as_str().to_ascii_lowercase();
    let value = caps.get(2)?.as_str();
    Some((key, value))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Images listed by `dism /Get-WimInfo` or `wimlib-imagex info`.
pub fn parse_image_indexes(output: &str) -> Vec<ImageIndexInfo> {
    let mut images = Vec::new();
    let mut current: Option<ImageIndexInfo> = None;

    for line in output.lines() {
        let Some((key, value)) = field(line) else {
            continue;
        };

        if key == "index" {
            images.extend(current.take());
            current = value.parse().ok().map(|index| ImageIndexInfo {
                index,
                ..ImageIndexInfo::default()
            });
            continue;
        }

        let Some(image) = current.as_mut() else {
            continue;
        };
        match key.as_str() {
            "name" => image.name = non_empty(value),
            "description" => image.description = non_empty(value),
            // dism says "Size", wimlib says "Total Bytes"
            "size" | "total bytes" => image.size = non_empty(value),
            _ => {}
        }
    }

    images.extend(current);
    images
}

/// Mounted images listed by `dism /Get-MountedWimInfo`.
pub fn parse_mounted_images(output: &str) -> Vec<MountedImage> {
    let mut mounts = Vec::new();
    let mut current: Option<MountedImage> = None;

    for line in output.lines() {
        let Some((key, value)) = field(line) else {
            continue;
        };

        if key == "mount dir" {
            mounts.extend(current.take());
            current = non_empty(value).map(|mount_dir| MountedImage {
                mount_dir,
                ..MountedImage::default()
            });
            continue;
        }

        let Some(mount) = current.as_mut() else {
            continue;
        };
        match key.as_str() {
            "image file" => mount.image_file = non_empty(value),
            "image index" => mount.index = value.parse().ok(),
            "mounted read/write" => mount.read_write = parse_yes_no(value),
            "status" => mount.status = non_empty(value),
            _ => {}
        }
    }

    mounts.extend(current);
    mounts
}

fn parse_yes_no(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}
