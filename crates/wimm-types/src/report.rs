//! Records extracted from the text listings the tools print.

use serde::{Deserialize, Serialize};

/// One image inside a container, as listed by `dism /Get-WimInfo` or
/// `wimlib-imagex info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageIndexInfo {
    pub index: u32,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Size exactly as the tool printed it (units and separators vary).
    pub size: Option<String>,
}

/// One mounted image, as listed by `dism /Get-MountedWimInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountedImage {
    pub mount_dir: String,
    pub image_file: Option<String>,
    pub index: Option<u32>,
    pub read_write: Option<bool>,
    pub status: Option<String>,
}
