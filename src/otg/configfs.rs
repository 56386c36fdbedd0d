//! ConfigFS/sysfs node access for the USB controller
//!
//! Every call goes to the kernel; nothing is cached because these nodes
//! reflect live driver state.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::config::GadgetConfig;
use crate::error::{AppError, Result};

/// Device node accessor
///
/// The controllers only talk to the hardware through this trait, so tests can
/// wrap or replace the real filesystem.
pub trait DeviceNodes: Send + Sync {
    /// Write a single value to an attribute node
    fn write(&self, path: &Path, value: &str) -> Result<()>;

    /// Read the first line of an attribute node, without the newline
    fn read_first_line(&self, path: &Path) -> Result<String>;

    /// Create `link` pointing at `target`
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Remove a link; a link that is already gone is not an error
    fn remove_link(&self, link: &Path) -> Result<()>;

    /// Links in `dir` whose names start with `prefix`
    fn list_links(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool;
}

/// [`DeviceNodes`] backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsNodes;

impl DeviceNodes for SysfsNodes {
    fn write(&self, path: &Path, value: &str) -> Result<()> {
        write_file(path, value)
    }

    fn read_first_line(&self, path: &Path) -> Result<String> {
        read_first_line(path)
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        create_symlink(target, link)
    }

    fn remove_link(&self, link: &Path) -> Result<()> {
        remove_link(link)
    }

    fn list_links(&self, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        list_links(dir, prefix)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Write string content to an attribute node
///
/// IMPORTANT: sysfs attributes require a single atomic write() syscall.
/// The kernel processes the value on the first write(), so we must
/// build the complete buffer (including newline) before writing.
/// The node must already exist; pseudo-files are never created here.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    // O_TRUNC may fail on special files, plain O_WRONLY is enough for sysfs
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| AppError::node(path, format!("open failed: {}", e)))?;

    let data: std::borrow::Cow<[u8]> = if content.ends_with('\n') {
        content.as_bytes().into()
    } else {
        let mut buf = content.as_bytes().to_vec();
        buf.push(b'\n');
        buf.into()
    };

    file.write_all(&data)
        .map_err(|e| AppError::node(path, format!("write failed: {}", e)))?;

    file.flush()
        .map_err(|e| AppError::node(path, format!("flush failed: {}", e)))?;

    Ok(())
}

/// Read the first line of a node; a missing node or empty line is an error
pub fn read_first_line(path: &Path) -> Result<String> {
    let file = fs::File::open(path).map_err(|e| AppError::node(path, format!("open failed: {}", e)))?;

    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| AppError::node(path, format!("read failed: {}", e)))?;

    let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    if line.is_empty() {
        return Err(AppError::node(path, "empty read"));
    }
    Ok(line.to_string())
}

/// Create symlink
pub fn create_symlink(src: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dest).map_err(|e| {
        AppError::node(
            dest,
            format!("cannot create symlink -> {}: {}", src.display(), e),
        )
    })
}

/// Remove a symlink if present
///
/// Uses `symlink_metadata` so dangling links are still removed.
pub fn remove_link(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path)
            .map_err(|e| AppError::node(path, format!("unable to remove: {}", e)))?;
    }
    Ok(())
}

/// List symlinks in `dir` named `<prefix>...`, sorted by name
pub fn list_links(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| AppError::node(dir, format!("cannot list: {}", e)))?;

    let mut links = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::node(dir, format!("cannot list: {}", e)))?;
        let is_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
        if is_link && entry.file_name().to_string_lossy().starts_with(prefix) {
            links.push(entry.path());
        }
    }
    links.sort();
    Ok(links)
}

/// Resolved node paths of one gadget
#[derive(Debug, Clone)]
pub struct GadgetPaths {
    root: PathBuf,
    config_dir: PathBuf,
    link_prefix: String,
    config_name: String,
}

impl GadgetPaths {
    pub fn new(config: &GadgetConfig) -> Self {
        let root = PathBuf::from(&config.configfs_root);
        let config_dir = root.join("configs").join(&config.config_name);
        Self {
            root,
            config_dir,
            link_prefix: config.link_prefix.clone(),
            config_name: config.config_name.clone(),
        }
    }

    /// UDC binding (pull-up) node
    pub fn pullup(&self) -> PathBuf {
        self.root.join("UDC")
    }

    pub fn vendor_id(&self) -> PathBuf {
        self.root.join("idVendor")
    }

    pub fn product_id(&self) -> PathBuf {
        self.root.join("idProduct")
    }

    pub fn device_class(&self) -> PathBuf {
        self.root.join("bDeviceClass")
    }

    pub fn device_sub_class(&self) -> PathBuf {
        self.root.join("bDeviceSubClass")
    }

    pub fn device_protocol(&self) -> PathBuf {
        self.root.join("bDeviceProtocol")
    }

    /// OS descriptor use flag
    pub fn os_desc_use(&self) -> PathBuf {
        self.root.join("os_desc/use")
    }

    /// OS descriptor link to the active configuration
    pub fn os_desc_config(&self) -> PathBuf {
        self.root.join("os_desc").join(&self.config_name)
    }

    /// Active configuration directory
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Name prefix of function links in the configuration directory
    pub fn link_prefix(&self) -> &str {
        &self.link_prefix
    }

    /// Configuration string node
    pub fn config_string(&self) -> PathBuf {
        self.config_dir.join("strings/0x409/configuration")
    }

    /// Function instance directory
    pub fn function(&self, instance: &str) -> PathBuf {
        self.root.join("functions").join(instance)
    }

    /// Link for the function at `index` (1-based)
    pub fn link(&self, index: usize) -> PathBuf {
        self.config_dir
            .join(format!("{}{}", self.link_prefix, index))
    }
}
