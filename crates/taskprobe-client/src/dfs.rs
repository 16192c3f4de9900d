use crate::cluster::Dfs;
use crate::error::{ClientError, Result};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// The distributed filesystem seen through a local mount point. Paths
/// handed to it are relative to the mount root.
pub struct LocalDfs {
    root: PathBuf,
}

impl LocalDfs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let relative = path.strip_prefix("/").unwrap_or(path);
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ClientError::InvalidPath {
                path: path.to_path_buf(),
                reason: "path escapes the filesystem root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn io_err(e: std::io::Error) -> ClientError {
    ClientError::Config(e.into())
}

impl Dfs for LocalDfs {
    fn delete(&self, path: &Path, recursive: bool) -> Result<bool> {
        let full = self.resolve(path)?;
        if !full.exists() {
            return Ok(false);
        }
        if full.is_dir() {
            if recursive {
                fs_err::remove_dir_all(&full).map_err(io_err)?;
            } else {
                fs_err::remove_dir(&full).map_err(io_err)?;
            }
        } else {
            fs_err::remove_file(&full).map_err(io_err)?;
        }
        Ok(true)
    }

    fn mkdirs(&self, path: &Path) -> Result<bool> {
        let full = self.resolve(path)?;
        if full.is_file() {
            return Ok(false);
        }
        fs_err::create_dir_all(&full).map_err(io_err)?;
        Ok(true)
    }

    #[cfg(unix)]
    fn set_permission(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let full = self.resolve(path)?;
        fs_err::set_permissions(&full, std::fs::Permissions::from_mode(mode)).map_err(io_err)
    }

    #[cfg(not(unix))]
    fn set_permission(&self, path: &Path, _mode: u32) -> Result<()> {
        self.resolve(path).map(|_| ())
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs_err::create_dir_all(parent).map_err(io_err)?;
        }
        let file = fs_err::File::create(&full).map_err(io_err)?;
        Ok(Box::new(std::io::BufWriter::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_rooted() {
        let dfs = LocalDfs::new("/mnt/dfs");
        assert_eq!(
            dfs.resolve(Path::new("/user/probe/input")).unwrap(),
            PathBuf::from("/mnt/dfs/user/probe/input")
        );
        assert_eq!(
            dfs.resolve(Path::new("input")).unwrap(),
            PathBuf::from("/mnt/dfs/input")
        );
    }

    #[test]
    fn test_parent_components_are_rejected() {
        let dfs = LocalDfs::new("/mnt/dfs");
        assert!(dfs.resolve(Path::new("../etc")).is_err());
    }
}
