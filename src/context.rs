//! Process-wide default locations.
//!
//! Built once at start-up and handed to every component that needs a default
//! path, so no component reaches for the home directory on its own.

use std::path::{Path, PathBuf};

const LOGS_DIR: &str = "logs";
const CONFIG_FILE_NAME: &str = "dmm.conf";
const CALIBRATION_FILE_NAME: &str = "dmm.json";

/// Default file locations for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigContext {
    /// Config file read when `--config` is absent, and updated after an energy change.
    pub config_file: PathBuf,
    /// Default log directory.
    pub logs_home: PathBuf,
    /// Calibrated motor-position lookup table.
    pub calibration_file: PathBuf,
}

impl ConfigContext {
    /// Layout under the current user's home directory (`~/logs/dmm.conf` etc.).
    ///
    /// Falls back to the working directory when no home directory is known.
    pub fn from_home() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_root(home)
    }

    /// Same layout rooted at `root` instead of the home directory.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let logs_home = root.as_ref().join(LOGS_DIR);
        Self {
            config_file: logs_home.join(CONFIG_FILE_NAME),
            calibration_file: logs_home.join(CALIBRATION_FILE_NAME),
            logs_home,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_root() {
        let ctx = ConfigContext::with_root("/home/user2bma");
        assert_eq!(ctx.logs_home, PathBuf::from("/home/user2bma/logs"));
        assert_eq!(ctx.config_file, PathBuf::from("/home/user2bma/logs/dmm.conf"));
        assert_eq!(
            ctx.calibration_file,
            PathBuf::from("/home/user2bma/logs/dmm.json")
        );
    }
}
