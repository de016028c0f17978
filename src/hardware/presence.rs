use std::path::Path;

const DEVICE_TREE_MODEL: &str = "/sys/firmware/devicetree/base/model";
const HOSTNAME_FILE: &str = "/etc/hostname";

/// Whether this process runs on a Raspberry Pi
pub fn is_raspberry_pi() -> bool {
    let hostname = std::fs::read_to_string(HOSTNAME_FILE).ok();
    detect_raspberry_pi(Path::new(DEVICE_TREE_MODEL), hostname.as_deref())
}

/// Device-tree model string first, hostname as a fallback
pub fn detect_raspberry_pi(model_path: &Path, hostname: Option<&str>) -> bool {
    if let Ok(model) = std::fs::read(model_path) {
        // The device-tree string is NUL terminated
        let model = String::from_utf8_lossy(&model);
        if model.trim_end_matches('\0').contains("Raspberry Pi") {
            return true;
        }
    }

    hostname
        .map(|h| h.trim().eq_ignore_ascii_case("raspberrypi"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_device_tree_model() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model");
        std::fs::write(&model, b"Raspberry Pi 4 Model B Rev 1.4\0").unwrap();
        assert!(detect_raspberry_pi(&model, None));

        std::fs::write(&model, b"Generic x86 board\0").unwrap();
        assert!(!detect_raspberry_pi(&model, Some("workstation\n")));
    }

    #[test]
    fn test_hostname_fallback() {
        let missing = Path::new("/nonexistent/model");
        assert!(detect_raspberry_pi(missing, Some("raspberrypi\n")));
        assert!(!detect_raspberry_pi(missing, None));
    }
}
