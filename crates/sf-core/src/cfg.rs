#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEnv {
    pub os: String,
}

impl TargetEnv {
    pub fn host() -> Self {
        Self {
            os: host_target_os(),
        }
    }

    pub fn from_triple(triple: Option<&str>) -> Self {
        Self {
            os: target_os_from_triple(triple),
        }
    }

    /// Windows targets use funclet-style exception handling.
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl Default for TargetEnv {
    fn default() -> Self {
        Self::host()
    }
}

fn host_target_os() -> String {
    if cfg!(target_os = "linux") {
        "linux".to_string()
    } else if cfg!(target_os = "macos") {
        "macos".to_string()
    } else if cfg!(target_os = "windows") {
        "windows".to_string()
    } else {
        "unknown".to_string()
    }
}

fn target_os_from_triple(triple: Option<&str>) -> String {
    let Some(triple) = triple else {
        return host_target_os();
    };
    let triple = triple.to_ascii_lowercase();
    if triple.contains("apple") || triple.contains("darwin") {
        "macos".to_string()
    } else if triple.contains("windows") || triple.contains("mingw") {
        "windows".to_string()
    } else if triple.contains("linux") {
        "linux".to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_map_to_os() {
        assert!(TargetEnv::from_triple(Some("x86_64-pc-windows-msvc")).is_windows());
        assert_eq!(
            TargetEnv::from_triple(Some("aarch64-unknown-linux-gnu")).os,
            "linux"
        );
        assert_eq!(TargetEnv::from_triple(Some("arm64-apple-darwin")).os, "macos");
        assert_eq!(TargetEnv::from_triple(None), TargetEnv::host());
    }
}
