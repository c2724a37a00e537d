//! Launch-on-login toggle.
//!
//! Boolean contract only: enabled or not. On Windows the current
//! executable is registered under the per-user `Run` key through `reg.exe`.

#[cfg(target_os = "windows")]
const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";
#[cfg(target_os = "windows")]
const VALUE_NAME: &str = "AIAssistant";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("launch on login is not supported on this platform")]
    Unsupported,
    #[error("could not determine executable path: {0}")]
    ExePath(std::io::Error),
    #[error("reg.exe failed: {0}")]
    Registry(String),
}

pub struct StartupManager;

#[cfg(target_os = "windows")]
impl StartupManager {
    fn reg(args: &[&str]) -> Result<std::process::Output, StartupError> {
        std::process::Command::new("reg")
            .args(args)
            .output()
            .map_err(|e| StartupError::Registry(e.to_string()))
    }

    pub fn is_enabled(&self) -> Result<bool, StartupError> {
        let out = Self::reg(&["query", RUN_KEY, "/v", VALUE_NAME])?;
        Ok(out.status.success())
    }

    pub fn enable(&self) -> Result<(), StartupError> {
        let exe = std::env::current_exe().map_err(StartupError::ExePath)?;
        let command = format!("\"{}\" run", exe.display());
        let out = Self::reg(&["add", RUN_KEY, "/v", VALUE_NAME, "/t", "REG_SZ", "/d", &command, "/f"])?;
        if !out.status.success() {
            return Err(StartupError::Registry(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        log::info!("[STARTUP] Launch on login enabled");
        Ok(())
    }

    pub fn disable(&self) -> Result<(), StartupError> {
        if !self.is_enabled()? {
            return Ok(());
        }
        let out = Self::reg(&["delete", RUN_KEY, "/v", VALUE_NAME, "/f"])?;
        if !out.status.success() {
            return Err(StartupError::Registry(
                String::from_utf8_lossy(&out.stderr).trim().to_string(),
            ));
        }
        log::info!("[STARTUP] Launch on login disabled");
        Ok(())
    }
}

#[cfg(not(target_os = "windows"))]
impl StartupManager {
    pub fn is_enabled(&self) -> Result<bool, StartupError> {
        Err(StartupError::Unsupported)
    }

    pub fn enable(&self) -> Result<(), StartupError> {
        Err(StartupError::Unsupported)
    }

    pub fn disable(&self) -> Result<(), StartupError> {
        Err(StartupError::Unsupported)
    }
}

impl StartupManager {
    /// Bring the OS state in line with the persisted preference.
    pub fn reconcile(&self, want_enabled: bool) {
        let result = match self.is_enabled() {
            Ok(true) if !want_enabled => self.disable(),
            Ok(false) if want_enabled => self.enable(),
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {}
            Err(StartupError::Unsupported) => {
                log::debug!("[STARTUP] Launch on login unsupported here, skipping")
            }
            Err(e) => log::warn!("[STARTUP] Could not apply launch_on_boot={}: {}", want_enabled, e),
        }
    }
}
