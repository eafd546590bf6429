use std::{
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};

use crate::foundation::error::{MixError, MixResult};

/// Display surface for software rendering in headless environments.
pub trait VirtualDisplay {
    fn start(&mut self) -> MixResult<()>;
    fn stop(&mut self);
    fn is_running(&mut self) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XvfbConfig {
    /// X display id, e.g. `:99`.
    pub display: String,
    /// Screen geometry passed as `-screen 0 <screen>`.
    pub screen: String,
    /// Server binary.
    pub server: String,
    /// Command that succeeds once the display answers; run with `DISPLAY` set.
    pub probe: Vec<String>,
    pub startup_timeout: Duration,
    pub probe_interval: Duration,
}

impl XvfbConfig {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            screen: "1920x1080x24".to_string(),
            server: "Xvfb".to_string(),
            probe: vec!["xset".to_string(), "q".to_string()],
            startup_timeout: Duration::from_secs(3),
            probe_interval: Duration::from_millis(250),
        }
    }
}

/// `Xvfb` launcher.
pub struct Xvfb {
    cfg: XvfbConfig,
    child: Option<Child>,
}

impl Xvfb {
    pub fn new(cfg: XvfbConfig) -> Self {
        Self { cfg, child: None }
    }

    pub fn display(&self) -> &str {
        &self.cfg.display
    }

    fn answers(&self) -> bool {
        let Some((program, args)) = self.cfg.probe.split_first() else {
            return false;
        };
        Command::new(program)
            .args(args)
            .env("DISPLAY", &self.cfg.display)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    fn wait_until_up(&mut self) -> MixResult<()> {
        let deadline = Instant::now() + self.cfg.startup_timeout;
        loop {
            if self.answers() {
                return Ok(());
            }
            if let Some(child) = self.child.as_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                self.child = None;
                return Err(MixError::display(format!(
                    "{}: {} exited during startup ({status})",
                    self.cfg.display, self.cfg.server
                )));
            }
            if Instant::now() >= deadline {
                self.stop();
                return Err(MixError::display(format!(
                    "{}: display did not come up within {:?}",
                    self.cfg.display, self.cfg.startup_timeout
                )));
            }
            std::thread::sleep(self.cfg.probe_interval);
        }
    }
}

impl VirtualDisplay for Xvfb {
    fn start(&mut self) -> MixResult<()> {
        if self.answers() {
            return Err(MixError::display_already_running(self.cfg.display.as_str()));
        }

        tracing::info!(display = %self.cfg.display, "starting virtual display");
        let child = Command::new(&self.cfg.server)
            .args([self.cfg.display.as_str(), "-screen", "0", self.cfg.screen.as_str()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MixError::display(format!(
                    "failed to spawn {} (is it installed and on PATH?): {e}",
                    self.cfg.server
                ))
            })?;
        self.child = Some(child);
        self.wait_until_up()?;
        tracing::info!(display = %self.cfg.display, "virtual display started");
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Err(e) = child.kill() {
            tracing::warn!(display = %self.cfg.display, error = %e, "failed to kill display server");
        }
        let _ = child.wait();
        tracing::info!(display = %self.cfg.display, "virtual display terminated");
    }

    fn is_running(&mut self) -> bool {
        self.child
            .as_mut()
            .is_some_and(|c| matches!(c.try_wait(), Ok(None)))
    }
}

impl Drop for Xvfb {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "../tests/unit/display.rs"]
mod tests;
