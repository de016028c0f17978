use super::{ComponentState, FacewatchOrchestrator};
use std::net::{IpAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, info, warn};

impl FacewatchOrchestrator {
    /// Greet on the display and start optional inputs.
    ///
    /// On first boot the device IP is shown before the ready message so the
    /// terminal can be found on the network.
    pub async fn start(&mut self) {
        info!("Starting Facewatch terminal");

        if self.config.display.show_ip_on_first_boot && self.driver.has_display() {
            let flag = self.config.storage.ip_flag_path();
            if !flag.exists() {
                self.show_first_boot_ip(local_ip()).await;
            }
        }

        if let Some(keyboard) = &self.keyboard_handler {
            keyboard.start();
            self.set_component_state("keyboard", ComponentState::Running);
        }

        self.driver.status("System Ready", "Monitoring...");
        info!(
            "System ready: {} known signature(s), camera {}",
            self.gallery_size(),
            self.camera.describe()
        );
    }

    /// Show `ip` for the configured time, then mark the IP as shown
    pub(super) async fn show_first_boot_ip(&mut self, ip: Option<IpAddr>) {
        let Some(ip) = ip else {
            warn!("No network address found, IP will be shown on next boot");
            return;
        };

        info!("First boot, showing IP address {}", ip);
        self.driver.status("IP Address:", &ip.to_string());
        self.pause(Duration::from_secs(self.config.display.ip_display_seconds))
            .await;

        let flag = self.config.storage.ip_flag_path();
        if let Err(e) = std::fs::write(&flag, ip.to_string()) {
            warn!("Failed to write {}: {}", flag.display(), e);
        } else {
            debug!("Created {}", flag.display());
        }
    }
}

/// Address of the interface holding the default route. Connecting a UDP
/// socket sends nothing.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
