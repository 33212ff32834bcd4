//! mDNS browsing for HomeKit accessories.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, warn};
use zeroconf::prelude::*;
use zeroconf::{MdnsBrowser, ServiceDiscovery, ServiceType};

/// A `_hap._tcp` service seen on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAccessory {
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Pairing identifier from the TXT `id` key.
    pub id: Option<String>,
}

impl DiscoveredAccessory {
    fn from_discovery(service: &ServiceDiscovery) -> Self {
        Self {
            name: service.name().to_string(),
            address: service.address().to_string(),
            port: *service.port(),
            id: service
                .txt()
                .as_ref()
                .and_then(|txt| txt.to_map().get("id").cloned()),
        }
    }
}

impl fmt::Display for DiscoveredAccessory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}:{}  id={}",
            self.name,
            self.address,
            self.port,
            self.id.as_deref().unwrap_or("-")
        )
    }
}

type Found = Arc<Mutex<Vec<DiscoveredAccessory>>>;

/// Add `accessory` unless the same name and address were already seen.
fn record(found: &mut Vec<DiscoveredAccessory>, accessory: DiscoveredAccessory) {
    if !found
        .iter()
        .any(|a| a.name == accessory.name && a.address == accessory.address)
    {
        found.push(accessory);
    }
}

/// Browse for accessories for `duration`.
///
/// The browser is not `Send`, so this blocks the calling thread; run it on
/// a blocking task.
pub fn browse(duration: Duration) -> Result<Vec<DiscoveredAccessory>> {
    let found: Found = Arc::new(Mutex::new(Vec::new()));

    let mut browser = MdnsBrowser::new(ServiceType::new("hap", "tcp")?);
    browser.set_service_discovered_callback(Box::new(on_service_discovered));
    browser.set_context(Box::new(found.clone()));

    let event_loop = browser.browse_services()?;
    let start = Instant::now();
    while start.elapsed() < duration {
        event_loop.poll(Duration::from_millis(100))?;
    }
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "browse finished");

    let found = found
        .lock()
        .map_err(|_| anyhow::anyhow!("discovery results poisoned"))?
        .clone();
    Ok(found)
}

fn on_service_discovered(
    result: zeroconf::Result<ServiceDiscovery>,
    context: Option<Arc<dyn Any>>,
) {
    let service = match result {
        Ok(service) => service,
        Err(err) => {
            warn!(error = %err, "mDNS browse error");
            return;
        }
    };

    let Some(found) = context.as_ref().and_then(|c| c.downcast_ref::<Found>()) else {
        return;
    };
    let accessory = DiscoveredAccessory::from_discovery(&service);
    debug!(name = %accessory.name, "accessory discovered");

    if let Ok(mut found) = found.lock() {
        record(&mut found, accessory);
    }
}
