//! Sample network inventory schema served by the demo binary
//!
//! Small enough to reason about in tests, nested enough to exercise depth,
//! complexity and per-field timing.

use async_graphql::*;
use parking_lot::RwLock;
use std::sync::Arc;

use super::extension::ObservabilityExtension;
use crate::config::ObservabilityConfig;

/// The complete GraphQL schema type
pub type InventorySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Network interface on a device
#[derive(SimpleObject, Clone, Debug)]
pub struct Interface {
    pub name: String,
    pub speed_mbps: u32,
    pub enabled: bool,
}

/// Network device
#[derive(SimpleObject, Clone, Debug)]
pub struct Device {
    pub name: String,
    pub location: String,
    pub interfaces: Vec<Interface>,
}

/// In-memory device store
#[derive(Default)]
pub struct Inventory {
    devices: RwLock<Vec<Device>>,
}

impl Inventory {
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// Two sites, three devices
    pub fn sample() -> Self {
        let interface = |name: &str, speed_mbps: u32, enabled: bool| Interface {
            name: name.to_string(),
            speed_mbps,
            enabled,
        };

        Self::new(vec![
            Device {
                name: "edge-01".to_string(),
                location: "ams1".to_string(),
                interfaces: vec![
                    interface("xe-0/0/0", 10_000, true),
                    interface("xe-0/0/1", 10_000, false),
                ],
            },
            Device {
                name: "core-01".to_string(),
                location: "ams1".to_string(),
                interfaces: vec![interface("et-0/0/0", 100_000, true)],
            },
            Device {
                name: "edge-02".to_string(),
                location: "fra1".to_string(),
                interfaces: vec![interface("xe-0/0/0", 10_000, true)],
            },
        ])
    }
}

fn not_found(name: &str) -> Error {
    Error::new(format!("Device '{}' not found", name))
        .extend_with(|_, e| e.set("code", "NOT_FOUND"))
}

/// Root query object
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Service health
    async fn health(&self) -> &str {
        "ok"
    }

    /// All devices
    async fn devices(&self, ctx: &Context<'_>) -> Result<Vec<Device>> {
        let inventory = ctx.data::<Inventory>()?;
        Ok(inventory.devices.read().clone())
    }

    /// Look up one device by name
    async fn device(&self, ctx: &Context<'_>, name: String) -> Result<Device> {
        let inventory = ctx.data::<Inventory>()?;
        let devices = inventory.devices.read();
        devices
            .iter()
            .find(|device| device.name == name)
            .cloned()
            .ok_or_else(|| not_found(&name))
    }

    /// Distinct site names
    async fn locations(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let inventory = ctx.data::<Inventory>()?;
        let mut locations: Vec<String> = inventory
            .devices
            .read()
            .iter()
            .map(|device| device.location.clone())
            .collect();
        locations.sort();
        locations.dedup();
        Ok(locations)
    }
}

/// Root mutation object
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Rename a device
    async fn rename_device(
        &self,
        ctx: &Context<'_>,
        name: String,
        new_name: String,
    ) -> Result<Device> {
        let inventory = ctx.data::<Inventory>()?;
        let mut devices = inventory.devices.write();
        let device = devices
            .iter_mut()
            .find(|device| device.name == name)
            .ok_or_else(|| not_found(&name))?;
        device.name = new_name;
        Ok(device.clone())
    }
}

/// Build the inventory schema with the observability extension installed
pub fn build_schema(config: Arc<ObservabilityConfig>) -> InventorySchema {
    build_schema_with_inventory(config, Inventory::sample())
}

pub fn build_schema_with_inventory(
    config: Arc<ObservabilityConfig>,
    inventory: Inventory,
) -> InventorySchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(inventory)
        .extension(ObservabilityExtension::with_shared_config(config))
        .finish()
}
