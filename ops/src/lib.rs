pub mod plugin;
pub mod types;
pub mod serialize;
pub mod builtin;

use std::collections::HashMap;
use tracing::{info, warn};

pub use plugin::{CreatorFactory, Plugin, PluginCreator};
pub use types::{
    GpuTask, KernelParam, PluginError, PluginField, PluginFieldCollection, PluginFieldData,
    PluginFieldType, RegistrationInfo,
};
pub use builtin::hard_swish::{HardSwishPlugin, HardSwishPluginCreator};


/// Register a plugin creator with the inventory system
#[macro_export]
macro_rules! register_creator {
    ($creator:ident) => {
        inventory::submit! {
            $crate::CreatorFactory {
                name:    <$creator as $crate::RegistrationInfo>::NAME,
                version: <$creator as $crate::RegistrationInfo>::VERSION,
                factory: || Box::new($creator::new()),
            }
        }
    };
}


/// (namespace, name, version)
type CreatorKey = (String, String, String);

fn key(name: &str, version: &str, namespace: &str) -> CreatorKey {
    (namespace.to_string(), name.to_string(), version.to_string())
}

/// Holds every registered creator, looked up the way the host does it:
/// by namespace, name and version.
#[derive(Default)]
pub struct PluginRegistry {
    map: HashMap<CreatorKey, Box<dyn PluginCreator>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Instantiate every creator submitted with `register_creator!` under
    /// `namespace`. Returns how many were added.
    pub fn collect_inventory(&mut self, namespace: &str) -> usize {
        let mut added = 0;
        for factory in inventory::iter::<CreatorFactory> {
            match self.register_creator((factory.factory)(), namespace) {
                Ok(()) => added += 1,
                Err(e) => warn!(error = %e, "skipping plugin creator"),
            }
        }
        added
    }

    /// Register a creator, handing it `namespace` first.
    pub fn register_creator(
        &mut self,
        mut creator: Box<dyn PluginCreator>,
        namespace:   &str,
    ) -> Result<(), PluginError> {
        let k = key(creator.plugin_name(), creator.plugin_version(), namespace);
        if self.map.contains_key(&k) {
            return Err(PluginError::DuplicateCreator {
                name:      k.1,
                version:   k.2,
                namespace: k.0,
            });
        }
        creator.set_plugin_namespace(namespace);
        info!(
            name = creator.plugin_name(),
            version = creator.plugin_version(),
            namespace,
            "registered plugin creator"
        );
        self.map.insert(k, creator);
        Ok(())
    }

    /// lookup sans error
    pub fn get_creator(&self, name: &str, version: &str, namespace: &str) -> Option<&dyn PluginCreator> {
        self.map.get(&key(name, version, namespace)).map(|b| b.as_ref())
    }

    fn lookup(&self, name: &str, version: &str, namespace: &str) -> Result<&dyn PluginCreator, PluginError> {
        self.get_creator(name, version, namespace)
            .ok_or_else(|| PluginError::UnknownCreator {
                name:      name.to_string(),
                version:   version.to_string(),
                namespace: namespace.to_string(),
            })
    }

    /// Lookup + `create_plugin` in one call (graph construction)
    pub fn create_plugin(
        &self,
        name:      &str,
        version:   &str,
        namespace: &str,
        layer:     &str,
        fc:        &PluginFieldCollection<'_>,
    ) -> Result<Box<dyn Plugin>, PluginError> {
        Ok(self.lookup(name, version, namespace)?.create_plugin(layer, fc))
    }

    /// Lookup + `deserialize_plugin` in one call (engine-cache load)
    pub fn deserialize_plugin(
        &self,
        name:        &str,
        version:     &str,
        namespace:   &str,
        layer:       &str,
        serial_data: &[u8],
    ) -> Result<Box<dyn Plugin>, PluginError> {
        Ok(self.lookup(name, version, namespace)?.deserialize_plugin(layer, serial_data))
    }

    /// Registered (namespace, name, version) triples
    pub fn creators(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.map.keys().map(|(ns, n, v)| (ns.as_str(), n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
