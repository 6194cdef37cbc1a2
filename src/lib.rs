//! HardSwish activation plugin for a host inference engine.
//!
//! The host discovers the plugin through [`PluginRegistry`], builds
//! descriptors with `create_plugin` / `deserialize_plugin`, negotiates shapes
//! and formats through the [`Plugin`] trait, and runs the enqueued kernel on
//! an [`ExecutionEngine`].

pub use core_types::{DataType, Dims, Element, TensorFormat, MAX_DIMS};
pub use hswish_core::GpuContext;
pub use hswish_core::types::BufferHandle;
pub use hswish_execution::ExecutionEngine;
pub use hswish_ops::builtin::hard_swish::{hard_swish, hard_swish_f16, HARD_SWISH_PLUGIN_NAME, HARD_SWISH_PLUGIN_VERSION};
pub use hswish_ops::{
    HardSwishPlugin, HardSwishPluginCreator, Plugin, PluginCreator, PluginError, PluginFieldCollection,
    PluginRegistry,
};

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if the process already has a global subscriber.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_lifecycle_with_logging() {
        init_logging();
        // a second install is refused, not a panic
        assert!(!init_logging());

        let mut reg = PluginRegistry::new();
        reg.collect_inventory("");

        let mut p = reg
            .create_plugin(HARD_SWISH_PLUGIN_NAME, HARD_SWISH_PLUGIN_VERSION, "", "act1", &PluginFieldCollection::EMPTY)
            .unwrap();
        let negotiated = [DataType::I8, DataType::F16, DataType::F32]
            .into_iter()
            .find(|&t| p.supports_format(t, TensorFormat::Nchw))
            .unwrap();
        assert_eq!(negotiated, DataType::F16);

        let s = Dims::chw(3, 5, 7);
        p.configure_plugin(&[s], &[s], &[negotiated], &[negotiated], &[false], &[false], TensorFormat::Nchw, 1);
        let copy = p.clone_plugin();
        assert_eq!(copy.serialize_to_vec(), p.serialize_to_vec());
        copy.destroy();
        p.destroy();
    }
}
