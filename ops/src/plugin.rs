use core_types::{DataType, Dims, TensorFormat};
use hswish_core::types::BufferHandle;

use crate::types::{GpuTask, PluginError, PluginFieldCollection};


/// One instantiated plugin occurrence in a graph, as the host engine drives it.
///
/// A descriptor is created by a [`PluginCreator`], configured once through
/// [`Plugin::configure_plugin`], queried many times, and finally handed back
/// through [`Plugin::destroy`].
pub trait Plugin: Send + Sync {
    /// Operator name, matches [`PluginCreator::plugin_name`]
    fn plugin_type(&self) -> &'static str;

    /// Operator version, matches [`PluginCreator::plugin_version`]
    fn plugin_version(&self) -> &'static str;

    fn nb_outputs(&self) -> usize;

    /// Shape of output `index` given the input shapes
    fn output_dimensions(&self, index: usize, inputs: &[Dims]) -> Dims;

    /// Element type of output `index` given the input types
    fn output_data_type(&self, index: usize, input_types: &[DataType]) -> DataType;

    /// Format negotiation: `false` is a routine answer, the host tries another pair.
    fn supports_format(&self, dtype: DataType, format: TensorFormat) -> bool;

    /// Final build-time configuration, called once before execution.
    #[allow(clippy::too_many_arguments)]
    fn configure_plugin(
        &mut self,
        input_dims:          &[Dims],
        output_dims:         &[Dims],
        input_types:         &[DataType],
        output_types:        &[DataType],
        input_is_broadcast:  &[bool],
        output_is_broadcast: &[bool],
        format:              TensorFormat,
        max_batch_size:      usize,
    );

    /// Acquire run-time resources
    fn initialize(&mut self) -> Result<(), PluginError>;

    /// Release run-time resources
    fn terminate(&mut self);

    /// Scratch bytes the host must provide to `enqueue`
    fn workspace_size(&self, max_batch_size: usize) -> usize;

    /// Build the kernel launch for one batch.
    fn enqueue(
        &self,
        batch_size: usize,
        inputs:     &[BufferHandle],
        outputs:    &[BufferHandle],
        workspace:  Option<&BufferHandle>,
    ) -> Result<GpuTask, PluginError>;

    fn serialization_size(&self) -> usize;

    /// Write exactly `serialization_size()` bytes at the start of `buffer`.
    fn serialize(&self, buffer: &mut [u8]);

    fn serialize_to_vec(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.serialization_size()];
        self.serialize(&mut buf);
        buf
    }

    /// Independent copy of the configured state. The namespace is not carried over.
    fn clone_plugin(&self) -> Box<dyn Plugin>;

    fn set_plugin_namespace(&mut self, namespace: &str);

    fn plugin_namespace(&self) -> &str;

    fn is_output_broadcast_across_batch(&self, output_index: usize, input_is_broadcasted: &[bool]) -> bool;

    fn can_broadcast_input_across_batch(&self, input_index: usize) -> bool;

    /// Hand the descriptor back to the plugin; it is dropped here.
    fn destroy(self: Box<Self>) {}
}


/// Registry entry the host queries by name/version to build descriptors.
pub trait PluginCreator: Send + Sync {
    fn plugin_name(&self) -> &'static str;

    fn plugin_version(&self) -> &'static str;

    /// Creation-time field schema
    fn field_names(&self) -> &PluginFieldCollection<'_>;

    /// Fresh, unconfigured descriptor
    fn create_plugin(&self, name: &str, fc: &PluginFieldCollection<'_>) -> Box<dyn Plugin>;

    /// Descriptor restored from an engine cache
    fn deserialize_plugin(&self, name: &str, serial_data: &[u8]) -> Box<dyn Plugin>;

    fn set_plugin_namespace(&mut self, namespace: &str);

    fn plugin_namespace(&self) -> &str;
}


/// Wrapper for creator factory functions
pub struct CreatorFactory {
    pub name:    &'static str,
    pub version: &'static str,
    pub factory: fn() -> Box<dyn PluginCreator>,
}

// Collect all registered creators
inventory::collect!(CreatorFactory);
