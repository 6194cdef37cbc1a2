use core_types::{DataType, Dims, TensorFormat};
use half::f16;
use hswish_core::types::BufferHandle;
use tracing::debug;

use crate::plugin::{Plugin, PluginCreator};
use crate::register_creator;
use crate::serialize::{Reader, Writer};
use crate::types::{GpuTask, KernelParam, PluginError, PluginFieldCollection, RegistrationInfo};

pub const HARD_SWISH_PLUGIN_NAME: &str = "HardSwish";
/// Bump whenever the serialized layout changes.
pub const HARD_SWISH_PLUGIN_VERSION: &str = "1";

const WORKGROUP_SIZE: u32 = 64;

/// The creator takes no creation-time fields.
static FIELD_NAMES: PluginFieldCollection<'static> = PluginFieldCollection::EMPTY;

/// `x * clamp((x + 3) / 6, 0, 1)`
pub fn hard_swish(x: f32) -> f32 {
    x * ((x + 3.0) / 6.0).clamp(0.0, 1.0)
}

/// Half-precision variant, computed in f32 and rounded once.
pub fn hard_swish_f16(x: f16) -> f16 {
    f16::from_f32(hard_swish(x.to_f32()))
}

const HARD_SWISH_F32_WGSL: &str = r#"
struct Params {
    count: u32,
}

@group(0) @binding(0) var<storage, read> X: array<f32>;
@group(0) @binding(1) var<storage, read> P: Params;
@group(0) @binding(2) var<storage, read_write> Y: array<f32>;

@compute @workgroup_size(64)
fn hard_swish_f32(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let stride = groups.x * 64u;
    for (var i = gid.x; i < P.count; i = i + stride) {
        let x = X[i];
        Y[i] = x * clamp((x + 3.0) / 6.0, 0.0, 1.0);
    }
}
"#;

const HARD_SWISH_F16_WGSL: &str = r#"
enable f16;

struct Params {
    count: u32,
}

@group(0) @binding(0) var<storage, read> X: array<f16>;
@group(0) @binding(1) var<storage, read> P: Params;
@group(0) @binding(2) var<storage, read_write> Y: array<f16>;

@compute @workgroup_size(64)
fn hard_swish_f16(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let stride = groups.x * 64u;
    for (var i = gid.x; i < P.count; i = i + stride) {
        let x = X[i];
        Y[i] = x * clamp((x + 3.0h) / 6.0h, 0.0h, 1.0h);
    }
}
"#;

/// WGSL source + entry point for the given element type
fn shader_template(dtype: DataType) -> Option<(&'static str, &'static str)> {
    match dtype {
        DataType::F32 => Some((HARD_SWISH_F32_WGSL, "hard_swish_f32")),
        DataType::F16 => Some((HARD_SWISH_F16_WGSL, "hard_swish_f16")),
        _ => None,
    }
}

/// Per-sample channel-first extents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Chw {
    c: i32,
    h: i32,
    w: i32,
}

impl Chw {
    fn is_positive(&self) -> bool {
        self.c > 0 && self.h > 0 && self.w > 0
    }

    /// Elements per sample; non-positive extents count as empty.
    fn volume(&self) -> Option<u64> {
        let ext = |e: i32| u64::from(e.max(0).unsigned_abs());
        ext(self.c).checked_mul(ext(self.h))?.checked_mul(ext(self.w))
    }
}

/// Element count and byte size of one launch over `batch_size` samples.
///
/// The count must fit the kernel's `u32` parameter block; `ElementCountOverflow`
/// carries the count saturated at `u64::MAX` when it does not even fit a `u64`.
fn launch_size(batch_size: usize, shape: Chw, dtype: DataType) -> Result<(u32, u64), PluginError> {
    let count = u64::try_from(batch_size)
        .ok()
        .zip(shape.volume())
        .and_then(|(b, v)| b.checked_mul(v))
        .ok_or(PluginError::ElementCountOverflow { count: u64::MAX })?;
    let total_elems = u32::try_from(count)
        .map_err(|_| PluginError::ElementCountOverflow { count })?;
    let bytes = count
        .checked_mul(dtype.size_in_bytes() as u64)
        .ok_or(PluginError::ElementCountOverflow { count })?;
    Ok((total_elems, bytes))
}

/// HardSwish activation: one input, one output of the same shape and type.
///
/// The element type is not part of the serialized state. A descriptor
/// restored from bytes must be configured again before it can be enqueued.
#[derive(Debug, Default)]
pub struct HardSwishPlugin {
    data_type: Option<DataType>,
    shape:     Option<Chw>,
    namespace: String,
}

impl HardSwishPlugin {
    /// Unconfigured descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from bytes written by [`Plugin::serialize`].
    ///
    /// Panics unless `data` holds exactly three native `i32`s.
    pub fn from_serialized(data: &[u8]) -> Self {
        let mut r = Reader::new(data);
        let c: i32 = r.read();
        let h: i32 = r.read();
        let w: i32 = r.read();
        assert_eq!(
            r.consumed(),
            data.len(),
            "HardSwish: deserialized {} bytes from a {}-byte buffer",
            r.consumed(),
            data.len()
        );

        // an unconfigured descriptor writes zeros; a shape is all-positive or absent
        let shape = Chw { c, h, w };
        Self {
            data_type: None,
            shape:     shape.is_positive().then_some(shape),
            namespace: String::new(),
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    /// Configured per-sample shape, batch excluded
    pub fn dims(&self) -> Option<Dims> {
        self.shape.map(|s| Dims::chw(s.c, s.h, s.w))
    }

    pub fn is_configured(&self) -> bool {
        self.data_type.is_some() && self.shape.is_some()
    }
}

impl Plugin for HardSwishPlugin {
    fn plugin_type(&self) -> &'static str { HARD_SWISH_PLUGIN_NAME }

    fn plugin_version(&self) -> &'static str { HARD_SWISH_PLUGIN_VERSION }

    fn nb_outputs(&self) -> usize { 1 }

    fn output_dimensions(&self, index: usize, inputs: &[Dims]) -> Dims {
        debug_assert_eq!(index, 0, "HardSwish has a single output");
        inputs[0]
    }

    fn output_data_type(&self, index: usize, input_types: &[DataType]) -> DataType {
        debug_assert_eq!(index, 0, "HardSwish has a single output");
        input_types[0]
    }

    fn supports_format(&self, dtype: DataType, format: TensorFormat) -> bool {
        matches!(dtype, DataType::F32 | DataType::F16) && format == TensorFormat::Nchw
    }

    fn configure_plugin(
        &mut self,
        input_dims:           &[Dims],
        output_dims:          &[Dims],
        input_types:          &[DataType],
        _output_types:        &[DataType],
        _input_is_broadcast:  &[bool],
        _output_is_broadcast: &[bool],
        format:               TensorFormat,
        max_batch_size:       usize,
    ) {
        assert_eq!(input_dims.len(), 1, "HardSwish expects exactly 1 input, got {}", input_dims.len());
        assert_eq!(output_dims.len(), 1, "HardSwish expects exactly 1 output, got {}", output_dims.len());
        assert_eq!(
            input_types.len(),
            input_dims.len(),
            "HardSwish got {} input types for {} inputs",
            input_types.len(),
            input_dims.len()
        );

        let d = &input_dims[0].d;
        self.shape = Some(Chw { c: d[0], h: d[1], w: d[2] });
        self.data_type = Some(input_types[0]);

        debug!(
            dims = %input_dims[0],
            dtype = %input_types[0],
            ?format,
            max_batch_size,
            "HardSwish configured"
        );
    }

    fn initialize(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    fn terminate(&mut self) {}

    fn workspace_size(&self, _max_batch_size: usize) -> usize { 0 }

    fn enqueue(
        &self,
        batch_size: usize,
        inputs:     &[BufferHandle],
        outputs:    &[BufferHandle],
        _workspace: Option<&BufferHandle>,
    ) -> Result<GpuTask, PluginError> {
        let (Some(dtype), Some(shape)) = (self.data_type, self.shape) else {
            return Err(PluginError::NotConfigured { plugin: HARD_SWISH_PLUGIN_NAME });
        };
        for (kind, found) in [("inputs", inputs.len()), ("outputs", outputs.len())] {
            if found != 1 {
                return Err(PluginError::ArityMismatch {
                    plugin: HARD_SWISH_PLUGIN_NAME,
                    kind,
                    expected: 1,
                    found,
                });
            }
        }
        let (src, entry) = shader_template(dtype)
            .ok_or(PluginError::UnsupportedType { plugin: HARD_SWISH_PLUGIN_NAME, dtype })?;

        let (total_elems, required) = launch_size(batch_size, shape, dtype)?;
        let check_sizes = |kind: &'static str, bufs: &[BufferHandle]| {
            match bufs.iter().enumerate().find(|(_, b)| b.size() < required) {
                Some((index, buf)) => Err(PluginError::BufferTooSmall { kind, index, required, actual: buf.size() }),
                None => Ok(()),
            }
        };
        check_sizes("input", inputs)?;
        check_sizes("output", outputs)?;

        debug!(batch_size, total_elems, dtype = %dtype, "HardSwish enqueue");
        Ok(GpuTask {
            pipeline_source: src,
            entry_point:     entry,
            workgroup_size:  WORKGROUP_SIZE,
            dtype,
            total_elems,
            params:          vec![KernelParam::from_pod(&total_elems)],
            inputs:          inputs.to_vec(),
            outputs:         outputs.to_vec(),
        })
    }

    fn serialization_size(&self) -> usize {
        3 * std::mem::size_of::<i32>()
    }

    fn serialize(&self, buffer: &mut [u8]) {
        let Chw { c, h, w } = self.shape.unwrap_or(Chw { c: 0, h: 0, w: 0 });
        let mut wr = Writer::new(buffer);
        wr.write(c);
        wr.write(h);
        wr.write(w);
        assert_eq!(
            wr.written(),
            self.serialization_size(),
            "HardSwish wrote {} bytes, serialization_size is {}",
            wr.written(),
            self.serialization_size()
        );
    }

    fn clone_plugin(&self) -> Box<dyn Plugin> {
        Box::new(HardSwishPlugin {
            data_type: self.data_type,
            shape:     self.shape,
            namespace: String::new(),
        })
    }

    fn set_plugin_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    fn plugin_namespace(&self) -> &str {
        &self.namespace
    }

    fn is_output_broadcast_across_batch(&self, _output_index: usize, _input_is_broadcasted: &[bool]) -> bool {
        false
    }

    fn can_broadcast_input_across_batch(&self, _input_index: usize) -> bool {
        false
    }
}


/// Factory for [`HardSwishPlugin`]
#[derive(Debug, Default)]
pub struct HardSwishPluginCreator {
    namespace: String,
}

impl HardSwishPluginCreator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationInfo for HardSwishPluginCreator {
    const NAME: &'static str = HARD_SWISH_PLUGIN_NAME;
    const VERSION: &'static str = HARD_SWISH_PLUGIN_VERSION;
}

impl PluginCreator for HardSwishPluginCreator {
    fn plugin_name(&self) -> &'static str { HARD_SWISH_PLUGIN_NAME }

    fn plugin_version(&self) -> &'static str { HARD_SWISH_PLUGIN_VERSION }

    fn field_names(&self) -> &PluginFieldCollection<'_> {
        &FIELD_NAMES
    }

    fn create_plugin(&self, name: &str, _fc: &PluginFieldCollection<'_>) -> Box<dyn Plugin> {
        debug!(layer = name, namespace = %self.namespace, "creating HardSwish");
        let mut plugin = HardSwishPlugin::new();
        plugin.set_plugin_namespace(&self.namespace);
        Box::new(plugin)
    }

    fn deserialize_plugin(&self, name: &str, serial_data: &[u8]) -> Box<dyn Plugin> {
        debug!(layer = name, len = serial_data.len(), namespace = %self.namespace, "restoring HardSwish");
        let mut plugin = HardSwishPlugin::from_serialized(serial_data);
        plugin.set_plugin_namespace(&self.namespace);
        Box::new(plugin)
    }

    fn set_plugin_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    fn plugin_namespace(&self) -> &str {
        &self.namespace
    }
}

register_creator!(HardSwishPluginCreator);


#[cfg(test)]
mod tests {
    use super::*;
    use core_types::MAX_DIMS;
    use proptest::prelude::*;

    fn configured(dtype: DataType, c: i32, h: i32, w: i32) -> HardSwishPlugin {
        let mut p = HardSwishPlugin::new();
        let dims = Dims::chw(c, h, w);
        p.configure_plugin(&[dims], &[dims], &[dtype], &[dtype], &[false], &[false], TensorFormat::Nchw, 8);
        p
    }

    fn float_type() -> impl Strategy<Value = DataType> {
        prop_oneof![Just(DataType::F32), Just(DataType::F16)]
    }

    proptest! {
        #[test]
        fn output_shape_equals_input(c in 1..4096i32, h in 1..4096i32, w in 1..4096i32) {
            let p = HardSwishPlugin::new();
            let s = Dims::chw(c, h, w);
            prop_assert_eq!(p.output_dimensions(0, &[s]), s);
        }

        #[test]
        fn output_type_equals_input(t in float_type()) {
            let p = HardSwishPlugin::new();
            prop_assert_eq!(p.output_data_type(0, &[t]), t);
        }

        #[test]
        fn serialize_round_trips_shape(
            t in float_type(), c in 1..4096i32, h in 1..4096i32, w in 1..4096i32,
        ) {
            let p = configured(t, c, h, w);
            let bytes = p.serialize_to_vec();
            prop_assert_eq!(bytes.len(), 12);

            let back = HardSwishPlugin::from_serialized(&bytes);
            prop_assert_eq!(back.dims(), Some(Dims::chw(c, h, w)));
            prop_assert_eq!(back.data_type(), None);
        }
    }

    #[test]
    fn output_shape_copies_rank_verbatim() {
        let p = HardSwishPlugin::new();
        let s = Dims::new(&[3, 5, 7, 9]);
        assert_eq!(p.output_dimensions(0, &[s]), s);
        assert_eq!(Dims::new(&[1; MAX_DIMS]).rank(), MAX_DIMS);
    }

    #[test]
    fn supports_only_float_nchw() {
        let p = HardSwishPlugin::new();
        for format in TensorFormat::ALL {
            for dtype in [DataType::F32, DataType::F16, DataType::I8, DataType::I32] {
                let expected = matches!(dtype, DataType::F32 | DataType::F16) && format == TensorFormat::Nchw;
                assert_eq!(p.supports_format(dtype, format), expected, "{dtype} {format:?}");
            }
        }
    }

    #[test]
    fn serialization_size_is_constant() {
        assert_eq!(HardSwishPlugin::new().serialization_size(), 12);
        assert_eq!(configured(DataType::F32, 1, 2, 3).serialization_size(), 12);
        assert_eq!(configured(DataType::F16, 512, 512, 512).serialization_size(), 12);
    }

    #[test]
    fn serialized_layout_is_native_i32s() {
        let bytes = configured(DataType::F32, 3, 224, 112).serialize_to_vec();
        let mut expected = Vec::new();
        for v in [3i32, 224, 112] {
            expected.extend_from_slice(&v.to_ne_bytes());
        }
        assert_eq!(bytes, expected);
    }

    #[test]
    fn unconfigured_round_trips_as_unconfigured() {
        let bytes = HardSwishPlugin::new().serialize_to_vec();
        assert_eq!(bytes, vec![0u8; 12]);
        assert_eq!(HardSwishPlugin::from_serialized(&bytes).dims(), None);
    }

    #[test]
    #[should_panic(expected = "HardSwish expects exactly 1 input")]
    fn configure_rejects_two_inputs() {
        let d = Dims::chw(1, 1, 1);
        let t = DataType::F32;
        HardSwishPlugin::new().configure_plugin(
            &[d, d], &[d], &[t, t], &[t], &[false; 2], &[false], TensorFormat::Nchw, 1,
        );
    }

    #[test]
    #[should_panic(expected = "HardSwish expects exactly 1 output")]
    fn configure_rejects_zero_outputs() {
        let d = Dims::chw(1, 1, 1);
        let t = DataType::F32;
        HardSwishPlugin::new().configure_plugin(&[d], &[], &[t], &[], &[false], &[], TensorFormat::Nchw, 1);
    }

    #[test]
    #[should_panic(expected = "truncated plugin data")]
    fn deserialize_rejects_short_buffer() {
        HardSwishPlugin::from_serialized(&[0u8; 8]);
    }

    #[test]
    #[should_panic(expected = "deserialized 12 bytes from a 16-byte buffer")]
    fn deserialize_rejects_long_buffer() {
        HardSwishPlugin::from_serialized(&[1u8; 16]);
    }

    #[test]
    #[should_panic(expected = "serialization buffer too small")]
    fn serialize_rejects_short_buffer() {
        configured(DataType::F32, 1, 1, 1).serialize(&mut [0u8; 11]);
    }

    #[test]
    fn clone_keeps_state_but_not_namespace() {
        let mut original = configured(DataType::F16, 8, 4, 2);
        original.set_plugin_namespace("vendor");

        let mut copy = original.clone_plugin();
        assert_eq!(copy.plugin_namespace(), "");
        copy.set_plugin_namespace("other");
        assert_eq!(original.plugin_namespace(), "vendor");
        assert_eq!(copy.plugin_namespace(), "other");

        assert_eq!(copy.serialize_to_vec(), original.serialize_to_vec());
        let d = Dims::chw(8, 4, 2);
        assert_eq!(copy.output_dimensions(0, &[d]), d);
        assert!(copy.enqueue(1, &[], &[], None).is_err_and(|e| matches!(e, PluginError::ArityMismatch { .. })));
        copy.destroy();
    }

    #[test]
    fn never_broadcasts_across_batch() {
        let p = configured(DataType::F32, 1, 1, 1);
        assert!(!p.is_output_broadcast_across_batch(0, &[true]));
        assert!(!p.can_broadcast_input_across_batch(0));
    }

    #[test]
    fn enqueue_requires_configuration() {
        let restored = HardSwishPlugin::from_serialized(&configured(DataType::F32, 2, 2, 2).serialize_to_vec());
        assert!(!restored.is_configured());
        assert_eq!(
            restored.enqueue(1, &[], &[], None).unwrap_err(),
            PluginError::NotConfigured { plugin: "HardSwish" }
        );
    }

    #[test]
    fn enqueue_checks_arity_before_buffers() {
        let p = configured(DataType::F32, 2, 2, 2);
        assert_eq!(
            p.enqueue(1, &[], &[], None).unwrap_err(),
            PluginError::ArityMismatch { plugin: "HardSwish", kind: "inputs", expected: 1, found: 0 }
        );
    }

    #[test]
    fn partially_zero_shape_restores_unconfigured() {
        for chw in [[0i32, 5, 0], [4, 0, 4], [-1, 2, 3]] {
            let mut bytes = Vec::new();
            for v in chw {
                bytes.extend_from_slice(&v.to_ne_bytes());
            }
            assert_eq!(HardSwishPlugin::from_serialized(&bytes).dims(), None, "{chw:?}");
        }
    }

    #[test]
    fn launch_size_counts_elements_and_bytes() {
        let shape = Chw { c: 64, h: 32, w: 32 };
        assert_eq!(launch_size(2, shape, DataType::F16), Ok((131_072, 262_144)));
        assert_eq!(launch_size(0, shape, DataType::F32), Ok((0, 0)));
        assert_eq!(launch_size(3, Chw { c: -1, h: 4, w: 4 }, DataType::F32), Ok((0, 0)));
    }

    #[test]
    fn launch_size_reports_overflow() {
        let huge = Chw { c: i32::MAX, h: i32::MAX, w: i32::MAX };
        assert_eq!(huge.volume(), None);
        assert_eq!(
            launch_size(1, huge, DataType::F32),
            Err(PluginError::ElementCountOverflow { count: u64::MAX })
        );

        let small = Chw { c: 2, h: 2, w: 2 };
        assert_eq!(
            launch_size(usize::MAX, small, DataType::F32),
            Err(PluginError::ElementCountOverflow { count: u64::MAX })
        );

        // u32::MAX + 1 elements, one past what the parameter block holds
        let just_over = Chw { c: 1 << 16, h: 1 << 16, w: 1 };
        assert_eq!(
            launch_size(1, just_over, DataType::F32),
            Err(PluginError::ElementCountOverflow { count: u64::from(u32::MAX) + 1 })
        );
        let just_under = Chw { c: 1 << 16, h: (1 << 16) - 1, w: 1 };
        assert_eq!(
            launch_size(1, just_under, DataType::F32).map(|(n, _)| n),
            Ok(u32::MAX - (1 << 16) + 1)
        );
    }

    #[test]
    fn kernels_exist_for_float_types_only() {
        assert!(shader_template(DataType::F32).is_some());
        assert!(shader_template(DataType::F16).is_some());
        assert!(shader_template(DataType::I8).is_none());
        assert!(shader_template(DataType::I32).is_none());
    }

    #[test]
    fn reference_kernel_matches_formula() {
        assert_eq!(hard_swish(-4.0), -0.0);
        assert_eq!(hard_swish(-3.0), -0.0);
        assert_eq!(hard_swish(0.0), 0.0);
        assert_eq!(hard_swish(1.5), 1.5 * 0.75);
        assert_eq!(hard_swish(3.0), 3.0);
        assert_eq!(hard_swish(10.0), 10.0);
        assert_eq!(hard_swish_f16(f16::from_f32(3.0)), f16::from_f32(3.0));
    }

    #[test]
    fn creator_identity_and_empty_schema() {
        let c = HardSwishPluginCreator::new();
        assert_eq!(c.plugin_name(), "HardSwish");
        assert_eq!(c.plugin_version(), "1");
        assert!(c.field_names().is_empty());
    }

    #[test]
    fn creator_attaches_namespace() {
        let mut c = HardSwishPluginCreator::new();
        c.set_plugin_namespace("acme");

        let fresh = c.create_plugin("hs0", &PluginFieldCollection::EMPTY);
        assert_eq!(fresh.plugin_namespace(), "acme");
        assert_eq!(fresh.serialize_to_vec(), vec![0u8; 12]);

        let bytes = configured(DataType::F32, 64, 32, 32).serialize_to_vec();
        let restored = c.deserialize_plugin("hs0", &bytes);
        assert_eq!(restored.plugin_namespace(), "acme");
        assert_eq!(restored.serialize_to_vec(), bytes);
    }

    #[test]
    #[should_panic(expected = "truncated plugin data")]
    fn creator_propagates_deserialize_failure() {
        HardSwishPluginCreator::new().deserialize_plugin("hs0", &[0u8; 4]);
    }

    #[test]
    fn fp16_scenario() {
        let mut p = HardSwishPluginCreator::new().create_plugin("hs0", &PluginFieldCollection::EMPTY);
        let s = Dims::chw(64, 32, 32);
        let t = DataType::F16;
        p.configure_plugin(&[s], &[s], &[t], &[t], &[false], &[false], TensorFormat::Nchw, 32);

        for batch in [1, 7, 32] {
            assert_eq!(p.workspace_size(batch), 0);
        }
        assert_eq!(p.nb_outputs(), 1);
        assert_eq!(p.output_dimensions(0, &[s]), s);
        assert_eq!(p.output_data_type(0, &[t]), DataType::F16);

        let restored = HardSwishPlugin::from_serialized(&p.serialize_to_vec());
        assert_eq!(restored.dims(), Some(Dims::chw(64, 32, 32)));

        assert!(p.supports_format(DataType::F16, TensorFormat::Nchw));
        assert!(!p.supports_format(DataType::I8, TensorFormat::Nchw));
        assert!(p.initialize().is_ok());
        p.terminate();
        p.destroy();
    }
}
