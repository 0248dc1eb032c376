//! VM parameters

/// Upper bound of a function's register window; register operands are
/// encoded in one byte.
pub const VM_MAX_REGISTERS: usize = 256;

/// Default bound for the frame stack depth.
pub const VM_MAX_CALL_DEPTH: usize = 512;

/// Widest constant-pool or global index an instruction can encode.
pub const VM_MAX_POOL_INDEX: usize = i16::MAX as usize;

/// Fixed accounting charge of a heap object header, in bytes. Headers are
/// 16-byte aligned; bodies follow immediately.
pub const HEAP_HEADER_SIZE: usize = 16;

/// Allocation size classes, in bytes. Requests round up to the nearest
/// class; anything larger bypasses the classes entirely.
pub const HEAP_SIZE_CLASSES: [usize; 8] = [32, 64, 128, 256, 512, 1024, 2048, 4096];

/// Default ceiling for total heap bytes before allocation fails.
pub const HEAP_DEFAULT_MAX_BYTES: usize = 64 * 1024 * 1024;

/// Default length of the deferred queue that triggers a cycle-collection
/// pass.
pub const GC_DEFAULT_DEFERRED_THRESHOLD: usize = 64;

/// Default bytes allocated since the last pass that trigger the next one.
pub const GC_DEFAULT_PRESSURE_LIMIT: usize = 1024 * 1024;
