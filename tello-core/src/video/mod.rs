//! Video path: slice reassembly off the wire, the byte pipe into the
//! external decoder, and the latest-frame mailbox coming back out.

pub mod decoder;
pub mod reassembly;
pub mod slot;
pub mod stream;

pub use decoder::{
    DecodedFrame, DecoderFactory, PixelFormat, RetryPolicy, VideoDecoder, VideoRecorder,
    open_with_retry,
};
pub use reassembly::{GapEstimator, SliceAssembler, SliceHeader, SlicePush};
pub use slot::{FrameSlot, NumberedFrame};
pub use stream::{StreamReader, VideoStreamBuffer};
