//! The long-running loops: control/telemetry, video receive, video
//! decode and the recording writer. Each stops at its natural blocking point once its
//! cancellation token fires.

pub(crate) mod control;
pub(crate) mod decode;
pub(crate) mod record;
pub(crate) mod video;
