//! The boundary to the external measurement capability.

use async_trait::async_trait;

use sc_types::{Action, Measurement, MeasureError};

/// One acquisition: apply the action's settings to the instrument, acquire,
/// and score the result against the enabled objectives.
///
/// Implemented by the hardware-driver collaborator. The session holds an
/// injected handle, never a process-wide instrument singleton, so multiple
/// sessions and tests can run against independent (or mock) instruments. A
/// session issues at most one `measure` call at a time.
#[async_trait]
pub trait Acquisition: Send + Sync {
    async fn measure(&mut self, action: &Action) -> Result<Measurement, MeasureError>;
}
