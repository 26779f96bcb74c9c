//! Client-facing callback surface.

use crate::protocol::MidiPortInfo;
use std::sync::Arc;

/// Receives session and data notifications on the main thread.
///
/// A client sees, per admission: zero or more port-added calls (only when the
/// session succeeded), then exactly one `did_start_session`, then zero or more
/// `did_receive_midi_data` calls for as long as it stays registered.
pub trait MidiAccessorClient: Send + Sync {
    fn did_add_input_port(&self, info: &MidiPortInfo, active: bool);

    fn did_add_output_port(&self, info: &MidiPortInfo, active: bool);

    /// `error_name` and `message` are empty on success.
    fn did_start_session(&self, success: bool, error_name: &str, message: &str);

    fn did_receive_midi_data(&self, port: u32, data: &[u8], timestamp: f64);
}

pub type ClientHandle = Arc<dyn MidiAccessorClient>;

/// Identity comparison; ignores vtable differences between trait objects.
#[inline]
pub(crate) fn same_client(a: &ClientHandle, b: &ClientHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
