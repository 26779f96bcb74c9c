//! Interfaces to the channel that carries messages to and from the peer.
//!
//! Both sides are serviced on the I/O thread: the channel hands the filter a
//! [`MessageSender`] when it attaches, and feeds every inbound message to
//! [`MessageFilter::on_message_received`].

use crate::protocol::{HostMessage, PeerMessage};
use std::sync::Arc;

/// Outbound half of the channel. Fire-and-forget.
pub trait MessageSender: Send + Sync {
    fn send(&self, message: HostMessage);
}

/// Hooks a channel drives on its I/O thread.
pub trait MessageFilter: Send + Sync {
    /// The channel is ready; outbound messages go to `sender` until detach.
    fn on_filter_added(&self, sender: Arc<dyn MessageSender>);

    /// The filter is removed from the channel and will not be used again.
    fn on_filter_removed(&self);

    /// The channel is going away. Later sends are discarded.
    fn on_channel_closing(&self);

    /// Returns `true` if the filter consumed the message.
    fn on_message_received(&self, message: &PeerMessage) -> bool;
}
