use crate::channel::ChannelAnnouncement;
use crate::util::status::Status;
use crate::SendSync;

/// Publishes established channels to the network
pub trait Announcer: SendSync {
    /// Announce a channel.  Called once per channel, after both escape
    /// signatures have been verified.
    fn announce(&self, announcement: &ChannelAnnouncement) -> Result<(), Status>;
}

/// An announcer which only logs
pub struct LogAnnouncer;

impl SendSync for LogAnnouncer {}

impl Announcer for LogAnnouncer {
    fn announce(&self, announcement: &ChannelAnnouncement) -> Result<(), Status> {
        log::info!("announce channel {}", announcement.channel_id);
        Ok(())
    }
}
