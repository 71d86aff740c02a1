use crate::prelude::*;
use crate::stream::ChannelData;

#[derive(Debug, Clone)]
pub struct Channels {
    pub from_stream: broadcast::Sender<ChannelData>,
    pub to_stream: broadcast::Sender<ChannelData>,
    pub events: broadcast::Sender<Event>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            from_stream: Self::channel(),
            to_stream: Self::channel(),
            events: Self::channel(),
        }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn emit(&self, event: Event) {
        debug!("{}", event);
        let _ = self.events.send(event);
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(2048).0
    }
}
