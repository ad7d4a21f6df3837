use std::{sync::Arc, time::Duration};

use tracing::warn;

use crate::{Error, Sender};

/// Fans out observations to multiple senders.
///
/// Each observation is forwarded to every sender, in the order the senders were added. Nothing isolates one sender
/// from another: a sender that panics stops the fan-out.
#[derive(Clone, Default)]
pub struct MultiSender {
    senders: Vec<Arc<dyn Sender>>,
}

impl MultiSender {
    /// Creates a new `MultiSender` over the given senders.
    pub fn new(senders: Vec<Arc<dyn Sender>>) -> Self {
        MultiSender { senders }
    }

    /// Appends a sender to the fan-out list.
    pub fn push(&mut self, sender: Arc<dyn Sender>) {
        self.senders.push(sender);
    }

    /// Returns the number of senders.
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Returns `true` if there are no senders.
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl FromIterator<Arc<dyn Sender>> for MultiSender {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Sender>>>(iter: I) -> Self {
        MultiSender { senders: iter.into_iter().collect() }
    }
}

impl Sender for MultiSender {
    fn gauge(&self, stat: &str, value: f64, tags: &[&str]) {
        for sender in &self.senders {
            sender.gauge(stat, value, tags);
        }
    }

    fn count(&self, stat: &str, count: f64, tags: &[&str]) {
        for sender in &self.senders {
            sender.count(stat, count, tags);
        }
    }

    fn histogram(&self, stat: &str, value: f64, tags: &[&str]) {
        for sender in &self.senders {
            sender.histogram(stat, value, tags);
        }
    }

    fn timing(&self, stat: &str, duration: Duration, tags: &[&str]) {
        for sender in &self.senders {
            sender.timing(stat, duration, tags);
        }
    }

    /// Closes every sender, in order.
    ///
    /// All senders are closed even if some of them fail. The first error is returned; later errors are only logged.
    fn close(&self) -> Result<(), Error> {
        let mut first_error = None;
        for (index, sender) in self.senders.iter().enumerate() {
            if let Err(e) = sender.close() {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!(error = %e, sender = index, "Failed to close sender.");
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
