use std::{sync::Arc, time::Duration};

use once_cell::sync::Lazy;

use crate::{Sender, XStater};

static NOP: Lazy<Arc<dyn XStater>> = Lazy::new(|| Arc::new(Nop));

/// A client that does nothing.
///
/// Every observation is discarded, tags are never stored, and derived clients are `Nop` as well. It is handed out
/// whenever no real client is configured, so that calling code never has to check for one.
#[derive(Clone, Copy, Debug, Default)]
pub struct Nop;

impl Sender for Nop {
    fn gauge(&self, _stat: &str, _value: f64, _tags: &[&str]) {}

    fn count(&self, _stat: &str, _count: f64, _tags: &[&str]) {}

    fn histogram(&self, _stat: &str, _value: f64, _tags: &[&str]) {}

    fn timing(&self, _stat: &str, _duration: Duration, _tags: &[&str]) {}
}

impl XStater for Nop {
    fn add_tags(&self, _tags: &[&str]) {}

    fn add_tag(&self, _key: &str, _value: &str) {}

    fn get_tags(&self) -> Vec<String> {
        Vec::new()
    }

    fn copy(&self) -> Box<dyn XStater> {
        Box::new(Nop)
    }

    fn scope(&self, _scope: &str, _scopes: &[&str]) -> Box<dyn XStater> {
        Box::new(Nop)
    }
}

/// Returns the shared no-op client.
pub fn nop() -> Arc<dyn XStater> {
    Arc::clone(&NOP)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::nop;
    use crate::{Sender as _, XStater as _};

    #[test]
    fn every_operation_is_silent() {
        let xs = nop();
        xs.add_tags(&["a:1"]);
        xs.add_tag("b", "2");
        xs.gauge("g", 1.0, &["t"]);
        xs.count("c", 1.0, &[]);
        xs.histogram("h", 1.0, &[]);
        xs.timing("t", Duration::from_secs(1), &[]);

        assert!(xs.get_tags().is_empty());
        assert!(xs.copy().get_tags().is_empty());
        assert!(xs.scope("s", &["t"]).get_tags().is_empty());
        assert!(xs.close().is_ok());
    }
}
