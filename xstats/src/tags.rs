use indexmap::IndexMap;

const TAG_SEPARATOR: char = ':';

/// An ordered set of tags, indexed by tag key.
///
/// Tags are stored in their rendered form (`key:value`, or a bare `key` when there is no value) in the order their
/// keys were first inserted. Re-inserting an existing key replaces its value in place, so the last write wins without
/// changing where the tag is emitted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: IndexMap<String, String>,
}

impl TagSet {
    /// Creates an empty `TagSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single tag, replacing any existing tag with the same key.
    ///
    /// An empty value produces a bare tag.
    pub fn add_tag(&mut self, key: &str, value: &str) {
        let mut rendered = String::with_capacity(key.len() + 1 + value.len());
        rendered.push_str(key);
        if !value.is_empty() {
            rendered.push(TAG_SEPARATOR);
            rendered.push_str(value);
        }

        self.upsert(key, rendered);
    }

    /// Adds a list of tags in the `key:value` form.
    ///
    /// Each entry is split on its first `:`. Entries without a separator are bare tags keyed by the whole entry.
    pub fn add_tags<S: AsRef<str>>(&mut self, tags: &[S]) {
        for tag in tags {
            let tag = tag.as_ref();
            let key = tag.split_once(TAG_SEPARATOR).map_or(tag, |(key, _)| key);
            self.upsert(key, tag.to_string());
        }
    }

    fn upsert(&mut self, key: &str, rendered: String) {
        match self.tags.get_mut(key) {
            Some(existing) => *existing = rendered,
            None => {
                self.tags.insert(key.to_string(), rendered);
            }
        }
    }

    /// Returns a copy of the rendered tags, in emission order.
    pub fn tags(&self) -> Vec<String> {
        self.tags.values().cloned().collect()
    }

    /// Iterates over the rendered tags, in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.values().map(String::as_str)
    }

    /// Merges call-site tags with the tags in this set.
    ///
    /// The call-site tags come first, followed by the stored tags. Neither input is modified.
    pub fn merge<'a>(&'a self, call_site: &[&'a str]) -> Vec<&'a str> {
        let mut merged = Vec::with_capacity(call_site.len() + self.tags.len());
        merged.extend_from_slice(call_site);
        merged.extend(self.iter());
        merged
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if there are no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Removes every tag, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.add_tags(&[tag]);
        }
        set
    }
}
