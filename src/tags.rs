use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A hierarchical gameplay label such as `State.Debuff.Stunned`.
///
/// Queries are hierarchical: a hub holding `State.Debuff.Stunned` answers yes to
/// `State.Debuff` and `State`, but not the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameplayTag(String);

impl GameplayTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// True if `self` is `query` or a descendant of it.
    pub fn matches(&self, query: &GameplayTag) -> bool {
        match self.0.strip_prefix(query.0.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }

    pub fn parent(&self) -> Option<GameplayTag> {
        self.0.rfind('.').map(|idx| GameplayTag(self.0[..idx].to_string()))
    }
}

impl From<&str> for GameplayTag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GameplayTag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered, de-duplicated set of tags as authored on a definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagContainer(Vec<GameplayTag>);

impl TagContainer {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add(&mut self, tag: impl Into<GameplayTag>) {
        let tag = tag.into();
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    pub fn with(mut self, tag: impl Into<GameplayTag>) -> Self {
        self.add(tag);
        self
    }

    pub fn remove(&mut self, tag: &GameplayTag) -> bool {
        let Some(pos) = self.0.iter().position(|t| t == tag) else {
            return false;
        };
        self.0.remove(pos);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GameplayTag> {
        self.0.iter()
    }

    /// True if any tag in this container matches `query` hierarchically.
    pub fn has_tag(&self, query: &GameplayTag) -> bool {
        self.0.iter().any(|tag| tag.matches(query))
    }

    /// True if any tag in this container matches any tag in `queries`.
    pub fn has_any(&self, queries: &TagContainer) -> bool {
        queries.iter().any(|query| self.has_tag(query))
    }

    pub fn has_all(&self, queries: &TagContainer) -> bool {
        queries.iter().all(|query| self.has_tag(query))
    }
}

impl<T: Into<GameplayTag>> FromIterator<T> for TagContainer {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut container = TagContainer::new();
        for tag in iter {
            container.add(tag);
        }
        container
    }
}

impl<'a> IntoIterator for &'a TagContainer {
    type Item = &'a GameplayTag;
    type IntoIter = std::slice::Iter<'a, GameplayTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Reference-counted multiset of tags active on a hub.
///
/// Effects and abilities each add their tags once and remove them once, so two
/// sources granting `State.Burning` keep it alive until both are gone.
#[derive(Debug, Clone, Default)]
pub struct TagCountMap {
    counts: BTreeMap<GameplayTag, u32>,
}

impl TagCountMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tag(&mut self, tag: &GameplayTag) {
        *self.counts.entry(tag.clone()).or_insert(0) += 1;
    }

    pub fn remove_tag(&mut self, tag: &GameplayTag) {
        let Some(count) = self.counts.get_mut(tag) else {
            log::debug!("Removing tag '{}' that is not present", tag);
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(tag);
        }
    }

    pub fn add_tags(&mut self, tags: &TagContainer) {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    pub fn remove_tags(&mut self, tags: &TagContainer) {
        for tag in tags {
            self.remove_tag(tag);
        }
    }

    /// Number of times this exact tag has been added and not yet removed.
    pub fn count(&self, tag: &GameplayTag) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn has_tag(&self, query: &GameplayTag) -> bool {
        self.counts.keys().any(|tag| tag.matches(query))
    }

    pub fn has_any(&self, queries: &TagContainer) -> bool {
        queries.iter().any(|query| self.has_tag(query))
    }

    pub fn has_all(&self, queries: &TagContainer) -> bool {
        queries.iter().all(|query| self.has_tag(query))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GameplayTag, u32)> {
        self.counts.iter().map(|(tag, count)| (tag, *count))
    }
}
