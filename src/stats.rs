use rustc_hash::FxHashMap;

/// Block counters for one page instance.
///
/// The page count resets with every page load and is never persisted. The
/// lifetime total and the per-channel breakdown are durable; they only grow
/// by one per page load (first removal wins, re-insertions of the same embed
/// bump the page count alone). Counters accumulated before the persisted
/// totals are read are folded in additively by [`merge_persisted`].
///
/// [`merge_persisted`]: BlockStats::merge_persisted
#[derive(Debug, Clone, Default)]
pub struct BlockStats {
    page_blocks: u64,
    lifetime_blocks: u64,
    channel_blocks: FxHashMap<String, u64>,
    counted_this_load: bool,
    merged: bool,
}

impl BlockStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one removed embed. Returns true when the durable counters
    /// changed, i.e. on the first removal of this page load.
    pub fn record_removal(&mut self, channel: Option<String>) -> bool {
        self.page_blocks += 1;
        if self.counted_this_load {
            return false;
        }
        self.counted_this_load = true;
        self.lifetime_blocks += 1;
        if let Some(channel) = channel {
            *self.channel_blocks.entry(channel).or_insert(0) += 1;
        }
        true
    }

    /// Folds previously persisted totals into the counters accumulated so
    /// far (additive, per-channel key union).
    pub fn merge_persisted(&mut self, lifetime: u64, channels: FxHashMap<String, u64>) {
        self.lifetime_blocks += lifetime;
        for (channel, count) in channels {
            *self.channel_blocks.entry(channel).or_insert(0) += count;
        }
        self.merged = true;
    }

    /// Whether the persisted totals have been folded in; until then, durable
    /// counter changes must not be written back.
    pub fn merged(&self) -> bool {
        self.merged
    }

    /// Marks the persisted totals as unavailable; local counts become the
    /// truth for subsequent writes.
    pub fn mark_merged(&mut self) {
        self.merged = true;
    }

    pub fn page_blocks(&self) -> u64 {
        self.page_blocks
    }

    pub fn lifetime_blocks(&self) -> u64 {
        self.lifetime_blocks
    }

    pub fn channel_blocks(&self) -> &FxHashMap<String, u64> {
        &self.channel_blocks
    }

    /// Replaces the lifetime total with a freshly read stored value.
    pub fn set_lifetime_blocks(&mut self, count: u64) {
        self.lifetime_blocks = count;
    }

    /// Replaces the breakdown with a freshly read stored map.
    pub fn set_channel_blocks(&mut self, channels: FxHashMap<String, u64>) {
        self.channel_blocks = channels;
    }

    /// The channel with the highest block count, if any.
    pub fn most_blocked(&self) -> Option<(String, u64)> {
        self.channel_blocks
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(channel, &count)| (channel.clone(), count))
    }
}
