/// Max length of a claim note.
pub const MAX_NOTES_LEN: usize = 1_000;

/// Max length of a virtual slot label built from source records.
pub const MAX_LABEL_LEN: usize = 200;

/// Widest date range a single bulk materialization may cover.
pub const MAX_EXPAND_DAYS: i64 = 2 * 366;

/// Subscription buffer per collection.
pub const NOTIFY_CHANNEL_CAPACITY: usize = 256;

/// Pending refresh signals before forwarders start dropping duplicates.
pub const REFRESH_SIGNAL_CAPACITY: usize = 64;
