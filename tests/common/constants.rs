//! Shared constants for end-to-end tests

/// Application id sent by the client. The fake server ignores it.
pub const APP_ID: &str = "TESTAPP";

/// Read-only key accepted for queries and fetches.
pub const SEARCH_KEY: &str = "search-only-key";

/// Key accepted for every request.
pub const ADMIN_KEY: &str = "admin-key";

pub const INDEX_NAME: &str = "irish_music_songs";

/// Number of songs in the bundled seed catalog.
pub const SEED_SONG_COUNT: usize = 12;

/// Number of jigs among the seed songs.
pub const SEED_JIG_COUNT: usize = 4;
