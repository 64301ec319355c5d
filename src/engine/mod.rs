pub mod blocklist;
pub mod matcher;
pub mod state;

pub use blocklist::{default_domains, load_blocklist, BlocklistManager};
pub use matcher::{base_domain, channel_from_src, embed_src_matches, is_blocked};
pub use state::{CoordinatorState, TabId};
