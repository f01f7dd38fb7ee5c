pub mod client;
pub mod clock;
pub mod manager;
pub mod store;
pub mod token;

pub use client::{AuthServerClient, HttpAuthServerClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{Timeouts, TokenLifecycleManager};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{GrantDefect, TokenGrant, TokenRecord, TokenState};
