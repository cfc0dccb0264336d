//! Microsoft Graph API access

pub mod me;

pub use me::fetch_profile;

/// Default profile endpoint
pub const ME_URL: &str = "https://graph.microsoft.com/v1.0/me";
