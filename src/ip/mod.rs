//! Public IP discovery and IP-based geolocation.

pub mod lookup;
pub mod public;

pub use lookup::{IpLocation, IpLocationLookup, LookupError};
pub use public::{PublicIp, PublicIpResolver};
