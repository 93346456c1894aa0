pub mod clock;
pub mod credentials;
pub mod session;
pub mod uniqueness;

pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialIssuer, RefreshGrant};
pub use session::SessionService;
pub use uniqueness::{check_availability, Availability};
