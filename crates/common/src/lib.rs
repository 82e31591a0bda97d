pub mod dates;
pub mod error;
pub mod models;
pub mod serial;

pub use error::{Error, Result};
pub use models::{EducationEntry, PendingNotification, Registration, RegistrationForm};
pub use serial::SerialNumber;
