mod clock;
mod countdown;
mod hms;

pub use clock::{Clock, ManualClock, SystemClock};
pub use countdown::{remaining_seconds, Countdown, Tick, TimerDisplay, EXPIRY_AT_SECS};
pub use hms::Hms;
