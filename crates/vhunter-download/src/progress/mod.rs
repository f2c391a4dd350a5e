//! Progress rate-limiting for task broadcasts.

mod throttle;

pub use throttle::ProgressThrottle;
