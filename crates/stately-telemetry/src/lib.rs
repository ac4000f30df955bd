mod logging;

pub use logging::{filter_string, init_telemetry, TelemetryConfig};
