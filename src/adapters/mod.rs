//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements              | Connects to                  |
//! |--------------|-------------------------|------------------------------|
//! | `simulated`  | SensorPort, ActuatorPort| In-process device simulation |
//! | `json_store` | ConfigPort              | JSON documents on disk       |
//! | `log_sink`   | EventSink               | `log` facade                 |
//! | `notifier`   | NotifierPort            | `log` facade + outbox        |
//! | `time`       | ClockPort               | Host clock / manual clock    |

pub mod json_store;
pub mod log_sink;
pub mod notifier;
pub mod simulated;
pub mod time;
