pub mod admission;
pub mod config;
pub mod dispatcher;
pub mod fetcher;
pub mod metrics;
pub mod multiplexer;
pub mod testing;

pub use admission::{AdmissionGate, AdmissionTicket, GateStatus};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, FetcherConfig,
    LimitsConfig, ServerConfig, SlotScope,
};
pub use dispatcher::BatchDispatcher;
pub use fetcher::{FetchError, FetchErrorKind, Fetcher, HttpFetcher};
pub use multiplexer::{
    BatchError, BatchMultiplexer, BatchRequest, BatchResult, FetchSlot, FetchSlotPool,
    SlotPoolStatus, ValidationError,
};
