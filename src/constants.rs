//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable. Names that end up
//! on cluster objects (labels, finalizers, container names) are part of the
//! wire contract and must not change between releases.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Re-check delay while a referenced GameDefinition exists but is not ready
pub const DEFAULT_TEMPLATE_NOT_READY_REQUEUE_SECS: u64 = 30;

/// Re-check delay while a SteamServer has not reached `Running`
pub const DEFAULT_NOT_RUNNING_REQUEUE_SECS: u64 = 10;

/// Per-resource error backoff floor (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 5;

/// Per-resource error backoff ceiling (seconds)
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 300;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default upper bound on concurrent reconciliations per controller
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "boilerr-controller";

/// Finalizer guarding SteamServer deletion
pub const STEAM_SERVER_FINALIZER: &str = "boilerr.dev/steamserver-finalizer";

/// Annotation carrying the hash of the last applied artifact spec
pub const SPEC_HASH_ANNOTATION: &str = "boilerr.dev/spec-hash";

// Identity labels
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_GAME: &str = "boilerr.dev/game";
pub const LABEL_NAME_VALUE: &str = "steamserver";
pub const LABEL_MANAGED_BY_VALUE: &str = "boilerr";

/// Container image used when neither the server nor its definition names one
pub const DEFAULT_IMAGE: &str = "steamcmd/steamcmd:ubuntu-22";

/// Install directory default carried by the GameDefinition schema
pub const DEFAULT_INSTALL_DIR: &str = "/data/server";

/// Volume name for game server files
pub const SERVER_FILES_VOLUME: &str = "serverfiles";

/// Mount path for game server files, also the install dir of last resort
pub const SERVER_FILES_MOUNT_PATH: &str = "/serverfiles";

/// Volume name for the generated config file bundle
pub const CONFIG_FILES_VOLUME: &str = "config-files";

/// SteamCMD init container name
pub const INIT_CONTAINER_NAME: &str = "steamcmd";

/// Game server container name
pub const GAME_SERVER_CONTAINER_NAME: &str = "gameserver";

/// Storage size used when neither the server nor its definition requests one
pub const DEFAULT_STORAGE_SIZE: &str = "20Gi";

/// Prefix for environment variables that carry secret-backed config values
pub const CONFIG_ENV_PREFIX: &str = "CONFIG_";

/// Rendered in place of a template reference to an unknown config key
pub const MISSING_VALUE_PLACEHOLDER: &str = "<no value>";

/// Address reported while a load balancer has no ingress yet
pub const ADDRESS_PENDING: &str = "<pending>";

/// Address reported for node-routed services
pub const ADDRESS_NODE_IP: &str = "<node-ip>";

/// Status message written when a GameDefinition passes validation
pub const DEFINITION_READY_MESSAGE: &str = "GameDefinition validated successfully";

/// Default health check delays (seconds)
pub const DEFAULT_HEALTH_INITIAL_DELAY_SECS: i32 = 120;
pub const DEFAULT_HEALTH_PERIOD_SECS: i32 = 30;
