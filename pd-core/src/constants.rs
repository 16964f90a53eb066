//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "Playdeck";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Canonical channel path on same-origin and override backends.
pub const DEFAULT_CHANNEL_PATH: &str = "/ws";

/// Channel path when tunneled through the sandbox reverse proxy.
pub const SANDBOX_PROXY_PATH: &str = "/.proxy/ws";

/// Domain suffix of the sandboxed hosting environment. Hosts look like
/// `<tunnel>.playdeck.run` where the leading label identifies the tunnel.
pub const SANDBOX_HOST_SUFFIX: &str = ".playdeck.run";

/// Delay before a reconnection attempt after an unexpected close, in seconds.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Interval between relay health probes, in seconds.
pub const RELAY_PROBE_INTERVAL_SECS: u64 = 5;

/// Consecutive failed relay probes tolerated before degrading to the
/// local relay. Degradation happens on the failure after this count.
pub const RELAY_PROBE_MAX_FAILURES: u32 = 3;

/// Environment variable selecting a non-default backend for
/// local-to-remote testing. Takes precedence over the config file.
pub const ENV_SERVER_OVERRIDE: &str = "PLAYDECK_SERVER_URL";

/// Origin assumed when the CLI is not told where it runs.
pub const DEFAULT_ORIGIN: &str = "https://playdeck.app";
