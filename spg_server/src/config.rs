use std::{env, time::Duration};

use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use spg_common::{parse_boolean_flag, Secret};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8460;
const DEFAULT_HOLD_TTL: Duration = Duration::from_secs(900);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_RESULT_URL: &str = "http://localhost:3000/payment/result";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the `/admin` scope, supplied by clients in the `spg-admin-key` header.
    pub admin_api_key: Secret<String>,
    /// The storefront page that browser return redirects land on. The payment result is appended as query
    /// parameters.
    pub storefront_result_url: String,
    pub gateway: GatewayConfig,
    pub sdk: SdkConfig,
    /// Upstream affiliate program endpoint. When unset, affiliate binds are stored locally only.
    pub affiliate_registrar_url: Option<String>,
    /// How long a cart hold reserves stock before the expiry worker reclaims it.
    pub hold_ttl: Duration,
    /// The status poller's sweep interval for orders awaiting hosted settlement.
    pub poll_interval: Duration,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

/// Hosted checkout gateway credentials.
#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
}

/// Vendor payment SDK bridge settings.
#[derive(Clone, Debug, Default)]
pub struct SdkConfig {
    pub base_url: String,
    pub client_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: String::default(),
            admin_api_key: Secret::default(),
            storefront_result_url: DEFAULT_RESULT_URL.to_string(),
            gateway: GatewayConfig::default(),
            sdk: SdkConfig::default(),
            affiliate_registrar_url: None,
            hold_ttl: DEFAULT_HOLD_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_DATABASE_URL is not set. Please set it to the URL for the SPG database.");
            String::default()
        });
        let admin_api_key = env::var("SPG_ADMIN_API_KEY").map(Secret::new).unwrap_or_else(|_| {
            let key: String = thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
            warn!(
                "🪛️ SPG_ADMIN_API_KEY is not set. A random key has been generated for this session: {key}. Admin \
                 endpoints will be unreachable after a restart unless you set a persistent key."
            );
            Secret::new(key)
        });
        let storefront_result_url =
            env::var("SPG_STOREFRONT_RESULT_URL").ok().unwrap_or_else(|| DEFAULT_RESULT_URL.to_string());
        let gateway = GatewayConfig {
            base_url: env::var("SPG_PAYGATE_URL").ok().unwrap_or_else(|| {
                warn!("🪛️ SPG_PAYGATE_URL is not set. Hosted checkout initiation will fail.");
                String::default()
            }),
            api_key: Secret::new(env::var("SPG_PAYGATE_API_KEY").ok().unwrap_or_default()),
        };
        let sdk = SdkConfig {
            base_url: env::var("SPG_SDK_URL").ok().unwrap_or_else(|| {
                warn!("🪛️ SPG_SDK_URL is not set. SDK payments will fail.");
                String::default()
            }),
            client_id: env::var("SPG_SDK_CLIENT_ID").ok().unwrap_or_default(),
        };
        let affiliate_registrar_url = env::var("SPG_AFFILIATE_REGISTRAR_URL").ok();
        let hold_ttl = duration_from_env("SPG_HOLD_TTL_SECS", DEFAULT_HOLD_TTL);
        let poll_interval = duration_from_env("SPG_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL);
        let use_x_forwarded_for = parse_boolean_flag(env::var("SPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SPG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            admin_api_key,
            storefront_result_url,
            gateway,
            sdk,
            affiliate_registrar_url,
            hold_ttl,
            poll_interval,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| {
                    error!("🪛️ {s} is not a valid number of seconds for {var}. {e} Using the default instead.");
                    e
                })
                .ok()
        })
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8460);
        assert_eq!(config.hold_ttl, Duration::from_secs(900));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
