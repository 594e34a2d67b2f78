use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::{ArgAction, Parser};
use roster_registration::config::DEFAULT_REGISTRY_ADDRESS;
use roster_registration::{RegistrationConfig, RegistrationOptions, RegistryOptions};

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// Address the health endpoints bind to
    #[arg(long, env = "ROSTER_LISTEN_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen_address: IpAddr,

    /// Port the service listens on, also the port registered
    #[arg(long, env = "ROSTER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Registry server address
    #[arg(long, env = "ROSTER_REGISTRY_ADDRESS", default_value = DEFAULT_REGISTRY_ADDRESS)]
    pub registry_address: String,

    /// Service name to register
    #[arg(long, env = "ROSTER_SERVICE_NAME", required = true)]
    pub service_name: String,

    /// Explicit instance id
    #[arg(long, env = "ROSTER_SERVICE_ID")]
    pub service_id: Option<String>,

    #[arg(long = "tag", env = "ROSTER_TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Address the registry uses to reach this service
    #[arg(long, env = "ROSTER_SERVICE_ADDRESS", default_value = "localhost")]
    pub service_address: String,

    #[arg(long, env = "ROSTER_HEALTH_CHECK_PATH", default_value = "/health")]
    pub health_check_path: String,

    #[arg(long, env = "ROSTER_HEALTH_CHECK_INTERVAL_SECONDS", default_value_t = 10)]
    pub health_check_interval_seconds: u64,

    #[arg(long, env = "ROSTER_HEALTH_CHECK_TIMEOUT_SECONDS", default_value_t = 5)]
    pub health_check_timeout_seconds: u64,

    #[arg(long, env = "ROSTER_DEREGISTER_AFTER_SECONDS", default_value_t = 30)]
    pub deregister_after_seconds: u64,

    /// Master switch for registration and deregistration
    #[arg(long, env = "ROSTER_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub enabled: bool,

    #[arg(long, env = "ROSTER_DATACENTER")]
    pub datacenter: Option<String>,

    #[arg(long, env = "ROSTER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long, env = "ROSTER_AUTO_REGISTER", default_value_t = true, action = ArgAction::Set)]
    pub auto_register: bool,

    #[arg(long, env = "ROSTER_AUTO_DEREGISTER", default_value_t = true, action = ArgAction::Set)]
    pub auto_deregister: bool,

    #[arg(long, env = "ROSTER_REGISTRATION_DELAY_SECONDS", default_value_t = 0)]
    pub registration_delay_seconds: u64,

    #[arg(long, env = "ROSTER_MAX_RETRY_ATTEMPTS", default_value_t = 3)]
    pub max_retry_attempts: u32,

    #[arg(long, env = "ROSTER_RETRY_DELAY_SECONDS", default_value_t = 5)]
    pub retry_delay_seconds: u64,
}

impl Args {
    pub(crate) const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub(crate) fn registration_config(&self) -> RegistrationConfig {
        RegistrationConfig {
            registry: RegistryOptions {
                address: self.registry_address.clone(),
                service_name: self.service_name.clone(),
                service_id: self.service_id.clone(),
                tags: self.tags.clone(),
                port: self.port,
                service_address: self.service_address.clone(),
                health_check_path: self.health_check_path.clone(),
                health_check_interval_seconds: self.health_check_interval_seconds,
                health_check_timeout_seconds: self.health_check_timeout_seconds,
                deregister_after_seconds: self.deregister_after_seconds,
                enabled: self.enabled,
                datacenter: self.datacenter.clone(),
                token: self.token.clone(),
            },
            registration: RegistrationOptions {
                auto_register: self.auto_register,
                auto_deregister: self.auto_deregister,
                registration_delay_seconds: self.registration_delay_seconds,
                max_retry_attempts: self.max_retry_attempts,
                retry_delay_seconds: self.retry_delay_seconds,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_option_defaults() {
        let args = Args::try_parse_from(["roster-agent", "--service-name", "orders"]).unwrap();
        let config = args.registration_config();

        assert_eq!(
            config.registry,
            RegistryOptions {
                service_name: "orders".to_string(),
                port: 8080,
                ..RegistryOptions::default()
            }
        );
        assert_eq!(config.registration, RegistrationOptions::default());
        assert_eq!(args.listen_addr().port(), 8080);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "roster-agent",
            "--service-name",
            "orders",
            "--port",
            "9000",
            "--tag",
            "api,v2",
            "--enabled",
            "false",
            "--auto-deregister",
            "false",
            "--max-retry-attempts",
            "7",
        ])
        .unwrap();
        let config = args.registration_config();

        assert_eq!(config.registry.port, 9000);
        assert_eq!(config.registry.tags, vec!["api".to_string(), "v2".to_string()]);
        assert!(!config.registry.enabled);
        assert!(config.registration.auto_register);
        assert!(!config.registration.auto_deregister);
        assert_eq!(config.registration.max_retry_attempts, 7);
    }

    #[test]
    fn test_service_name_is_required() {
        assert!(Args::try_parse_from(["roster-agent"]).is_err());
    }
}
