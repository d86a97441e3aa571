//! Configuration validation logic.

use crate::config::Config;
use std::collections::HashSet;

/// Validate a configuration.
///
/// Checks that the configuration is semantically valid beyond what the
/// type system enforces. Collects all problems and reports them together
/// rather than stopping at the first one.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    // Validate upstream groups
    if config.upstreams.is_empty() {
        errors.push("at least one upstream must be configured".to_string());
    }

    let mut seen_names = HashSet::new();
    for upstream in &config.upstreams {
        if upstream.name.is_empty() {
            errors.push("upstream name cannot be empty".to_string());
        } else if !seen_names.insert(upstream.name.as_str()) {
            errors.push(format!("duplicate upstream name: {}", upstream.name));
        }

        if upstream.servers.is_empty() {
            errors.push(format!("upstream {} has no servers", upstream.name));
        } else if upstream.servers.iter().all(|s| s.backup) {
            errors.push(format!(
                "upstream {} has no primary servers (all marked backup)",
                upstream.name
            ));
        }

        for server in &upstream.servers {
            if server.route.is_empty() {
                errors.push(format!(
                    "server {} in upstream {} has an empty route",
                    server.address, upstream.name
                ));
            }
            if server.fail_timeout.is_zero() && server.max_fails > 0 {
                errors.push(format!(
                    "server {} in upstream {} has fail_timeout 0 with max_fails {}",
                    server.address, upstream.name, server.max_fails
                ));
            }
        }

        if upstream.affinity.cookie.is_empty() {
            errors.push(format!("upstream {} has an empty affinity cookie name", upstream.name));
        }
        if let Some(param) = &upstream.affinity.url_param {
            if param.is_empty() {
                errors.push(format!("upstream {} has an empty affinity url_param", upstream.name));
            }
        }
    }

    // Validate global settings
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        errors.push(format!(
            "invalid log level: {} (must be one of: {})",
            config.global.log_level,
            valid_log_levels.join(", ")
        ));
    }

    if config.global.shared_region_size == 0 {
        errors.push("shared_region_size must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, UpstreamConfig};

    fn test_server(address: &str, route: &str) -> ServerConfig {
        ServerConfig {
            address: address.parse().unwrap(),
            route: route.to_string(),
            weight: 1,
            max_fails: 1,
            fail_timeout: std::time::Duration::from_secs(10),
            down: false,
            backup: false,
        }
    }

    fn test_config() -> Config {
        Config {
            upstreams: vec![UpstreamConfig {
                name: "app".to_string(),
                affinity: Default::default(),
                servers: vec![test_server("127.0.0.1:9000", "workerA")],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = test_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_no_upstreams() {
        let mut config = test_config();
        config.upstreams.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("at least one upstream"));
    }

    #[test]
    fn test_duplicate_upstream_names() {
        let mut config = test_config();
        let dup = config.upstreams[0].clone();
        config.upstreams.push(dup);
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("duplicate upstream name"));
    }

    #[test]
    fn test_all_backup_rejected() {
        let mut config = test_config();
        config.upstreams[0].servers[0].backup = true;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("no primary servers"));
    }

    #[test]
    fn test_empty_route_rejected() {
        let mut config = test_config();
        config.upstreams[0].servers[0].route.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("empty route"));
    }

    #[test]
    fn test_zero_weight_allowed() {
        // Weight 0 marks a peer reachable only through its route.
        let mut config = test_config();
        config.upstreams[0].servers.push(ServerConfig {
            weight: 0,
            ..test_server("127.0.0.1:9001", "workerB")
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = test_config();
        config.global.log_level = "verbose".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("invalid log level"));
    }

    #[test]
    fn test_multiple_errors_joined() {
        let mut config = test_config();
        config.upstreams[0].servers[0].route.clear();
        config.global.log_level = "loud".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("; "));
    }
}
