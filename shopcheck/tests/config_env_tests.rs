use std::time::Duration;

use serial_test::serial;
use shopcheck::HarnessConfig;

const VARS: [&str; 6] = [
    "SHOPCHECK_BASE_URL",
    "SHOPCHECK_ADMIN_EMAIL",
    "SHOPCHECK_ADMIN_PASSWORD",
    "SHOPCHECK_USER_EMAIL",
    "SHOPCHECK_USER_PASSWORD",
    "SHOPCHECK_TIMEOUT_SECS",
];

fn cleanup_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_env() {
    cleanup_env();

    let config = HarnessConfig::from_env();
    assert_eq!(config.base_url, "http://localhost:5000/api");
    assert_eq!(config.admin.email, "admin@gmail.com");
    assert_eq!(config.admin.password, "admin@gmail.com");
    assert_eq!(config.user.email, "jordan@gmail.com");
    assert_eq!(config.timeout, Duration::from_secs(30));
}

#[test]
#[serial]
fn test_env_overrides_every_field() {
    cleanup_env();
    std::env::set_var("SHOPCHECK_BASE_URL", "http://shop.internal:8080/api/");
    std::env::set_var("SHOPCHECK_ADMIN_EMAIL", "root@shop.test");
    std::env::set_var("SHOPCHECK_ADMIN_PASSWORD", "hunter2");
    std::env::set_var("SHOPCHECK_USER_EMAIL", "buyer@shop.test");
    std::env::set_var("SHOPCHECK_USER_PASSWORD", "pa55");
    std::env::set_var("SHOPCHECK_TIMEOUT_SECS", "5");

    let config = HarnessConfig::from_env();
    assert_eq!(config.base_url, "http://shop.internal:8080/api");
    assert_eq!(config.admin_email(), "root@shop.test");
    assert_eq!(config.admin.password, "hunter2");
    assert_eq!(config.user.email, "buyer@shop.test");
    assert_eq!(config.user.password, "pa55");
    assert_eq!(config.timeout, Duration::from_secs(5));

    cleanup_env();
}

#[test]
#[serial]
fn test_unparsable_timeout_falls_back() {
    cleanup_env();
    std::env::set_var("SHOPCHECK_TIMEOUT_SECS", "soon");

    let config = HarnessConfig::from_env();
    assert_eq!(config.timeout, Duration::from_secs(30));

    cleanup_env();
}
