use super::*;

// =============================================================================
// env_parse
// =============================================================================

// Tests run in parallel; only mutate keys no other test reads.

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__SKETCHROOM_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__SKETCHROOM_TEST_VALID__", " 250 ") };
    let val: u64 = env_parse("__SKETCHROOM_TEST_VALID__", 0);
    assert_eq!(val, 250);
    unsafe { std::env::remove_var("__SKETCHROOM_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__SKETCHROOM_TEST_INVALID__", "soon") };
    let val: u32 = env_parse("__SKETCHROOM_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__SKETCHROOM_TEST_INVALID__") };
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert!(config.database_url.is_none());
    assert!(config.session_user.is_none());
    assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
    assert_eq!(config.quiet_interval(), Duration::from_millis(1000));
    assert_eq!((config.canvas_width, config.canvas_height), (1280, 720));
    assert_eq!(config.channel_capacity, 256);
}

#[test]
fn session_options_carry_quiet_interval() {
    let config = Config { snapshot_quiet_ms: 250, ..Config::default() };
    let options = config.session_options();
    assert_eq!(options.quiet_interval, Duration::from_millis(250));
    assert_eq!(options.origin, Point::default());
}
