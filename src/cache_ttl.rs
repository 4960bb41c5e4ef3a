//! Cache time-to-live values with environment variable overrides

use std::env;
use std::time::Duration;

// Default TTL constants (in seconds)
pub const TTL_TODO_LIST: u64 = 300; // 5 minutes
pub const TTL_TODO_ITEM: u64 = 300; // 5 minutes

/// Get TTL with environment variable override
pub fn ttl_with_env(env_key: &str, default_ttl: u64) -> u64 {
    env::var(env_key)
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .filter(|ttl| *ttl > 0)
        .unwrap_or(default_ttl)
}

/// TTL for cached list and search pages
pub fn get_todo_list_ttl() -> Duration {
    Duration::from_secs(ttl_with_env("TTL_TODO_LIST_SECONDS", TTL_TODO_LIST))
}

/// TTL for cached single-item lookups
pub fn get_todo_item_ttl() -> Duration {
    Duration::from_secs(ttl_with_env("TTL_TODO_ITEM_SECONDS", TTL_TODO_ITEM))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_garbage_falls_back_to_default() {
        assert_eq!(ttl_with_env("TTL_TEST_UNSET_KEY_7F3A", 42), 42);

        env::set_var("TTL_TEST_GARBAGE_KEY_7F3A", "soon");
        assert_eq!(ttl_with_env("TTL_TEST_GARBAGE_KEY_7F3A", 42), 42);

        env::set_var("TTL_TEST_ZERO_KEY_7F3A", "0");
        assert_eq!(ttl_with_env("TTL_TEST_ZERO_KEY_7F3A", 42), 42);

        env::set_var("TTL_TEST_VALID_KEY_7F3A", "60");
        assert_eq!(ttl_with_env("TTL_TEST_VALID_KEY_7F3A", 42), 60);
    }
}
