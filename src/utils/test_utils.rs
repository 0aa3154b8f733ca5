#[cfg(test)]
use crate::core::app::{new_with_config_path, App};
#[cfg(test)]
use crate::core::config::Config;

#[cfg(test)]
pub fn create_test_app() -> App {
    // No config path: toggles in tests never touch the real user config.
    new_with_config_path(Config::default(), None)
}
