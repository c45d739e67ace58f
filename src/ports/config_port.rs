//! Configuration access port trait.
//!
//! Typed parsing lives in the domain; adapters only hand back raw values.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}
