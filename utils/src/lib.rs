mod address;
mod general;
mod log;
mod naming;
pub mod template;

pub use address::{is_dns_label, validate_ipv4};
pub use general::{format_key_values, indent};
pub use self::log::{parse_level, setup_logging};
pub use naming::{IdGenerator, SUFFIX_LEN, generate_suffix};
