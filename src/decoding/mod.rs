pub mod format;
pub mod frame;
pub mod hex;

pub use format::decode;
pub use frame::{locate, locate_hex};
pub use self::hex::{bytes_to_hex, hex_to_bytes};
