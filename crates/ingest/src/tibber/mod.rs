pub mod decode;
pub mod http;
pub mod protocol;
pub mod ws;

pub use ws::TibberSource;
