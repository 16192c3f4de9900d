mod http;

pub use http::HttpJobTracker;
