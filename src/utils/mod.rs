pub mod command;

// Trait-based abstractions for testability
pub mod hook;
pub mod http;
pub mod sleeper;

// Re-export commonly used types and traits (used by test crate)
#[allow(unused_imports)]
pub use hook::{HookRunner, ScriptHookRunner};
#[allow(unused_imports)]
pub use http::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, TransportError};
#[allow(unused_imports)]
pub use sleeper::{Sleeper, ThreadSleeper};
