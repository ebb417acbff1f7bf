pub mod accumulator;
pub mod client;
pub mod event;

pub use accumulator::{Phase, ResponseAccumulator};
pub use client::{Error, HttpClient, RedirectPolicy, RequestConfig, Response};
pub use event::{EventHandler, Exchange, HandlerError, HttpEvent};
