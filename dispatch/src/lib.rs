pub mod codec;
pub mod email;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod notify;
pub mod orchestrator;
pub mod spreadsheet;
pub mod webhook;

pub use codec::{CodecError, ConfigCodec};
pub use errors::DispatchError;
pub use handler::{
    DispatchContext, ExecuteOutcome, HandlerLookup, HandlerRegistry, IntegrationHandler,
    ValidationOutcome,
};
pub use notify::{FailureNotifier, LogNotifier, NotifyError};
pub use orchestrator::{DispatchFailure, Dispatcher};
