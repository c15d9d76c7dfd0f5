pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod markdown;
pub mod message;
pub mod notice;
pub mod replies;
pub mod routing;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use backend::{AnalysisBackend, BackendKind, BackendReply, BackendRequest, BackendSet};
pub use config::{BackendEndpoint, DispatcherConfig};
pub use dispatcher::{BackendConnection, Dispatcher};
pub use error::{DispatchError, Result};
pub use message::{Message, MessageKind, Sender, SourceTag};
pub use notice::{Notice, NoticeLevel};
pub use storage::{InMemorySessionStorage, SessionStorage};
pub use upload::{PendingUploadInfo, UploadKind, UploadedFile};
