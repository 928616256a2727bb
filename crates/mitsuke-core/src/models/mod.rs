mod identity;
mod library;

pub use identity::{Identity, Session};
pub use library::ListEntryView;
pub use mitsuke_api::traits::{
    ListRecord, ListRecordPatch, MalId, RecordId, UserId, UserRecord, WatchStatus,
};
