pub mod batch;
pub mod event;
pub mod file;
pub mod id;
pub mod pagination;
pub mod share;

pub use batch::{BatchResult, ItemResult};
pub use event::{EventEnvelope, EventHeader, EventSource, ObjectEventPayload, Topic};
pub use file::{FilePatch, FileRecord, MoveOutcome, UploadItem, UploadOutcome, VersionEntry};
pub use id::{generate_id, ShareId};
pub use pagination::{Page, PageParams, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE};
pub use share::{
    CreateShareRequest, ShareGrant, ShareInfo, SharePermissions, UpdateSharePermissionsRequest,
};
