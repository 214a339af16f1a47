pub mod api;
pub mod error;
pub mod file_type;
pub mod storage;
pub mod task;

pub use api::{
    ErrorBody, ErrorKind, HealthResponse, InfoResponse, OcrResultResponse, UploadResponse,
};
pub use error::{ServiceError, StorageError};
pub use file_type::{
    classify_filename, sanitize_filename, validate_upload_filename, InputKind, MAX_FILENAME_BYTES,
    SUPPORTED_EXTENSIONS,
};
pub use storage::StorageLayout;
pub use task::{is_valid_task_id, new_task_id, Task, TaskId};
