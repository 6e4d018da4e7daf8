pub mod approval;
pub mod packager;
pub mod report;

pub use approval::{ApprovalService, StatusQuery, WorkflowError};
pub use packager::{Attachment, AttachmentSet, Packager, PackagingError};
pub use report::{Report, ReportError, ReportKind};
