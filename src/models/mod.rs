pub mod comment;
pub mod file;
pub mod payment;
pub mod progress;
pub mod record;
pub mod user;

pub use comment::{Comment, CommentTarget, NewComment, UserRef};
pub use file::{NewFile, StoredFile};
pub use payment::{NewPayment, Payment, PaymentListing};
pub use progress::{AttachmentBundle, NewProgress, Progress, ProgressListing};
pub use record::{Decision, RecordStatus, ThreadComment};
pub use user::{Account, NewAccount, Role};
