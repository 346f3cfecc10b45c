pub mod session;
pub mod study_group;
pub mod todo;
pub mod user;

pub use session::{SessionStatus, StartSession, StopSession, WorkSession};
pub use study_group::{Channel, ChannelInput, Message, MessageInput, StudyGroup, StudyGroupInput};
pub use todo::{Todo, TodoInput, TodoUpdate};
pub use user::{Profile, ProfileUpdate, User};
