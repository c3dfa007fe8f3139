pub mod directory;
pub mod gateway;
pub mod notify;
pub mod registry;
pub mod validate;

pub use directory::{MessageDirectory, MessageUpdate};
pub use gateway::{is_public, AuthenticationGateway, Identity};
pub use notify::{HttpMailSender, LogMailSender, MailSender, NotificationDispatcher};
pub use registry::{AccountRegistry, ChannelStats};
