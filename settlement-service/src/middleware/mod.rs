pub mod admin;
pub mod user;

pub use admin::AdminContext;
pub use user::UserContext;
