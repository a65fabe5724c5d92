pub mod folder;
pub mod history;
pub mod id;
pub mod note;
pub mod todo;
