mod presence_directory;

pub use presence_directory::*;
