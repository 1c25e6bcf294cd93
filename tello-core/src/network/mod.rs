pub mod link;

pub use link::ControlLink;
