pub mod board;
pub mod custom_field;
pub mod view;
