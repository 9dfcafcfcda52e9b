pub mod connection;

pub use connection::connect_to_exam_page;
