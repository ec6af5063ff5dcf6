pub mod latin1;
pub mod responses;
