pub mod attribute;
pub mod device;
pub mod health;
pub mod test_entry;
