pub mod apikeys;
pub mod credentials;
pub mod logs;
pub mod password;
pub mod usage;
