pub mod device;
pub mod devicemapper;
pub mod iostat;
