pub mod blockdev;
pub mod devicemapper;
pub mod iostat;
pub mod lsblk;
