pub mod ata;
pub mod floppy;
