pub mod ncdot;
