pub mod behavioral;
pub mod driver;
pub mod fingerprint;
pub mod stealth;
pub mod surface;
pub mod wait;
