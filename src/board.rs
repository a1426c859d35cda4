/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags.

#[cfg(feature = "board-xiao")]
mod hw {
    /// BOOT button, active low
    pub const STOP_BUTTON_PIN: u8 = 0;
    pub const BOARD_NAME: &str = "xiao_esp32s3";
}

#[cfg(all(feature = "board-m5stickc", not(feature = "board-xiao")))]
mod hw {
    /// Button A, active low
    pub const STOP_BUTTON_PIN: u8 = 37;
    pub const BOARD_NAME: &str = "m5stickc_plus2";
}

#[cfg(not(any(feature = "board-xiao", feature = "board-m5stickc")))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
