//! Hardware-specific tests requiring a real board.

pub mod echo_board_tests;
pub mod utils;
