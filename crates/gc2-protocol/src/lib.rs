//! Foresight GC2 USB text protocol: chunk reassembly, message framing, and
//! typed frame parsing.
//!
//! This crate is intentionally I/O-free. It turns the byte chunks a USB read
//! loop produces into complete protocol messages ([`frame`]) and those
//! messages into typed records ([`parser`], [`types`]), so everything here can
//! be tested without hardware.
//!
//! Wire format:
//! ```text
//! 0H\nSHOT_ID=1\nSPEED_MPH=167.0\n...\n\t     (shot message)
//! 0M\nFLAGS=7\nBALLS=1\n\t                    (status message)
//! ```
//! Lines end with `\n`; a `\t` immediately after a newline terminates the
//! message.

pub mod error;
pub mod frame;
pub mod ids;
pub mod parser;
pub mod types;

pub use error::{FramingError, ParseError};
pub use frame::{AssemblerEvent, MessageAssembler, DEFAULT_MAX_BUFFER};
pub use ids::{GC2_PRODUCT_ID, GC2_VENDOR_ID};
pub use parser::parse_message;
pub use types::{ClubFrame, Gc2Frame, ShotFrame, StatusFrame, TAG_SHOT, TAG_STATUS};
