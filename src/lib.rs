//! Converts RTL8710 ELF executables into the firmware images expected by its boot loader
//!
//! # Examples
//!
//! ```no_run
//! use rtlimage::rtl::{elf2image, Options};
//!
//! let report = elf2image(&Options {
//!     input: "application.axf".into(),
//!     outdir: "build".into(),
//!     ota: true,
//!     ..Options::default()
//! })?;
//!
//! println!("{} bytes of flash used", report.usage.flash);
//!
//! # Ok::<(), rtlimage::Error>(())
//! ```

pub mod elf;
mod error;
pub mod rtl;
mod segment;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use segment::Segment;
