//! Driver layer for browser automation.
//!
//! This crate exposes the stealth browser surface the chat engine drives,
//! plus the bounded-wait primitives every higher layer polls with.
//!
//! - [`parley_browser::driver`]: WebDriver launch with stealth capabilities
//! - [`parley_browser::surface`]: the [`parley_browser::surface::ChatSurface`]
//!   DOM abstraction and its fantoccini-backed implementation
//! - [`parley_browser::wait`]: bounded poll loops with an injectable clock
//! - [`parley_browser::behavioral`]: human-like pacing between DOM actions
//! - [`parley_browser::stealth`]: startup arguments and JS evasions
pub mod parley_browser;
