//! # Events Module
//!
//! Progress reporting for long-running catalog operations.
//!
//! ## Design
//! Operations push `Event`s through a channel, so any UI (CLI, GUI, web)
//! can display progress without the core knowing about it.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Scan(ScanEvent::Progress(p)) = event {
//!             println!("{} found, {} indexed", p.found, p.indexed);
//!         }
//!     }
//! });
//!
//! scanner.scan(root_id, &ScanOptions::default(), &sender, &CancellationToken::new())?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
