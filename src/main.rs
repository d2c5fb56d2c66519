//! # photo-catalog CLI
//!
//! Command-line interface for the photo catalog.
//!
//! ## Usage
//! ```bash
//! photo-catalog scan ~/Pictures --duplicates
//! photo-catalog query ~/Pictures --search beach --sort name-ascending
//! photo-catalog organize ~/Pictures --apply
//! ```

mod cli;

use photo_catalog::Result;

fn main() -> Result<()> {
    photo_catalog::init_tracing();
    cli::run()
}
