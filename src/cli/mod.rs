//! CLI command implementations.
//!
//! Each submodule implements one `csvbridge` subcommand. The functions here
//! take readers, writers and a [`crate::ResolverSet`] so they can be driven
//! from tests without a terminal or a live server.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `translate` | Add an id column for a name column, or a name column for an id column |
//! | `namify` | Print names generated from a numeric template |
//! | `kinds` | List supported entity kinds |
//!
//! # Example Usage
//!
//! ```bash
//! # hosts.csv has an "organization" column; add "organization_id"
//! csvbridge --server https://foreman.example.com -u admin translate \
//!     --kind organization --column organization --csv-file hosts.csv
//!
//! # the reverse, reading ids from stdin
//! cat export.csv | csvbridge translate --kind os --column os --csv-export
//!
//! csvbridge namify --template 'web%03d' --count 3
//! ```

mod kinds;
mod namify;
mod translate;

pub use kinds::{cmd_kinds, write_kinds};
pub use namify::{cmd_namify, write_names};
pub use translate::{Direction, TranslateOptions, cmd_translate, translate, translate_rows};
