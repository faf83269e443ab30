mod args;
mod render;
mod run;

pub use args::{Cli, Commands, ConfigSubcommands};
pub use render::Renderer;
pub use run::{build_session, run_ask, run_chat};
