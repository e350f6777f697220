use argh::FromArgs;
use xshell::cmd;

use crate::Flag;
use crate::Prepare;
use crate::PreparedCommand;

/// Lints the loom build of the crate together with its models.
#[derive(FromArgs, Default)]
#[argh(subcommand, name = "loom-clippy")]
pub struct LoomClippyCommand {}

impl Prepare for LoomClippyCommand {
    fn prepare<'a>(&self, sh: &'a xshell::Shell, _flags: Flag) -> Vec<PreparedCommand<'a>> {
        vec![
            PreparedCommand::new::<Self>(
                cmd!(sh, "cargo clippy --lib --test loom -- -Dwarnings"),
                "Please address the clippy lints in the loom build reported above.",
            )
            .with_env_var("RUSTFLAGS", "--cfg loom"),
        ]
    }
}
