use argh::FromArgs;
use xshell::cmd;

use crate::Flag;
use crate::Prepare;
use crate::PreparedCommand;

/// Builds the crate with `--cfg loom`, which swaps the platform primitives for
/// loom's, and checks that the models compile against it.
#[derive(FromArgs, Default)]
#[argh(subcommand, name = "loom-check")]
pub struct LoomCheckCommand {}

impl Prepare for LoomCheckCommand {
    fn prepare<'a>(&self, sh: &'a xshell::Shell, _flags: Flag) -> Vec<PreparedCommand<'a>> {
        vec![
            PreparedCommand::new::<Self>(
                cmd!(sh, "cargo check --lib --test loom"),
                "The loom build of the pool does not compile; see the errors above.",
            )
            .with_env_var("RUSTFLAGS", "--cfg loom"),
        ]
    }
}
