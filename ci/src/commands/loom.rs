use argh::FromArgs;

use crate::commands::LoomCheckCommand;
use crate::commands::LoomClippyCommand;
use crate::commands::LoomTestCommand;
use crate::Flag;
use crate::Prepare;
use crate::PreparedCommand;

/// Alias for checking, linting and then running the loom models of the
/// dispatch protocol.
#[derive(FromArgs, Default)]
#[argh(subcommand, name = "loom")]
pub struct LoomCommand {}

impl Prepare for LoomCommand {
    fn prepare<'a>(&self, sh: &'a xshell::Shell, flags: Flag) -> Vec<PreparedCommand<'a>> {
        [
            LoomCheckCommand::default().prepare(sh, flags),
            LoomClippyCommand::default().prepare(sh, flags),
            LoomTestCommand::default().prepare(sh, flags),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
