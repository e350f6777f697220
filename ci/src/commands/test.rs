use argh::FromArgs;
use xshell::cmd;

use crate::Flag;
use crate::Prepare;
use crate::PreparedCommand;

/// Runs the unit and integration tests.
#[derive(FromArgs, Default)]
#[argh(subcommand, name = "test")]
pub struct TestCommand {}

impl Prepare for TestCommand {
    fn prepare<'a>(&self, sh: &'a xshell::Shell, flags: Flag) -> Vec<PreparedCommand<'a>> {
        let no_fail_fast: &[&str] = if flags.contains(Flag::KEEP_GOING) {
            &["--no-fail-fast"]
        } else {
            &[]
        };

        vec![
            PreparedCommand::new::<Self>(
                cmd!(sh, "cargo test --lib --test integration {no_fail_fast...}"),
                "Please fix failing tests in output above.",
            )
            .with_env_var("RUST_LOG", "tessel=trace"),
        ]
    }
}
