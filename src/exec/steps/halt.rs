use crate::types::Result;

use super::super::scheduler::RunOutcome;

pub(crate) fn execute() -> Result<RunOutcome> {
    Ok(RunOutcome::Halted)
}
