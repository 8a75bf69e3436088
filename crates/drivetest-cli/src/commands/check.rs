//! The `drivetest check`, `favorite` and `unfavorite` commands.

use anyhow::Result;

use drivetest_core::grading::Grader;
use drivetest_core::model::QuestionId;

use super::output::print_json;
use super::{Context, HintArgs};

pub fn execute(ctx: &Context, id: u64, answer: &str, hint: &HintArgs) -> Result<()> {
    let grader = Grader::new(&ctx.loader, &ctx.store);
    let result = grader.check(QuestionId(id), answer, hint.hint()?)?;
    print_json(&result)
}

pub fn favorite(ctx: &Context, id: u64, hint: &HintArgs, favorite: bool) -> Result<()> {
    let grader = Grader::new(&ctx.loader, &ctx.store);
    let change = if favorite {
        grader.favorite(QuestionId(id), hint.hint()?)?
    } else {
        grader.unfavorite(QuestionId(id), hint.hint()?)?
    };
    print_json(&change)
}
