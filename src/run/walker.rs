//! Document-order traversal.

use super::{Handler, StepDecision};
use crate::context::{Context, NodeLabel};
use crate::entities::{Book, Node, Section, Setup, Step};
use crate::error::Result;
use crate::statements::Statement;

/// Visit `book` and everything below it with `handler`.
///
/// The book handler always runs. Below it, nodes that sort before
/// `ctx.start_at` are recursed into without calling their handler, except
/// inside setups, which always run in full. Statements are marked visited
/// once dispatched; dynamic statements that were already visited are never
/// dispatched again.
pub fn walk<H: Handler + ?Sized>(book: &mut Book, handler: &mut H, ctx: &Context<'_>) -> Result<()> {
    ctx.check_cancelled()?;
    let ctx = ctx.clone().with_ssh_config(book.ssh_config.as_ref());
    handler.book(book, &ctx)?;

    let label = NodeLabel::new("book", book.title.clone());
    walk_nodes(&mut book.children, handler, &ctx, &label)
}

fn walk_nodes<H: Handler + ?Sized>(
    nodes: &mut [Node],
    handler: &mut H,
    ctx: &Context<'_>,
    label: &NodeLabel,
) -> Result<()> {
    for (index, node) in nodes.iter_mut().enumerate() {
        let child = ctx.child(index, label.clone());
        match node {
            Node::Section(section) => walk_section(section, handler, child)?,
            Node::Setup(setup) => walk_setup(setup, handler, child)?,
            Node::Step(step) => walk_step(step, handler, child)?,
        }
    }
    Ok(())
}

fn walk_section<H: Handler + ?Sized>(section: &mut Section, handler: &mut H, ctx: Context<'_>) -> Result<()> {
    ctx.check_cancelled()?;
    let ctx = ctx.with_ssh_config(section.ssh_config.as_ref());
    if !ctx.skipped_by_start() {
        handler.section(section, &ctx)?;
    }

    let label = NodeLabel::new("section", section.title.clone());
    walk_nodes(&mut section.children, handler, &ctx, &label)
}

fn walk_setup<H: Handler + ?Sized>(setup: &mut Setup, handler: &mut H, mut ctx: Context<'_>) -> Result<()> {
    ctx.check_cancelled()?;
    ctx.start_at = None;
    ctx.reversed.set(ctx.reverse.get());
    handler.setup(setup, &ctx)?;

    let label = NodeLabel::new("setup", setup.title.clone());
    walk_statements(&mut setup.statements, handler, &ctx, &label)
}

fn walk_step<H: Handler + ?Sized>(step: &mut Step, handler: &mut H, ctx: Context<'_>) -> Result<()> {
    ctx.check_cancelled()?;
    let mut ctx = ctx.with_ssh_config(step.ssh_config.as_ref());
    ctx.parallel = step.parallel;
    ctx.reversed.set(ctx.reverse.get());

    if !ctx.skipped_by_start() && handler.step(step, &ctx)? == StepDecision::Skip {
        tracing::info!(position = %ctx.position, "step skipped");
        return Ok(());
    }

    let label = NodeLabel::new("step", step.title.clone().unwrap_or_default());
    walk_statements(&mut step.statements, handler, &ctx, &label)
}

fn walk_statements<H: Handler + ?Sized>(
    statements: &mut [Statement],
    handler: &mut H,
    ctx: &Context<'_>,
    label: &NodeLabel,
) -> Result<()> {
    for (index, statement) in statements.iter_mut().enumerate() {
        let child = ctx.child(index, label.clone());
        walk_statement(statement, handler, &child)?;
    }
    Ok(())
}

fn walk_statement<H: Handler + ?Sized>(statement: &mut Statement, handler: &mut H, ctx: &Context<'_>) -> Result<()> {
    ctx.check_cancelled()?;
    if ctx.skipped_by_start() {
        return Ok(());
    }
    if statement.is_dynamic() && statement.is_visited() {
        tracing::debug!(position = %ctx.position, kind = statement.kind.name(), "already visited");
        return Ok(());
    }

    tracing::debug!(position = %ctx.position, kind = statement.kind.name(), "dispatch");
    let follow_ups = handler.statement(&statement.kind, ctx).map_err(|e| {
        tracing::warn!(position = %ctx.position, kind = statement.kind.name(), error = %e, "statement failed");
        e.at(ctx.position.to_string())
    })?;
    statement.mark_visited();
    tracing::info!(position = %ctx.position, kind = statement.kind.name(), "statement completed");

    if !follow_ups.is_empty() {
        let label = NodeLabel::new(statement.kind.name(), statement.kind.label());
        let first = statement.spawned().len();
        let spawned = statement.spawned_mut();
        spawned.extend(follow_ups.into_iter().map(Statement::into_dynamic));
        for (offset, dynamic) in spawned[first..].iter_mut().enumerate() {
            let child = ctx.child(first + offset, label.clone());
            walk_statement(dynamic, handler, &child)?;
        }
    }

    if !statement.is_dynamic() {
        handler.checkpoint(&ctx.position, ctx)?;
    }
    Ok(())
}
