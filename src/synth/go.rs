//! Go text emission from planned transition tables.

use std::fmt::{self, Write};

use super::names::go_quote;
use super::plan::{ChoicePolicy, Edge, ProcessPlan, Rendezvous, Step, SyncEdge};
use super::registry::{ChannelRegistry, SyncPoint};

pub(crate) fn write_header(out: &mut String, plans: &[ProcessPlan], registry: &ChannelRegistry) -> fmt::Result {
    writeln!(out, "// Code generated by ltsgen from an LTS model. DO NOT EDIT.")?;
    writeln!(out, "//")?;
    let names: Vec<String> = plans.iter().map(|p| comment_text(&p.process)).collect();
    writeln!(out, "// Processes: {}", names.join(", "))?;
    let actions: Vec<String> = registry.iter().map(|(a, _)| comment_text(a)).collect();
    if actions.is_empty() {
        writeln!(out, "// Shared actions: none")?;
    } else {
        writeln!(out, "// Shared actions: {}", actions.join(", "))?;
    }
    writeln!(out)?;
    writeln!(out, "package main")?;
    writeln!(out)?;
    writeln!(out, "import (")?;
    writeln!(out, "\t\"fmt\"")?;
    writeln!(out, "\t\"sync\"")?;
    writeln!(out, ")")?;
    writeln!(out)?;
    Ok(())
}

/// One module-scope declaration per shared action name.
pub(crate) fn write_sync_points(out: &mut String, registry: &ChannelRegistry) -> fmt::Result {
    if registry.is_empty() {
        writeln!(out, "// No shared actions: processes run without synchronization.")?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "// Synchronization points, one per shared action.")?;
    writeln!(out, "var (")?;
    for (action, point) in registry.iter() {
        match point {
            SyncPoint::Channel {
                ident,
                sender,
                receiver,
            } => writeln!(
                out,
                "\t{ident} = make(chan struct{{}}) // action: {} ({} sends, {} receives)",
                comment_text(action),
                comment_text(sender),
                comment_text(receiver)
            )?,
            SyncPoint::Barrier { ident, parties } => writeln!(
                out,
                "\t{ident} = newBarrier({}) // action: {} ({})",
                parties.len(),
                comment_text(action),
                comment_text(&parties.join(", "))
            )?,
        }
    }
    writeln!(out, ")")?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn write_always_ready(out: &mut String) -> fmt::Result {
    writeln!(out, "// alwaysReady is closed, so receiving from it never blocks. Private")?;
    writeln!(out, "// alternatives at a choice point with shared alternatives select on it.")?;
    writeln!(out, "var alwaysReady = func() chan struct{{}} {{")?;
    writeln!(out, "\tc := make(chan struct{{}})")?;
    writeln!(out, "\tclose(c)")?;
    writeln!(out, "\treturn c")?;
    writeln!(out, "}}()")?;
    writeln!(out)?;
    Ok(())
}

pub(crate) fn write_barrier_type(out: &mut String) -> fmt::Result {
    writeln!(out, "// barrier is a reusable rendezvous for a fixed number of parties. Each")?;
    writeln!(out, "// round admits exactly `parties` arrivals and then releases all of them.")?;
    writeln!(out, "type barrier struct {{")?;
    writeln!(out, "\tarrive  chan struct{{}}")?;
    writeln!(out, "\trelease chan struct{{}}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "func newBarrier(parties int) *barrier {{")?;
    writeln!(out, "\tb := &barrier{{arrive: make(chan struct{{}}), release: make(chan struct{{}})}}")?;
    writeln!(out, "\tgo func() {{")?;
    writeln!(out, "\t\tfor {{")?;
    writeln!(out, "\t\t\tfor i := 0; i < parties; i++ {{")?;
    writeln!(out, "\t\t\t\t<-b.arrive")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out, "\t\t\tfor i := 0; i < parties; i++ {{")?;
    writeln!(out, "\t\t\t\tb.release <- struct{{}}{{}}")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out, "\t\t}}")?;
    writeln!(out, "\t}}()")?;
    writeln!(out, "\treturn b")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

/// The state-machine procedure for one process.
pub(crate) fn write_process(out: &mut String, plan: &ProcessPlan) -> fmt::Result {
    let name = &plan.process;
    let func = &plan.func_name;

    writeln!(out, "// {func} implements the {} process.", comment_text(name))?;
    writeln!(out, "func {func}(wg *sync.WaitGroup) {{")?;
    writeln!(out, "\tdefer wg.Done()")?;
    writeln!(out, "\tfmt.Println({})", go_quote(&format!("[{name}] starting")))?;
    writeln!(out)?;
    for i in 0..plan.counters {
        writeln!(out, "\trot{i} := 0")?;
    }
    writeln!(out, "\tstate := {}", go_quote(&plan.initial))?;
    writeln!(out, "\tfor {{")?;
    writeln!(out, "\t\tswitch state {{")?;
    for sp in &plan.states {
        writeln!(out, "\t\tcase {}:", go_quote(&sp.qualified))?;
        write_step(out, name, &sp.state, &sp.step)?;
    }
    writeln!(out, "\t\tdefault:")?;
    writeln!(
        out,
        "\t\t\tfmt.Println({}, state)",
        go_quote(&format!("[{name}] unknown state:"))
    )?;
    writeln!(out, "\t\t\treturn")?;
    writeln!(out, "\t\t}}")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    Ok(())
}

fn write_step(out: &mut String, process: &str, state: &str, step: &Step) -> fmt::Result {
    const IND: &str = "\t\t\t";
    match step {
        Step::Terminal => {
            writeln!(
                out,
                "{IND}fmt.Println({})",
                go_quote(&format!("[{process}] reached terminal state {state}"))
            )?;
            writeln!(out, "{IND}return")?;
        }
        Step::Local(edge) => write_advance(out, process, edge, IND)?,
        Step::Sync(sync) => {
            write_blocking(out, sync, IND)?;
            write_advance(out, process, &sync.edge, IND)?;
        }
        Step::Select { shared, private } => {
            writeln!(out, "{IND}select {{")?;
            for sync in shared {
                write_select_case(out, sync, IND)?;
                write_advance(out, process, &sync.edge, "\t\t\t\t")?;
            }
            for edge in private {
                writeln!(
                    out,
                    "{IND}case <-alwaysReady: // private: {}",
                    comment_text(&edge.action)
                )?;
                write_advance(out, process, edge, "\t\t\t\t")?;
            }
            writeln!(out, "{IND}}}")?;
        }
        Step::PrivateChoice {
            candidates,
            policy,
            counter,
        } => match (policy, counter) {
            (ChoicePolicy::Rotate, Some(idx)) => {
                writeln!(out, "{IND}switch rot{idx} % {} {{", candidates.len())?;
                for (i, edge) in candidates.iter().enumerate() {
                    writeln!(out, "{IND}case {i}:")?;
                    write_advance(out, process, edge, "\t\t\t\t")?;
                }
                writeln!(out, "{IND}}}")?;
                writeln!(out, "{IND}rot{idx}++")?;
            }
            _ => {
                let Some((taken, rest)) = candidates.split_first() else {
                    return Ok(());
                };
                write_advance(out, process, taken, IND)?;
                for edge in rest {
                    writeln!(
                        out,
                        "{IND}// unreachable alternative: {} ({} -> {})",
                        comment_text(&edge.action),
                        comment_text(&edge.from),
                        comment_text(&edge.to)
                    )?;
                }
            }
        },
    }
    Ok(())
}

fn write_blocking(out: &mut String, sync: &SyncEdge, indent: &str) -> fmt::Result {
    let action = comment_text(&sync.edge.action);
    match &sync.rendezvous {
        Rendezvous::Offer { channel } => {
            writeln!(out, "{indent}{channel} <- struct{{}}{{}} // send: {action}")
        }
        Rendezvous::Accept { channel } => writeln!(out, "{indent}<-{channel} // receive: {action}"),
        Rendezvous::Barrier { barrier } => {
            writeln!(out, "{indent}{barrier}.arrive <- struct{{}}{{}} // barrier: {action}")?;
            writeln!(out, "{indent}<-{barrier}.release")
        }
    }
}

fn write_select_case(out: &mut String, sync: &SyncEdge, indent: &str) -> fmt::Result {
    let action = comment_text(&sync.edge.action);
    match &sync.rendezvous {
        Rendezvous::Offer { channel } => {
            writeln!(out, "{indent}case {channel} <- struct{{}}{{}}: // send: {action}")
        }
        Rendezvous::Accept { channel } => {
            writeln!(out, "{indent}case <-{channel}: // receive: {action}")
        }
        Rendezvous::Barrier { barrier } => {
            writeln!(out, "{indent}case {barrier}.arrive <- struct{{}}{{}}: // barrier: {action}")?;
            writeln!(out, "{indent}\t<-{barrier}.release")
        }
    }
}

fn write_advance(out: &mut String, process: &str, edge: &Edge, indent: &str) -> fmt::Result {
    let line = format!(
        "[{process}] action: {} ({} -> {})",
        edge.action, edge.from, edge.to
    );
    writeln!(out, "{indent}fmt.Println({})", go_quote(&line))?;
    writeln!(out, "{indent}state = {}", go_quote(&edge.target))
}

/// Model names inside `//` comments must stay on one line.
fn comment_text(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}
