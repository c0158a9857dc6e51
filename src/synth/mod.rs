//! Go program synthesis from a normalized specification.
//!
//! The pipeline is analysis ([`ActionUsageMap`]), a per-request
//! [`ChannelRegistry`], per-process [`ProcessPlan`] tables, then text
//! emission. Every stage iterates sorted collections, so the same
//! specification always yields byte-identical source.

mod entry;
mod go;
mod names;
mod plan;
mod registry;

use tracing::{debug, info};

use crate::analysis::ActionUsageMap;
use crate::error::SynthError;
use crate::model::Specification;

pub use names::{NameAllocator, go_quote, sanitize_ident};
pub use plan::{
    ChoicePolicy, Edge, ProcessPlan, Rendezvous, StatePlan, Step, SyncEdge, plan_process, qualify,
};
pub use registry::{ChannelRegistry, SyncPoint};

/// The result of one synthesis run.
#[derive(Debug, Clone)]
pub struct Program {
    pub source: String,
    pub plans: Vec<ProcessPlan>,
    pub registry: ChannelRegistry,
}

/// Synthesis options. Holds no state between runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer {
    pub policy: ChoicePolicy,
}

impl Synthesizer {
    pub fn new(policy: ChoicePolicy) -> Self {
        Self { policy }
    }

    /// Plan every process of `spec` without rendering text.
    pub fn plan(&self, spec: &Specification) -> (Vec<ProcessPlan>, ChannelRegistry) {
        let usage = ActionUsageMap::analyze(spec);
        let mut names = NameAllocator::new();
        let registry = ChannelRegistry::build(&usage, &mut names);
        let plans = spec
            .processes()
            .iter()
            .map(|p| {
                let func_name = names.allocate("Process_", &p.name);
                plan_process(p, &usage, &registry, self.policy, func_name)
            })
            .collect();
        (plans, registry)
    }

    pub fn synthesize(&self, spec: &Specification) -> Result<Program, SynthError> {
        let (plans, registry) = self.plan(spec);

        let mut source = String::new();
        go::write_header(&mut source, &plans, &registry)?;
        go::write_sync_points(&mut source, &registry)?;
        if plans
            .iter()
            .any(|p| p.states.iter().any(|s| s.step.uses_always_ready()))
        {
            go::write_always_ready(&mut source)?;
        }
        if registry.has_barriers() {
            go::write_barrier_type(&mut source)?;
        }
        for plan in &plans {
            go::write_process(&mut source, plan)?;
        }
        entry::write_main(&mut source, &plans)?;

        info!(
            processes = plans.len(),
            sync_points = registry.len(),
            bytes = source.len(),
            "synthesized program"
        );
        for (action, point) in registry.iter() {
            debug!(action, ident = point.ident(), "sync point");
        }

        Ok(Program {
            source,
            plans,
            registry,
        })
    }
}

/// Parse JSON input and synthesize it with the given policy.
pub fn synthesize_json(text: &str, policy: ChoicePolicy) -> Result<Program, SynthError> {
    let spec = crate::model::parse_input(text)?;
    Synthesizer::new(policy).synthesize(&spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FlatTransition, normalize_flat};

    fn spec(rows: &[(&str, &str, &str, &str)]) -> Specification {
        let rows: Vec<_> = rows
            .iter()
            .map(|(p, f, t, a)| FlatTransition::new(*p, *f, *t, *a))
            .collect();
        normalize_flat(&rows).unwrap()
    }

    fn producer_consumer() -> Specification {
        spec(&[
            ("PRODUCER", "READY", "PRODUCING", "produce"),
            ("PRODUCER", "PRODUCING", "READY", "put"),
            ("BUFFER", "EMPTY", "FULL", "put"),
            ("BUFFER", "FULL", "EMPTY", "get"),
            ("CONSUMER", "WAITING", "CONSUMING", "get"),
            ("CONSUMER", "CONSUMING", "WAITING", "consume"),
        ])
    }

    #[test]
    fn switch_has_no_sync_points() {
        let s = spec(&[("SWITCH", "S0", "S1", "on"), ("SWITCH", "S1", "S0", "off")]);
        let program = Synthesizer::default().synthesize(&s).unwrap();
        let src = &program.source;
        assert!(program.registry.is_empty());
        assert!(!src.contains("make(chan"));
        assert!(!src.contains("select {"));
        assert!(src.contains("// No shared actions"));
        assert!(src.contains("state := \"SWITCH_S0\""));
        assert!(src.contains("fmt.Println(\"[SWITCH] action: on (S0 -> S1)\")"));
        assert!(src.contains("fmt.Println(\"[SWITCH] action: off (S1 -> S0)\")"));
        assert!(src.contains("wg.Add(1)"));
    }

    #[test]
    fn producer_consumer_declares_two_channels() {
        let program = Synthesizer::default()
            .synthesize(&producer_consumer())
            .unwrap();
        let src = &program.source;
        assert_eq!(src.matches("make(chan struct{})").count(), 2);
        assert!(src.contains("ch_get = make(chan struct{}) // action: get (BUFFER sends, CONSUMER receives)"));
        assert!(src.contains("ch_put = make(chan struct{}) // action: put (BUFFER sends, PRODUCER receives)"));
        assert!(src.contains("ch_put <- struct{}{} // send: put"));
        assert!(src.contains("<-ch_put // receive: put"));
        assert!(!src.contains("ch_produce"));
        assert!(!src.contains("alwaysReady"));
        assert!(src.contains("wg.Add(3)"));
    }

    #[test]
    fn two_party_edges_pair_offer_with_accept_on_one_channel() {
        let (plans, registry) = Synthesizer::default().plan(&producer_consumer());
        let mut checked = 0;
        for plan in &plans {
            for sp in &plan.states {
                let syncs: Vec<&SyncEdge> = match &sp.step {
                    Step::Sync(sync) => vec![sync],
                    Step::Select { shared, .. } => shared.iter().collect(),
                    _ => vec![],
                };
                for sync in syncs {
                    let Some(SyncPoint::Channel {
                        ident,
                        sender,
                        receiver,
                    }) = registry.get(&sync.edge.action)
                    else {
                        panic!("no channel for {}", sync.edge.action);
                    };
                    let expected = if *sender == plan.process {
                        Rendezvous::Offer {
                            channel: ident.clone(),
                        }
                    } else {
                        assert_eq!(*receiver, plan.process);
                        Rendezvous::Accept {
                            channel: ident.clone(),
                        }
                    };
                    assert_eq!(sync.rendezvous, expected);
                    checked += 1;
                }
            }
        }
        // put and get, each seen from both sides.
        assert_eq!(checked, 4);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let s = producer_consumer();
        let a = Synthesizer::default().synthesize(&s).unwrap().source;
        let b = Synthesizer::default().synthesize(&s).unwrap().source;
        assert_eq!(a, b);
    }

    #[test]
    fn processes_are_emitted_in_specification_order() {
        let src = Synthesizer::default()
            .synthesize(&producer_consumer())
            .unwrap()
            .source;
        let p = src.find("func Process_PRODUCER").unwrap();
        let b = src.find("func Process_BUFFER").unwrap();
        let c = src.find("func Process_CONSUMER").unwrap();
        assert!(p < b && b < c);
    }

    #[test]
    fn mixed_choice_offers_shared_and_each_private_alternative() {
        let s = spec(&[
            ("P", "S0", "S1", "sync"),
            ("P", "S0", "S2", "work"),
            ("P", "S0", "S3", "rest"),
            ("Q", "Q0", "Q1", "sync"),
        ]);
        let src = Synthesizer::default().synthesize(&s).unwrap().source;
        assert!(src.contains("var alwaysReady = func() chan struct{} {"));
        assert!(src.contains("case ch_sync <- struct{}{}: // send: sync"));
        assert!(src.contains("case <-alwaysReady: // private: work"));
        assert!(src.contains("case <-alwaysReady: // private: rest"));
        assert!(src.contains("state = \"P_S2\""));
        assert!(src.contains("state = \"P_S3\""));
    }

    #[test]
    fn three_way_action_emits_barrier() {
        let s = spec(&[
            ("A", "0", "1", "go"),
            ("B", "0", "1", "go"),
            ("C", "0", "1", "go"),
        ]);
        let src = Synthesizer::default().synthesize(&s).unwrap().source;
        assert!(src.contains("type barrier struct {"));
        assert!(src.contains("bar_go = newBarrier(3) // action: go (A, B, C)"));
        assert_eq!(src.matches("bar_go.arrive <- struct{}{}").count(), 3);
        assert!(!src.contains("ch_go"));
    }

    #[test]
    fn colliding_process_names_get_distinct_functions() {
        let s = spec(&[("P.1", "a", "b", "x"), ("P_1", "a", "b", "y")]);
        let src = Synthesizer::default().synthesize(&s).unwrap().source;
        assert!(src.contains("func Process_P_1(wg *sync.WaitGroup)"));
        assert!(src.contains("func Process_P_1_2(wg *sync.WaitGroup)"));
    }

    #[test]
    fn terminal_state_ends_the_task() {
        let s = spec(&[("P", "A", "STOP", "halt")]);
        let src = Synthesizer::default().synthesize(&s).unwrap().source;
        assert!(src.contains("case \"P_STOP\":\n\t\t\tfmt.Println(\"[P] reached terminal state STOP\")\n\t\t\treturn\n"));
    }

    #[test]
    fn multiline_names_stay_inside_comments() {
        let s = spec(&[
            ("A\nfunc xq", "0", "1", "go\nqk7"),
            ("B", "0", "1", "go\nqk7"),
            ("C", "0", "1", "meet\nzq9"),
            ("D", "0", "1", "meet\nzq9"),
            ("E", "0", "1", "meet\nzq9"),
        ]);
        let src = Synthesizer::default().synthesize(&s).unwrap().source;
        for line in src.lines() {
            let line = line.trim_start();
            for fragment in ["func xq", "qk7", "zq9"] {
                assert!(!line.starts_with(fragment), "name leaked into code: {line:?}");
            }
        }
        assert!(src.contains("// Processes: A func xq, B, C, D, E\n"));
        assert!(src.contains("// Shared actions: go qk7, meet zq9\n"));
        assert!(src.contains("// action: go qk7 (A func xq sends, B receives)\n"));
        assert!(src.contains("// action: meet zq9 (C, D, E)\n"));
    }

    #[test]
    fn synthesize_json_rejects_empty_spec() {
        let err = synthesize_json(r#"{"processes": []}"#, ChoicePolicy::First).unwrap_err();
        assert!(matches!(err, SynthError::EmptySpecification));
    }
}
