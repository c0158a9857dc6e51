use std::fmt::{self, Write};

use super::plan::ProcessPlan;

/// Emit `main`: one goroutine per process and a wait group barrier.
///
/// There is no timeout or supervision here. A process that never reaches a
/// terminal state keeps `main` blocked until the caller's environment stops it.
pub(crate) fn write_main(out: &mut String, plans: &[ProcessPlan]) -> fmt::Result {
    writeln!(out, "func main() {{")?;
    writeln!(out, "\tfmt.Println(\"=== LTS execution started ===\")")?;
    writeln!(out)?;
    writeln!(out, "\tvar wg sync.WaitGroup")?;
    writeln!(out, "\twg.Add({})", plans.len())?;
    for plan in plans {
        writeln!(out, "\tgo {}(&wg)", plan.func_name)?;
    }
    writeln!(out, "\twg.Wait()")?;
    writeln!(out)?;
    writeln!(out, "\tfmt.Println(\"=== LTS execution complete ===\")")?;
    writeln!(out, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(func_name: &str) -> ProcessPlan {
        ProcessPlan {
            process: func_name.trim_start_matches("Process_").into(),
            func_name: func_name.into(),
            initial: String::new(),
            states: vec![],
            counters: 0,
        }
    }

    #[test]
    fn launches_one_goroutine_per_process() {
        let mut out = String::new();
        write_main(&mut out, &[plan("Process_A"), plan("Process_B")]).unwrap();
        assert!(out.contains("\twg.Add(2)\n"));
        assert!(out.contains("\tgo Process_A(&wg)\n\tgo Process_B(&wg)\n"));
        assert!(out.contains("\twg.Wait()\n"));
        assert!(!out.contains("time."));
    }
}
