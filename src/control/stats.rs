// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run statistics collected during an optimization.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Counters and wall-time breakdown of an optimization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimStats {
    pub wall_time_total: Duration,
    pub wall_time_props: Duration,
    pub wall_time_fwd: Duration,
    pub wall_time_onwd: Duration,
    pub wall_time_fid: Duration,
    pub wall_time_grad: Duration,

    /// Optimizer iterations.
    pub num_iter: usize,
    /// Fidelity error requests made by the optimizer.
    pub num_fidelity_func_calls: usize,
    /// Gradient requests made by the optimizer.
    pub num_grad_func_calls: usize,
    /// Fidelity error actually recomputed (cache misses).
    pub num_fidelity_computes: usize,
    /// Gradients actually recomputed (cache misses).
    pub num_grad_computes: usize,
    /// Timeslot propagators recomputed.
    pub num_tslot_recompute: usize,

    /// Updates that changed at least one amplitude.
    pub num_ctrl_amp_updates: usize,
    /// Timeslots whose amplitudes changed, summed over updates.
    pub num_timeslot_changes: usize,
    /// Individual amplitude values changed, summed over updates.
    pub num_ctrl_amp_changes: usize,
}

impl OptimStats {
    fn share(&self, part: Duration) -> f64 {
        let total = self.wall_time_total.as_secs_f64();
        if total > 0.0 {
            100.0 * part.as_secs_f64() / total
        } else {
            0.0
        }
    }

    fn per(count: usize, over: usize) -> f64 {
        if over == 0 {
            0.0
        } else {
            count as f64 / over as f64
        }
    }
}

/// Format a duration as HH:MM:SS.micros.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        d.subsec_micros()
    )
}

impl fmt::Display for OptimStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(44);
        writeln!(f, "{rule}")?;
        writeln!(f, "Pulse optimization statistics")?;
        writeln!(f, "{rule}")?;

        writeln!(f, "Timings (HH:MM:SS.US)")?;
        writeln!(f, "  total wall time:          {}", format_hms(self.wall_time_total))?;
        for (label, d) in [
            ("propagators", self.wall_time_props),
            ("forward evolution", self.wall_time_fwd),
            ("onward evolution", self.wall_time_onwd),
            ("fidelity error", self.wall_time_fid),
            ("gradient", self.wall_time_grad),
        ] {
            writeln!(
                f,
                "  {:<25} {} ({:.1}%)",
                format!("{label}:"),
                format_hms(d),
                self.share(d)
            )?;
        }

        writeln!(f, "Iterations and function calls")?;
        writeln!(f, "  iterations:               {}", self.num_iter)?;
        writeln!(f, "  fidelity function calls:  {}", self.num_fidelity_func_calls)?;
        writeln!(f, "  fidelity computations:    {}", self.num_fidelity_computes)?;
        writeln!(f, "  gradient function calls:  {}", self.num_grad_func_calls)?;
        writeln!(f, "  gradient computations:    {}", self.num_grad_computes)?;
        writeln!(f, "  timeslot recomputations:  {}", self.num_tslot_recompute)?;

        writeln!(f, "Control amplitudes")?;
        writeln!(f, "  amplitude updates:        {}", self.num_ctrl_amp_updates)?;
        writeln!(
            f,
            "  updates per iteration:    {:.2}",
            Self::per(self.num_ctrl_amp_updates, self.num_iter)
        )?;
        writeln!(f, "  timeslots changed:        {}", self.num_timeslot_changes)?;
        writeln!(
            f,
            "  slots changed per update: {:.2}",
            Self::per(self.num_timeslot_changes, self.num_ctrl_amp_updates)
        )?;
        writeln!(f, "  amplitude values changed: {}", self.num_ctrl_amp_changes)?;
        writeln!(
            f,
            "  values changed per update: {:.2}",
            Self::per(self.num_ctrl_amp_changes, self.num_ctrl_amp_updates)
        )?;
        write!(f, "{rule}")
    }
}
