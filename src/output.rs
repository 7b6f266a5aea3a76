// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control amplitude files.
//!
//! Files are tab-separated text with a `time\tamp0\tamp1…` header and one
//! row per timeslot: the slot start time followed by the amplitude of each
//! control, all written in `%.18e` notation.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::info;

use crate::control::pulsegen::PulseType;
use crate::control::types::OptimResult;
use crate::error::{OptimizationError, Result};

/// File name suffix for a problem, e.g. `Symplectic_n_ts1000_ptypeZERO.txt`.
pub fn file_ext(name: &str, n_ts: usize, p_type: PulseType) -> String {
    format!("{}_n_ts{}_ptype{}.txt", name, n_ts, p_type)
}

/// Format a float as `%.18e` (two-digit signed exponent).
fn format_sci(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let s = format!("{:.18e}", x);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

/// Write slot start times and amplitudes to `path`.
pub fn save_amps(path: &Path, time: &[f64], amps: &Array2<f64>) -> Result<()> {
    let (n_ts, n_ctrls) = amps.dim();
    if time.len() != n_ts {
        return Err(OptimizationError::AmplitudeFile(format!(
            "{} time points for {} timeslots",
            time.len(),
            n_ts
        ))
        .into());
    }

    let mut out = String::from("time");
    for j in 0..n_ctrls {
        let _ = write!(out, "\tamp{}", j);
    }
    out.push('\n');

    for (t, row) in time.iter().zip(amps.rows()) {
        out.push_str(&format_sci(*t));
        for a in row {
            out.push('\t');
            out.push_str(&format_sci(*a));
        }
        out.push('\n');
    }

    fs::write(path, out)?;
    Ok(())
}

/// Read an amplitude file written by [`save_amps`].
///
/// Returns the slot start times and the (n_ts × n_ctrls) amplitudes.
pub fn load_amps(path: &Path) -> Result<(Vec<f64>, Array2<f64>)> {
    let content = fs::read_to_string(path)?;
    let bad = |msg: String| OptimizationError::AmplitudeFile(format!("{}: {}", path.display(), msg));

    let mut time = Vec::new();
    let mut values = Vec::new();
    let mut n_ctrls = None;

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("time") {
            continue;
        }
        let fields = line
            .split_whitespace()
            .map(|f| f.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| bad(format!("line {}: {}", lineno + 1, e)))?;

        let width = fields.len().saturating_sub(1);
        if width == 0 {
            return Err(bad(format!("line {}: no amplitude columns", lineno + 1)).into());
        }
        match n_ctrls {
            None => n_ctrls = Some(width),
            Some(n) if n != width => {
                return Err(bad(format!(
                    "line {}: expected {} amplitude columns, found {}",
                    lineno + 1,
                    n,
                    width
                ))
                .into());
            }
            _ => {}
        }
        time.push(fields[0]);
        values.extend_from_slice(&fields[1..]);
    }

    let n_ctrls = n_ctrls.ok_or_else(|| bad("no amplitude rows".into()))?;
    let amps = Array2::from_shape_vec((time.len(), n_ctrls), values)
        .map_err(|e| bad(e.to_string()))?;
    Ok((time, amps))
}

/// Write `ctrl_amps_initial_{ext}` and `ctrl_amps_final_{ext}` into `dir`.
///
/// Creates `dir` if needed and returns the two paths.
pub fn write_amps_files(result: &OptimResult, dir: &Path, ext: &str) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let initial = dir.join(format!("ctrl_amps_initial_{}", ext));
    let final_ = dir.join(format!("ctrl_amps_final_{}", ext));

    save_amps(&initial, &result.time, &result.initial_amps)?;
    save_amps(&final_, &result.time, &result.final_amps)?;

    info!(
        initial = %initial.display(),
        final_amps = %final_.display(),
        "Wrote control amplitude files"
    );
    Ok((initial, final_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_file_ext() {
        assert_eq!(
            file_ext("Symplectic", 1000, PulseType::Zero),
            "Symplectic_n_ts1000_ptypeZERO.txt"
        );
    }

    #[test]
    fn test_format_sci_matches_printf() {
        assert_eq!(format_sci(1.0), "1.000000000000000000e+00");
        assert_eq!(format_sci(-0.25), "-2.500000000000000000e-01");
        assert_eq!(format_sci(0.0), "0.000000000000000000e+00");
        assert_eq!(format_sci(1.5e-120), "1.500000000000000054e-120");
        assert_eq!(format_sci(1.5 * 2f64.powi(-400)), "5.808887872273977409e-121");
        assert_eq!(format_sci(f64::NAN), "nan");
        assert_eq!(format_sci(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_save_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amps.txt");
        save_amps(&path, &[0.0, 0.5], &array![[1.0, 0.0], [-2.0, 0.5]]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time\tamp0\tamp1");
        assert_eq!(
            lines[2],
            "5.000000000000000000e-01\t-2.000000000000000000e+00\t5.000000000000000000e-01"
        );
    }

    #[test]
    fn test_load_reads_saved_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amps.txt");
        let amps = array![[0.1, -0.2, 0.3], [1e-9, 2.5, -7.0]];
        save_amps(&path, &[0.0, 0.01], &amps).unwrap();

        let (time, loaded) = load_amps(&path).unwrap();
        assert_eq!(time.len(), 2);
        assert_relative_eq!(time[1], 0.01);
        assert_eq!(loaded, amps);
    }

    #[test]
    fn test_load_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.txt");
        fs::write(&path, "time\tamp0\n0.0\t1.0\n0.5\t1.0\t2.0\n").unwrap();
        let err = load_amps(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Optimization(OptimizationError::AmplitudeFile(_))
        ));
    }

    #[test]
    fn test_write_amps_files() {
        use crate::control::optimize::PulseOptimizer;
        use crate::control::pulsegen::PulseConfig;
        use crate::control::types::OptimizerConfig;
        use crate::test_utils::qubit_x_problem;

        let problem = qubit_x_problem(5);
        let config = OptimizerConfig {
            max_iter: 2,
            ..Default::default()
        };
        let result = PulseOptimizer::new(config, PulseConfig::default())
            .unwrap()
            .optimize(&problem)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let ext = file_ext(&problem.name, problem.n_ts, PulseType::Zero);
        let (initial, final_) = write_amps_files(&result, &out, &ext).unwrap();
        assert!(initial.ends_with("ctrl_amps_initial_test_qubit_n_ts5_ptypeZERO.txt"));

        let (_, init_amps) = load_amps(&initial).unwrap();
        assert!(init_amps.iter().all(|&a| a == 0.0));
        let (time, final_amps) = load_amps(&final_).unwrap();
        assert_eq!(time, result.time);
        assert_eq!(final_amps, result.final_amps);
    }

    #[test]
    fn test_save_rejects_time_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amps.txt");
        assert!(save_amps(&path, &[0.0], &Array2::zeros((2, 1))).is_err());
    }
}
