// Copyright 2025 Stonebench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Timed CPU-bound workloads.
//!
//! [`WorkloadRunner`] executes one [`WorkloadKind`] for a fixed number of
//! iterations and times the loop. Cancellation is checked once per block of
//! `check_every` iterations, never per iteration, so the check itself does
//! not show up in the measurement.
//!
//! The set of workloads is closed: each kind maps to one kernel through a
//! `match`, and every kernel verifies its own final state so that a
//! miscomputed run is reported as an execution fault instead of a score.

use crate::error::{BenchError, Result};
use crate::types::RawTiming;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default number of iterations per cancellation check.
pub const DEFAULT_CHECK_EVERY: u64 = 1_000;

/// Iterations of the empty loop timed to estimate loop overhead.
const NULL_LOOP_SAMPLE: u64 = 100_000;

/// The measurable workloads.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Dhrystone-derived record, branch and array loop.
    #[default]
    Pystone,
    /// Square roots, trigonometry, exp and log on a float chain.
    FloatMath,
    /// Sorting a fixed pseudo-random vector.
    IntegerSort,
    /// Allocating, filling and reducing a buffer.
    MemoryChurn,
}

impl WorkloadKind {
    /// All workloads, in declaration order.
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::Pystone,
        WorkloadKind::FloatMath,
        WorkloadKind::IntegerSort,
        WorkloadKind::MemoryChurn,
    ];

    /// Stable lowercase name used on the command line and in history.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Pystone => "pystone",
            WorkloadKind::FloatMath => "float_math",
            WorkloadKind::IntegerSort => "integer_sort",
            WorkloadKind::MemoryChurn => "memory_churn",
        }
    }

    /// One-line human description.
    pub fn description(&self) -> &'static str {
        match self {
            WorkloadKind::Pystone => "Dhrystone-style integer, branch and record operations",
            WorkloadKind::FloatMath => "sqrt, sin, cos, exp and log over a float chain",
            WorkloadKind::IntegerSort => "unstable sort of 256 pseudo-random integers",
            WorkloadKind::MemoryChurn => "allocate, fill and reduce a 32 KiB buffer",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_");
        WorkloadKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| BenchError::invalid_argument(format!("unknown workload '{s}'")))
    }
}

/// What a runner hands back when its loop ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadOutcome {
    /// Timing of the iterations that actually ran.
    pub timing: RawTiming,
    /// Whether the loop stopped early because of cancellation.
    pub cancelled: bool,
    /// Estimated cost of the bare block loop, already taken out of
    /// `timing`. Zero when it could not be separated from the work.
    pub overhead_nanos: u64,
}

/// Executes a workload for a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct WorkloadRunner {
    kind: WorkloadKind,
    check_every: u64,
    #[cfg(test)]
    fail_after: Option<u64>,
}

impl WorkloadRunner {
    /// Create a runner for `kind` that checks cancellation every
    /// `check_every` iterations (values below 1 are treated as 1).
    pub fn new(kind: WorkloadKind, check_every: u64) -> Self {
        Self {
            kind,
            check_every: check_every.max(1),
            #[cfg(test)]
            fail_after: None,
        }
    }

    /// Panic inside the timed loop once `iterations` have completed.
    #[cfg(test)]
    pub(crate) fn fail_after(mut self, iterations: u64) -> Self {
        self.fail_after = Some(iterations);
        self
    }

    /// The workload this runner executes.
    pub fn kind(&self) -> WorkloadKind {
        self.kind
    }

    /// Run `iterations` repetitions of the workload.
    pub fn run(&self, iterations: u64, cancel: &CancellationToken) -> Result<WorkloadOutcome> {
        self.run_with_progress(iterations, cancel, |_| {})
    }

    /// Run `iterations` repetitions, calling `on_progress` with the number of
    /// completed iterations at every cancellation check point.
    ///
    /// Cancellation is not an error: the returned timing covers the
    /// iterations completed so far (always at least one block) and
    /// `cancelled` is set.
    pub fn run_with_progress<F>(
        &self,
        iterations: u64,
        cancel: &CancellationToken,
        on_progress: F,
    ) -> Result<WorkloadOutcome>
    where
        F: FnMut(u64),
    {
        if iterations == 0 {
            return Err(BenchError::invalid_argument("iterations must be at least 1"));
        }

        tracing::debug!(
            workload = %self.kind,
            iterations,
            check_every = self.check_every,
            "Starting workload"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.timed_loop(iterations, cancel, on_progress)
        }))
        .map_err(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            BenchError::execution(format!("{} workload panicked: {reason}", self.kind))
        })??;

        tracing::debug!(
            workload = %self.kind,
            iterations = outcome.timing.iterations,
            elapsed_nanos = outcome.timing.elapsed_nanos,
            ops_per_second = outcome.timing.ops_per_second,
            cancelled = outcome.cancelled,
            "Workload finished"
        );

        Ok(outcome)
    }

    fn timed_loop<F>(
        &self,
        iterations: u64,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<WorkloadOutcome>
    where
        F: FnMut(u64),
    {
        let per_iteration = self.null_loop_nanos(iterations, cancel);
        let mut kernel = Kernel::new(self.kind);
        let mut done = 0u64;
        let mut checksum = 0u64;
        let mut cancelled = false;

        let start = Instant::now();
        while done < iterations {
            let block = self.check_every.min(iterations - done);
            for _ in 0..block {
                checksum = checksum.wrapping_add(kernel.step());
            }
            done += block;
            #[cfg(test)]
            if self.fail_after.is_some_and(|after| done >= after) {
                panic!("runner fault after {done} iterations");
            }
            on_progress(done);

            if done < iterations && cancel.is_cancelled() {
                cancelled = true;
                break;
            }
        }
        let elapsed = start.elapsed();
        black_box(checksum);

        kernel
            .verify(done)
            .map_err(|reason| BenchError::execution(format!("{} self-check failed: {reason}", self.kind)))?;

        let raw_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let estimate = (per_iteration * done as f64) as u64;
        let overhead_nanos = if estimate < raw_nanos { estimate } else { 0 };
        if overhead_nanos == 0 {
            tracing::debug!(raw_nanos, estimate, "Loop overhead not separable, timing left as measured");
        }

        Ok(WorkloadOutcome {
            timing: RawTiming::from_elapsed(done, raw_nanos - overhead_nanos),
            cancelled,
            overhead_nanos,
        })
    }

    /// Nanoseconds per iteration of the same block loop with an empty body.
    fn null_loop_nanos(&self, iterations: u64, cancel: &CancellationToken) -> f64 {
        let sample = iterations.clamp(1, NULL_LOOP_SAMPLE);
        let start = Instant::now();
        let mut done = 0u64;
        while done < sample {
            let block = self.check_every.min(sample - done);
            for i in 0..block {
                black_box(i);
            }
            done += block;
            black_box(cancel.is_cancelled());
        }
        start.elapsed().as_nanos() as f64 / sample as f64
    }
}

/// Per-run kernel state, one variant per [`WorkloadKind`].
enum Kernel {
    Pystone(Box<Pystone>),
    FloatMath(FloatMath),
    IntegerSort(IntegerSort),
    MemoryChurn(MemoryChurn),
}

impl Kernel {
    fn new(kind: WorkloadKind) -> Self {
        match kind {
            WorkloadKind::Pystone => Kernel::Pystone(Box::new(Pystone::new())),
            WorkloadKind::FloatMath => Kernel::FloatMath(FloatMath::new()),
            WorkloadKind::IntegerSort => Kernel::IntegerSort(IntegerSort::new()),
            WorkloadKind::MemoryChurn => Kernel::MemoryChurn(MemoryChurn),
        }
    }

    #[inline]
    fn step(&mut self) -> u64 {
        match self {
            Kernel::Pystone(k) => k.step(),
            Kernel::FloatMath(k) => k.step(),
            Kernel::IntegerSort(k) => k.step(),
            Kernel::MemoryChurn(k) => k.step(),
        }
    }

    fn verify(&self, iterations: u64) -> std::result::Result<(), String> {
        match self {
            Kernel::Pystone(k) => k.verify(iterations),
            Kernel::FloatMath(k) => k.verify(),
            Kernel::IntegerSort(k) => k.verify(),
            Kernel::MemoryChurn(_) => Ok(()),
        }
    }
}

const STRING1: &[u8] = b"DHRYSTONE PROGRAM, 1'ST STRING";
const STRING2: &[u8] = b"DHRYSTONE PROGRAM, 2'ND STRING";
const GLOBAL_STRING: &str = "DHRYSTONE PROGRAM, SOME STRING";

const GLB: usize = 0;
const GLB_NEXT: usize = 1;
const SCRATCH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ident {
    Ident1,
    Ident2,
    Ident3,
    Ident4,
    Ident5,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    ptr_comp: Option<usize>,
    discr: Ident,
    enum_comp: Ident,
    int_comp: i64,
    string_comp: &'static str,
}

impl Record {
    const EMPTY: Record = Record {
        ptr_comp: None,
        discr: Ident::Ident1,
        enum_comp: Ident::Ident1,
        int_comp: 0,
        string_comp: "",
    };
}

/// Dhrystone globals. Records live in a three-slot arena and point at each
/// other by index.
struct Pystone {
    records: [Record; 3],
    ptr_glb: usize,
    int_glob: i64,
    bool_glob: bool,
    char1_glob: u8,
    char2_glob: u8,
    array1: [i64; 51],
    array2: [[i64; 51]; 51],
}

impl Pystone {
    fn new() -> Self {
        let mut records = [Record::EMPTY; 3];
        records[GLB] = Record {
            ptr_comp: Some(GLB_NEXT),
            discr: Ident::Ident1,
            enum_comp: Ident::Ident3,
            int_comp: 40,
            string_comp: GLOBAL_STRING,
        };

        let mut array2 = [[0i64; 51]; 51];
        array2[8][7] = 10;

        Self {
            records,
            ptr_glb: GLB,
            int_glob: 0,
            bool_glob: false,
            char1_glob: 0,
            char2_glob: 0,
            array1: [0; 51],
            array2,
        }
    }

    fn step(&mut self) -> u64 {
        self.proc5();
        self.proc4();

        let mut int_loc1: i64 = 2;
        let mut int_loc2: i64 = 3;
        let mut int_loc3: i64 = 0;
        let mut enum_loc = Ident::Ident2;
        self.bool_glob = !self.func2(STRING1, STRING2);

        while int_loc1 < int_loc2 {
            black_box(5 * int_loc1 - int_loc2);
            int_loc3 = Self::proc7(int_loc1, int_loc2);
            int_loc1 += 1;
        }

        self.proc8(int_loc1, int_loc3);
        self.ptr_glb = self.proc1(self.ptr_glb);

        let mut char_index = b'A';
        while char_index <= self.char2_glob {
            if enum_loc == Self::func1(char_index, b'C') {
                enum_loc = self.proc6(Ident::Ident1);
            }
            char_index += 1;
        }

        int_loc3 = int_loc2 * int_loc1;
        int_loc2 = int_loc3 / int_loc1;
        int_loc2 = 7 * (int_loc3 - int_loc2) - int_loc1;
        int_loc1 = self.proc2(int_loc1);

        (int_loc1 ^ int_loc2 ^ int_loc3 ^ self.int_glob) as u64
    }

    fn proc1(&mut self, ptr_par_in: usize) -> usize {
        let mut next = self.records[self.ptr_glb];
        self.records[ptr_par_in].ptr_comp = Some(SCRATCH);
        self.records[ptr_par_in].int_comp = 5;
        next.int_comp = self.records[ptr_par_in].int_comp;
        next.ptr_comp = self.records[ptr_par_in].ptr_comp;
        next.ptr_comp = self.proc3(next.ptr_comp);

        if next.discr == Ident::Ident1 {
            next.int_comp = 6;
            next.enum_comp = self.proc6(self.records[ptr_par_in].enum_comp);
            next.ptr_comp = self.records[self.ptr_glb].ptr_comp;
            next.int_comp = Self::proc7(next.int_comp, 10);
            next.ptr_comp = None;
            self.records[SCRATCH] = next;
        } else {
            next.ptr_comp = None;
            self.records[ptr_par_in] = next;
        }
        ptr_par_in
    }

    fn proc2(&self, mut int_par_io: i64) -> i64 {
        let mut int_loc = int_par_io + 10;
        if self.char1_glob == b'A' {
            int_loc -= 1;
            int_par_io = int_loc - self.int_glob;
        }
        int_par_io
    }

    fn proc3(&mut self, ptr_par_out: Option<usize>) -> Option<usize> {
        let out = match self.records[self.ptr_glb].ptr_comp {
            Some(ptr) => Some(ptr),
            None => {
                self.int_glob = 100;
                ptr_par_out
            }
        };
        self.records[self.ptr_glb].int_comp = Self::proc7(10, self.int_glob);
        out
    }

    fn proc4(&mut self) {
        let bool_loc = self.char1_glob == b'A' || self.bool_glob;
        black_box(bool_loc);
        self.char2_glob = b'B';
    }

    fn proc5(&mut self) {
        self.char1_glob = b'A';
        self.bool_glob = false;
    }

    fn proc6(&self, enum_par_in: Ident) -> Ident {
        let mut enum_par_out = enum_par_in;
        if !Self::func3(enum_par_in) {
            enum_par_out = Ident::Ident4;
        }
        match enum_par_in {
            Ident::Ident1 => Ident::Ident1,
            Ident::Ident2 if self.int_glob > 100 => Ident::Ident1,
            Ident::Ident2 => Ident::Ident4,
            Ident::Ident3 => Ident::Ident2,
            Ident::Ident4 => enum_par_out,
            Ident::Ident5 => Ident::Ident3,
        }
    }

    fn proc7(int_par_i1: i64, int_par_i2: i64) -> i64 {
        let int_loc = int_par_i1 + 2;
        int_par_i2 + int_loc
    }

    fn proc8(&mut self, int_par_i1: i64, int_par_i2: i64) {
        let int_loc = (int_par_i1 + 5) as usize;
        self.array1[int_loc] = int_par_i2;
        self.array1[int_loc + 1] = self.array1[int_loc];
        self.array1[int_loc + 30] = int_loc as i64;
        for int_index in int_loc..int_loc + 2 {
            self.array2[int_loc][int_index] = int_loc as i64;
        }
        self.array2[int_loc][int_loc - 1] += 1;
        self.array2[int_loc + 20][int_loc] = self.array1[int_loc];
        self.int_glob = 5;
    }

    fn func1(char_par1: u8, char_par2: u8) -> Ident {
        let char_loc1 = char_par1;
        let char_loc2 = char_loc1;
        if char_loc2 != char_par2 {
            Ident::Ident1
        } else {
            Ident::Ident2
        }
    }

    fn func2(&self, str_par_i1: &[u8], str_par_i2: &[u8]) -> bool {
        let mut int_loc = 1usize;
        let mut char_loc = 0u8;
        if Self::func1(str_par_i1[int_loc], str_par_i2[int_loc + 1]) == Ident::Ident1 {
            char_loc = b'A';
            int_loc += 1;
        }
        if (b'W'..=b'Z').contains(&char_loc) {
            int_loc = 7;
        }
        black_box(int_loc);
        if char_loc == b'X' {
            true
        } else {
            str_par_i1 > str_par_i2
        }
    }

    fn func3(enum_par_in: Ident) -> bool {
        enum_par_in == Ident::Ident3
    }

    /// `array2[8][7]` starts at 10 and is bumped by `proc8` once per iteration.
    fn verify(&self, iterations: u64) -> std::result::Result<(), String> {
        let expected = 10 + iterations as i64;
        let found = self.array2[8][7];
        if found != expected {
            return Err(format!("array2[8][7] = {found}, expected {expected}"));
        }
        if self.int_glob != 5 || self.char1_glob != b'A' || self.char2_glob != b'B' {
            return Err("globals diverged from reference values".to_string());
        }
        if self.array1[8] != 7 {
            return Err(format!("array1[8] = {}, expected 7", self.array1[8]));
        }
        if self.records[self.ptr_glb].string_comp != GLOBAL_STRING {
            return Err("global record string was overwritten".to_string());
        }
        Ok(())
    }
}

struct FloatMath {
    x: f64,
}

impl FloatMath {
    fn new() -> Self {
        Self { x: 3.14159 * 2.71828 }
    }

    fn step(&mut self) -> u64 {
        let mut x = self.x;
        for _ in 0..8 {
            x = x.sqrt();
            x = x.sin() + x.cos();
            x = (x.abs() + 1.0).ln().exp();
        }
        // Keep the chain inside a stable range instead of converging to a fixed point.
        self.x = 3.14159 * 2.71828 + x.fract();
        x.to_bits()
    }

    fn verify(&self) -> std::result::Result<(), String> {
        if self.x.is_finite() {
            Ok(())
        } else {
            Err(format!("float chain diverged to {}", self.x))
        }
    }
}

struct IntegerSort {
    source: Vec<u32>,
    scratch: Vec<u32>,
}

impl IntegerSort {
    const LEN: usize = 256;

    fn new() -> Self {
        let mut state: u32 = 0x2545_F491;
        let source = (0..Self::LEN)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect();
        Self {
            source,
            scratch: Vec::with_capacity(Self::LEN),
        }
    }

    fn step(&mut self) -> u64 {
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.source);
        self.scratch.sort_unstable();
        u64::from(self.scratch[Self::LEN / 2])
    }

    fn verify(&self) -> std::result::Result<(), String> {
        if self.scratch.windows(2).all(|pair| pair[0] <= pair[1]) {
            Ok(())
        } else {
            Err("scratch buffer is not sorted".to_string())
        }
    }
}

struct MemoryChurn;

impl MemoryChurn {
    const LEN: u64 = 4_096;

    fn step(&mut self) -> u64 {
        let data: Vec<u64> = (0..Self::LEN).map(|i| i * 2).collect();
        black_box(&data).iter().map(|x| x % 17).sum()
    }
}
